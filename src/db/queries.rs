use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Result};
use std::collections::HashSet;

use crate::{
    models::{
        CannedResponse, Hunt, Message, Person, Puzzle, Submission, Team, TeamMember, Unlock,
        Unlockable,
    },
    unlock::UnlockEdge,
};

// =============================================================================
// Hunts
// =============================================================================

pub async fn get_current_hunt(pool: &PgPool) -> Result<Option<Hunt>> {
    sqlx::query_as::<_, Hunt>("SELECT * FROM hunts WHERE is_current")
        .fetch_optional(pool)
        .await
}

pub async fn list_hunts(pool: &PgPool, include_current: bool) -> Result<Vec<Hunt>> {
    if include_current {
        sqlx::query_as::<_, Hunt>("SELECT * FROM hunts ORDER BY hunt_number")
            .fetch_all(pool)
            .await
    } else {
        sqlx::query_as::<_, Hunt>("SELECT * FROM hunts WHERE NOT is_current ORDER BY hunt_number")
            .fetch_all(pool)
            .await
    }
}

/// Make a hunt the current one, atomically unsetting all others.
///
/// There is always exactly one current hunt afterwards; a partial unique
/// index backs this up at the schema level.
pub async fn set_current_hunt(pool: &PgPool, hunt_id: i32) -> Result<Hunt> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE hunts SET is_current = FALSE WHERE is_current")
        .execute(&mut *tx)
        .await?;

    let hunt = sqlx::query_as::<_, Hunt>(
        "UPDATE hunts SET is_current = TRUE WHERE hunt_id = $1 RETURNING *",
    )
    .bind(hunt_id)
    .fetch_optional(&mut *tx)
    .await?;

    let hunt = match hunt {
        Some(h) => h,
        None => {
            tx.rollback().await?;
            return Err(sqlx::Error::RowNotFound);
        }
    };

    tx.commit().await?;
    Ok(hunt)
}

// =============================================================================
// Persons
// =============================================================================

pub async fn upsert_person(
    pool: &PgPool,
    external_id: &str,
    email: &str,
    first_name: &str,
    last_name: &str,
    is_sso_acct: bool,
) -> Result<Person> {
    sqlx::query_as::<_, Person>(
        r#"
        INSERT INTO persons (external_id, email, first_name, last_name, is_sso_acct)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (external_id)
        DO UPDATE SET
            email = $2,
            first_name = $3,
            last_name = $4,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(external_id)
    .bind(email)
    .bind(first_name)
    .bind(last_name)
    .bind(is_sso_acct)
    .fetch_one(pool)
    .await
}

pub async fn get_person(pool: &PgPool, person_id: i64) -> Result<Option<Person>> {
    sqlx::query_as::<_, Person>("SELECT * FROM persons WHERE person_id = $1")
        .bind(person_id)
        .fetch_optional(pool)
        .await
}

pub async fn update_person_contact(
    pool: &PgPool,
    person_id: i64,
    phone: &str,
    allergies: &str,
    comments: &str,
) -> Result<Option<Person>> {
    sqlx::query_as::<_, Person>(
        r#"
        UPDATE persons
        SET phone = $1,
            allergies = $2,
            comments = $3,
            updated_at = NOW()
        WHERE person_id = $4
        RETURNING *
        "#,
    )
    .bind(phone)
    .bind(allergies)
    .bind(comments)
    .bind(person_id)
    .fetch_optional(pool)
    .await
}

// =============================================================================
// Teams and membership
// =============================================================================

pub async fn create_team(
    pool: &PgPool,
    hunt_id: i32,
    team_name: &str,
    location: &str,
    join_code: &str,
) -> Result<Team> {
    sqlx::query_as::<_, Team>(
        r#"
        INSERT INTO teams (hunt_id, team_name, location, join_code)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(hunt_id)
    .bind(team_name)
    .bind(location)
    .bind(join_code)
    .fetch_one(pool)
    .await
}

pub async fn get_team(pool: &PgPool, team_id: i64) -> Result<Option<Team>> {
    sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE team_id = $1")
        .bind(team_id)
        .fetch_optional(pool)
        .await
}

pub async fn list_teams(pool: &PgPool, hunt_id: i32) -> Result<Vec<Team>> {
    sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE hunt_id = $1 ORDER BY team_name")
        .bind(hunt_id)
        .fetch_all(pool)
        .await
}

/// Team names are compared case-insensitively within a hunt.
pub async fn find_team_by_name(pool: &PgPool, hunt_id: i32, team_name: &str) -> Result<Option<Team>> {
    sqlx::query_as::<_, Team>(
        "SELECT * FROM teams WHERE hunt_id = $1 AND LOWER(team_name) = LOWER($2)",
    )
    .bind(hunt_id)
    .bind(team_name)
    .fetch_optional(pool)
    .await
}

/// The team a person belongs to for a given hunt, if any.
pub async fn team_for_person(pool: &PgPool, person_id: i64, hunt_id: i32) -> Result<Option<Team>> {
    sqlx::query_as::<_, Team>(
        r#"
        SELECT t.* FROM teams t
        JOIN team_members m ON m.team_id = t.team_id
        WHERE m.person_id = $1 AND t.hunt_id = $2
        "#,
    )
    .bind(person_id)
    .bind(hunt_id)
    .fetch_optional(pool)
    .await
}

pub async fn team_member_count(pool: &PgPool, team_id: i64) -> Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM team_members WHERE team_id = $1")
        .bind(team_id)
        .fetch_one(pool)
        .await
}

pub async fn add_team_member(pool: &PgPool, team_id: i64, person_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO team_members (team_id, person_id)
        VALUES ($1, $2)
        ON CONFLICT (team_id, person_id) DO NOTHING
        "#,
    )
    .bind(team_id)
    .bind(person_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove_team_member(pool: &PgPool, team_id: i64, person_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM team_members WHERE team_id = $1 AND person_id = $2")
        .bind(team_id)
        .bind(person_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_team_members(pool: &PgPool, team_id: i64) -> Result<Vec<TeamMember>> {
    sqlx::query_as::<_, TeamMember>(
        r#"
        SELECT p.person_id, p.first_name, p.last_name, p.email, m.joined_at
        FROM team_members m
        JOIN persons p ON p.person_id = m.person_id
        WHERE m.team_id = $1
        ORDER BY m.joined_at
        "#,
    )
    .bind(team_id)
    .fetch_all(pool)
    .await
}

// =============================================================================
// Puzzles and the unlock graph
// =============================================================================

pub async fn list_puzzles(pool: &PgPool, hunt_id: i32) -> Result<Vec<Puzzle>> {
    sqlx::query_as::<_, Puzzle>("SELECT * FROM puzzles WHERE hunt_id = $1 ORDER BY puzzle_number")
        .bind(hunt_id)
        .fetch_all(pool)
        .await
}

pub async fn get_puzzle(pool: &PgPool, puzzle_id: i32) -> Result<Option<Puzzle>> {
    sqlx::query_as::<_, Puzzle>("SELECT * FROM puzzles WHERE puzzle_id = $1")
        .bind(puzzle_id)
        .fetch_optional(pool)
        .await
}

pub async fn get_puzzle_by_key(pool: &PgPool, puzzle_key: &str) -> Result<Option<Puzzle>> {
    sqlx::query_as::<_, Puzzle>("SELECT * FROM puzzles WHERE puzzle_key = $1")
        .bind(puzzle_key)
        .fetch_optional(pool)
        .await
}

#[derive(Debug, Clone, FromRow)]
struct EdgeRow {
    prereq_puzzle_id: i32,
    target_puzzle_id: i32,
}

pub async fn list_unlock_edges(pool: &PgPool, hunt_id: i32) -> Result<Vec<UnlockEdge>> {
    let rows = sqlx::query_as::<_, EdgeRow>(
        r#"
        SELECT e.prereq_puzzle_id, e.target_puzzle_id
        FROM puzzle_unlock_edges e
        JOIN puzzles p ON p.puzzle_id = e.prereq_puzzle_id
        WHERE p.hunt_id = $1
        "#,
    )
    .bind(hunt_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| UnlockEdge {
            prereq_puzzle_id: r.prereq_puzzle_id,
            target_puzzle_id: r.target_puzzle_id,
        })
        .collect())
}

pub async fn canned_responses_for_puzzle(
    pool: &PgPool,
    puzzle_id: i32,
) -> Result<Vec<CannedResponse>> {
    sqlx::query_as::<_, CannedResponse>(
        "SELECT * FROM canned_responses WHERE puzzle_id = $1 ORDER BY response_id",
    )
    .bind(puzzle_id)
    .fetch_all(pool)
    .await
}

pub async fn unlockables_for_puzzle(pool: &PgPool, puzzle_id: i32) -> Result<Vec<Unlockable>> {
    sqlx::query_as::<_, Unlockable>(
        "SELECT * FROM unlockables WHERE puzzle_id = $1 ORDER BY unlockable_id",
    )
    .bind(puzzle_id)
    .fetch_all(pool)
    .await
}

// =============================================================================
// Unlocks and solves
// =============================================================================

pub async fn solved_puzzle_ids(pool: &PgPool, team_id: i64) -> Result<HashSet<i32>> {
    let ids = sqlx::query_scalar::<_, i32>("SELECT puzzle_id FROM solves WHERE team_id = $1")
        .bind(team_id)
        .fetch_all(pool)
        .await?;
    Ok(ids.into_iter().collect())
}

pub async fn unlocked_puzzle_ids(pool: &PgPool, team_id: i64) -> Result<HashSet<i32>> {
    let ids = sqlx::query_scalar::<_, i32>("SELECT puzzle_id FROM unlocks WHERE team_id = $1")
        .bind(team_id)
        .fetch_all(pool)
        .await?;
    Ok(ids.into_iter().collect())
}

pub async fn is_puzzle_unlocked(pool: &PgPool, team_id: i64, puzzle_id: i32) -> Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM unlocks WHERE team_id = $1 AND puzzle_id = $2)",
    )
    .bind(team_id)
    .bind(puzzle_id)
    .fetch_one(pool)
    .await
}

/// Record unlocks for a team, skipping rows that already exist.
pub async fn insert_unlocks(pool: &PgPool, team_id: i64, puzzle_ids: &[i32]) -> Result<()> {
    // One transaction so a team never sees a partial batch.
    let mut tx = pool.begin().await?;

    for puzzle_id in puzzle_ids {
        sqlx::query(
            r#"
            INSERT INTO unlocks (team_id, puzzle_id)
            VALUES ($1, $2)
            ON CONFLICT (team_id, puzzle_id) DO NOTHING
            "#,
        )
        .bind(team_id)
        .bind(*puzzle_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn unlock_one(pool: &PgPool, team_id: i64, puzzle_id: i32) -> Result<Option<Unlock>> {
    sqlx::query_as::<_, Unlock>(
        r#"
        INSERT INTO unlocks (team_id, puzzle_id)
        VALUES ($1, $2)
        ON CONFLICT (team_id, puzzle_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(team_id)
    .bind(puzzle_id)
    .fetch_optional(pool)
    .await
}

/// Record a solve; the first submission to solve a puzzle wins and later
/// correct submissions leave the row untouched.
pub async fn create_solve(
    pool: &PgPool,
    team_id: i64,
    puzzle_id: i32,
    submission_id: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO solves (team_id, puzzle_id, submission_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (team_id, puzzle_id) DO NOTHING
        "#,
    )
    .bind(team_id)
    .bind(puzzle_id)
    .bind(submission_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// A solve joined with the time of its backing submission.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SolveDetail {
    pub solve_id: i64,
    pub team_id: i64,
    pub puzzle_id: i32,
    pub submitted_at: DateTime<Utc>,
}

pub async fn hunt_solves_since(
    pool: &PgPool,
    hunt_id: i32,
    last_solve_id: i64,
) -> Result<Vec<SolveDetail>> {
    sqlx::query_as::<_, SolveDetail>(
        r#"
        SELECT s.solve_id, s.team_id, s.puzzle_id, sub.submitted_at
        FROM solves s
        JOIN submissions sub ON sub.submission_id = s.submission_id
        JOIN teams t ON t.team_id = s.team_id
        WHERE t.hunt_id = $1 AND s.solve_id > $2
        ORDER BY s.solve_id
        "#,
    )
    .bind(hunt_id)
    .bind(last_solve_id)
    .fetch_all(pool)
    .await
}

pub async fn hunt_unlocks_since(
    pool: &PgPool,
    hunt_id: i32,
    last_unlock_id: i64,
) -> Result<Vec<Unlock>> {
    sqlx::query_as::<_, Unlock>(
        r#"
        SELECT u.* FROM unlocks u
        JOIN teams t ON t.team_id = u.team_id
        WHERE t.hunt_id = $1 AND u.unlock_id > $2
        ORDER BY u.unlock_id
        "#,
    )
    .bind(hunt_id)
    .bind(last_unlock_id)
    .fetch_all(pool)
    .await
}

// =============================================================================
// Submissions
// =============================================================================

pub async fn create_submission(
    pool: &PgPool,
    team_id: i64,
    puzzle_id: i32,
    submission_text: &str,
    response_text: &str,
) -> Result<Submission> {
    sqlx::query_as::<_, Submission>(
        r#"
        INSERT INTO submissions (team_id, puzzle_id, submission_text, response_text)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(team_id)
    .bind(puzzle_id)
    .bind(submission_text)
    .bind(response_text)
    .fetch_one(pool)
    .await
}

/// Staff grading: replace the response and bump `modified_at` so team poll
/// loops re-render the row.
pub async fn update_submission_response(
    pool: &PgPool,
    submission_id: i64,
    response_text: &str,
) -> Result<Option<Submission>> {
    sqlx::query_as::<_, Submission>(
        r#"
        UPDATE submissions
        SET response_text = $1,
            modified_at = NOW()
        WHERE submission_id = $2
        RETURNING *
        "#,
    )
    .bind(response_text)
    .bind(submission_id)
    .fetch_optional(pool)
    .await
}

/// Poll query for the puzzle page: new rows by id plus rows staff edited
/// since the client's previous poll.
pub async fn submissions_since(
    pool: &PgPool,
    team_id: i64,
    puzzle_id: i32,
    last_id: i64,
    last_poll: DateTime<Utc>,
) -> Result<Vec<Submission>> {
    sqlx::query_as::<_, Submission>(
        r#"
        SELECT * FROM submissions
        WHERE team_id = $1 AND puzzle_id = $2
          AND (submission_id > $3 OR modified_at > $4)
        ORDER BY submission_id
        "#,
    )
    .bind(team_id)
    .bind(puzzle_id)
    .bind(last_id)
    .bind(last_poll)
    .fetch_all(pool)
    .await
}

pub async fn submissions_for_team_puzzle(
    pool: &PgPool,
    team_id: i64,
    puzzle_id: i32,
) -> Result<Vec<Submission>> {
    sqlx::query_as::<_, Submission>(
        r#"
        SELECT * FROM submissions
        WHERE team_id = $1 AND puzzle_id = $2
        ORDER BY submission_id
        "#,
    )
    .bind(team_id)
    .bind(puzzle_id)
    .fetch_all(pool)
    .await
}

/// One staff-queue row: a submission flattened with its team and puzzle.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QueueSubmission {
    pub submission_id: i64,
    pub team_id: i64,
    pub team_name: String,
    pub puzzle_id: i32,
    pub puzzle_key: String,
    pub puzzle_number: i32,
    pub puzzle_name: String,
    pub answer: String,
    pub submission_text: String,
    pub response_text: String,
    pub submitted_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

pub async fn queue_submissions(
    pool: &PgPool,
    hunt_id: i32,
    limit: i64,
    offset: i64,
) -> Result<Vec<QueueSubmission>> {
    sqlx::query_as::<_, QueueSubmission>(
        r#"
        SELECT s.submission_id, s.team_id, t.team_name,
               p.puzzle_id, p.puzzle_key, p.puzzle_number, p.puzzle_name, p.answer,
               s.submission_text, s.response_text, s.submitted_at, s.modified_at
        FROM submissions s
        JOIN teams t ON t.team_id = s.team_id
        JOIN puzzles p ON p.puzzle_id = s.puzzle_id
        WHERE t.hunt_id = $1
        ORDER BY s.submission_id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(hunt_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count_hunt_submissions(pool: &PgPool, hunt_id: i32) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM submissions s
        JOIN teams t ON t.team_id = s.team_id
        WHERE t.hunt_id = $1
        "#,
    )
    .bind(hunt_id)
    .fetch_one(pool)
    .await
}

// =============================================================================
// Chat messages
// =============================================================================

pub async fn create_message(
    pool: &PgPool,
    team_id: i64,
    is_response: bool,
    text: &str,
) -> Result<Message> {
    sqlx::query_as::<_, Message>(
        r#"
        INSERT INTO messages (team_id, is_response, text)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(team_id)
    .bind(is_response)
    .bind(text)
    .fetch_one(pool)
    .await
}

pub async fn team_messages_since(
    pool: &PgPool,
    team_id: i64,
    last_id: i64,
) -> Result<Vec<Message>> {
    sqlx::query_as::<_, Message>(
        r#"
        SELECT * FROM messages
        WHERE team_id = $1 AND message_id > $2
        ORDER BY message_id
        "#,
    )
    .bind(team_id)
    .bind(last_id)
    .fetch_all(pool)
    .await
}

pub async fn hunt_messages_since(
    pool: &PgPool,
    hunt_id: i32,
    last_id: i64,
) -> Result<Vec<Message>> {
    sqlx::query_as::<_, Message>(
        r#"
        SELECT m.* FROM messages m
        JOIN teams t ON t.team_id = m.team_id
        WHERE t.hunt_id = $1 AND m.message_id > $2
        ORDER BY m.message_id
        "#,
    )
    .bind(hunt_id)
    .bind(last_id)
    .fetch_all(pool)
    .await
}

// =============================================================================
// Staff dashboards
// =============================================================================

/// Per-team activity timestamps for the progress page.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TeamActivity {
    pub team_id: i64,
    pub last_submission: Option<DateTime<Utc>>,
    pub last_solve: Option<DateTime<Utc>>,
}

pub async fn team_activity(pool: &PgPool, hunt_id: i32) -> Result<Vec<TeamActivity>> {
    sqlx::query_as::<_, TeamActivity>(
        r#"
        SELECT t.team_id,
               (SELECT MAX(s.submitted_at) FROM submissions s
                 WHERE s.team_id = t.team_id) AS last_submission,
               (SELECT MAX(sub.submitted_at) FROM solves sv
                 JOIN submissions sub ON sub.submission_id = sv.submission_id
                 WHERE sv.team_id = t.team_id) AS last_solve
        FROM teams t
        WHERE t.hunt_id = $1
        "#,
    )
    .bind(hunt_id)
    .fetch_all(pool)
    .await
}

/// Per-puzzle totals for the charts page.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PuzzleStats {
    pub puzzle_id: i32,
    pub puzzle_number: i32,
    pub puzzle_name: String,
    pub submission_count: i64,
    pub solve_count: i64,
    pub unlock_count: i64,
}

pub async fn puzzle_stats(pool: &PgPool, hunt_id: i32) -> Result<Vec<PuzzleStats>> {
    sqlx::query_as::<_, PuzzleStats>(
        r#"
        SELECT p.puzzle_id, p.puzzle_number, p.puzzle_name,
               (SELECT COUNT(*) FROM submissions s WHERE s.puzzle_id = p.puzzle_id)
                   AS submission_count,
               (SELECT COUNT(*) FROM solves sv WHERE sv.puzzle_id = p.puzzle_id)
                   AS solve_count,
               (SELECT COUNT(*) FROM unlocks u WHERE u.puzzle_id = p.puzzle_id)
                   AS unlock_count
        FROM puzzles p
        WHERE p.hunt_id = $1
        ORDER BY p.puzzle_number
        "#,
    )
    .bind(hunt_id)
    .fetch_all(pool)
    .await
}

/// Solves bucketed by hour for the charts page.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChartBucket {
    pub hour: DateTime<Utc>,
    pub count: i64,
}

pub async fn solves_per_hour(pool: &PgPool, hunt_id: i32) -> Result<Vec<ChartBucket>> {
    sqlx::query_as::<_, ChartBucket>(
        r#"
        SELECT date_trunc('hour', sub.submitted_at) AS hour, COUNT(*) AS count
        FROM solves sv
        JOIN submissions sub ON sub.submission_id = sv.submission_id
        JOIN teams t ON t.team_id = sv.team_id
        WHERE t.hunt_id = $1
        GROUP BY hour
        ORDER BY hour
        "#,
    )
    .bind(hunt_id)
    .fetch_all(pool)
    .await
}

/// Offset for a 1-based page number; page 0 and page 1 both mean the first.
pub fn page_offset(page: i64, page_size: i64) -> i64 {
    (page.max(1) - 1) * page_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset_first_page() {
        assert_eq!(page_offset(1, 30), 0);
        // Page 0 is clamped to the first page rather than a negative offset
        assert_eq!(page_offset(0, 30), 0);
        assert_eq!(page_offset(-3, 30), 0);
    }

    #[test]
    fn test_page_offset_later_pages() {
        assert_eq!(page_offset(2, 30), 30);
        assert_eq!(page_offset(5, 10), 40);
    }
}

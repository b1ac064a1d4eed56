use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    auth::AuthenticatedUser,
    db,
    error::AppError,
    grading,
    models::{Hunt, Puzzle, PuzzleInfo, SubmissionView, Team, Unlockable},
    routes::current_team,
    unlock, AppState,
};

/// Whether this caller may see the hunt's puzzles at all.
fn ensure_can_view(hunt: &Hunt, team: &Team, user: &AuthenticatedUser) -> Result<(), AppError> {
    if hunt.is_locked() && team.is_normal_team() && !user.is_staff {
        return Err(AppError::HuntLocked);
    }
    Ok(())
}

/// Whether this caller may record new submissions. Playtesters and staff
/// play early; nobody scores after the hunt ends.
fn ensure_can_submit(hunt: &Hunt, team: &Team, user: &AuthenticatedUser) -> Result<(), AppError> {
    if hunt.is_public() {
        return Err(AppError::HuntClosed);
    }
    ensure_can_view(hunt, team, user)
}

#[derive(Debug, Serialize)]
pub struct PuzzleStatus {
    pub id: String,
    pub number: i32,
    pub name: String,
    pub link: String,
    pub num_pages: i32,
    pub solved: bool,
}

/// Puzzles currently unlocked for the caller's team
pub async fn unlocked_puzzles(
    user: AuthenticatedUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PuzzleStatus>>, AppError> {
    let (hunt, team) = current_team(&state, user.person_id).await?;
    ensure_can_view(&hunt, &team, &user)?;

    let puzzles = db::queries::list_puzzles(&state.db, hunt.hunt_id).await?;
    let unlocked = db::queries::unlocked_puzzle_ids(&state.db, team.team_id).await?;
    let solved = db::queries::solved_puzzle_ids(&state.db, team.team_id).await?;

    // After the hunt ends everything is world-readable.
    let everything_open = hunt.is_public();

    let visible = puzzles
        .into_iter()
        .filter(|p| everything_open || unlocked.contains(&p.puzzle_id))
        .map(|p| PuzzleStatus {
            solved: solved.contains(&p.puzzle_id),
            id: p.puzzle_key,
            number: p.puzzle_number,
            name: p.puzzle_name,
            link: p.link,
            num_pages: p.num_pages,
        })
        .collect();

    Ok(Json(visible))
}

#[derive(Debug, Serialize)]
pub struct PuzzleDetail {
    pub id: String,
    pub number: i32,
    pub name: String,
    pub link: String,
    pub num_pages: i32,
    pub solved: bool,
    pub submissions: Vec<SubmissionView>,
    /// Rewards revealed once the puzzle is solved
    pub unlockables: Vec<Unlockable>,
}

/// One unlocked puzzle with the team's submission history
pub async fn puzzle_detail(
    user: AuthenticatedUser,
    Path(puzzle_key): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<PuzzleDetail>, AppError> {
    let (hunt, team) = current_team(&state, user.person_id).await?;
    ensure_can_view(&hunt, &team, &user)?;

    let puzzle = lookup_hunt_puzzle(&state, &hunt, &puzzle_key).await?;

    if !hunt.is_public()
        && !db::queries::is_puzzle_unlocked(&state.db, team.team_id, puzzle.puzzle_id).await?
    {
        return Err(AppError::PuzzleLocked);
    }

    let solved = db::queries::solved_puzzle_ids(&state.db, team.team_id)
        .await?
        .contains(&puzzle.puzzle_id);

    let submissions =
        db::queries::submissions_for_team_puzzle(&state.db, team.team_id, puzzle.puzzle_id).await?;
    let views = submission_views(&submissions, &puzzle, &team);

    let unlockables = if solved {
        db::queries::unlockables_for_puzzle(&state.db, puzzle.puzzle_id).await?
    } else {
        Vec::new()
    };

    Ok(Json(PuzzleDetail {
        id: puzzle.puzzle_key.clone(),
        number: puzzle.puzzle_number,
        name: puzzle.puzzle_name.clone(),
        link: puzzle.link.clone(),
        num_pages: puzzle.num_pages,
        solved,
        submissions: views,
        unlockables,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub submission: SubmissionView,
    pub is_correct: bool,
    /// Puzzles this solve just opened up for the team
    pub new_unlocks: Vec<PuzzleInfo>,
}

/// Submit an answer for grading
pub async fn submit_answer(
    user: AuthenticatedUser,
    Path(puzzle_key): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<SubmitResponse>, AppError> {
    let (hunt, team) = current_team(&state, user.person_id).await?;
    ensure_can_submit(&hunt, &team, &user)?;

    let puzzle = lookup_hunt_puzzle(&state, &hunt, &puzzle_key).await?;

    if !db::queries::is_puzzle_unlocked(&state.db, team.team_id, puzzle.puzzle_id).await? {
        return Err(AppError::PuzzleLocked);
    }

    let answer = payload.answer.trim();
    if answer.is_empty() {
        return Err(AppError::BadRequest("answer must not be empty".into()));
    }

    let canned = db::queries::canned_responses_for_puzzle(&state.db, puzzle.puzzle_id).await?;
    let grade = grading::grade(answer, &puzzle.answer, &canned);

    let submission = db::queries::create_submission(
        &state.db,
        team.team_id,
        puzzle.puzzle_id,
        answer,
        &grade.response_text,
    )
    .await?;

    let mut new_unlocks = Vec::new();
    if grade.is_correct {
        db::queries::create_solve(
            &state.db,
            team.team_id,
            puzzle.puzzle_id,
            submission.submission_id,
        )
        .await?;

        tracing::info!(
            "Team {:?} ({}) solved puzzle {:?}",
            team.team_name,
            team.team_id,
            puzzle.puzzle_name
        );

        let fresh =
            unlock::recompute_team_unlocks(&state.db, hunt.hunt_id, team.team_id).await?;
        for puzzle_id in fresh {
            if let Some(p) = db::queries::get_puzzle(&state.db, puzzle_id).await? {
                new_unlocks.push(p.info());
            }
        }
    }

    let view = SubmissionView::new(&submission, puzzle.info(), &team.team_name, grade.is_correct);

    Ok(Json(SubmitResponse {
        submission: view,
        is_correct: grade.is_correct,
        new_unlocks,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SubmissionPollParams {
    #[serde(default)]
    pub last_id: i64,
    /// Timestamp of the previous poll; staff response edits after it are
    /// re-sent even when the row id is old
    pub last_poll: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionPollResponse {
    pub submissions: Vec<SubmissionView>,
    pub last_id: i64,
    /// Pass back as `last_poll` on the next request
    pub server_time: DateTime<Utc>,
}

/// Poll loop for the puzzle page
pub async fn poll_submissions(
    user: AuthenticatedUser,
    Path(puzzle_key): Path<String>,
    Query(params): Query<SubmissionPollParams>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SubmissionPollResponse>, AppError> {
    let (hunt, team) = current_team(&state, user.person_id).await?;
    ensure_can_view(&hunt, &team, &user)?;

    let puzzle = lookup_hunt_puzzle(&state, &hunt, &puzzle_key).await?;

    let last_poll = params.last_poll.unwrap_or(DateTime::UNIX_EPOCH);
    let submissions = db::queries::submissions_since(
        &state.db,
        team.team_id,
        puzzle.puzzle_id,
        params.last_id,
        last_poll,
    )
    .await?;

    let last_id = submissions
        .iter()
        .map(|s| s.submission_id)
        .max()
        .unwrap_or(params.last_id);

    Ok(Json(SubmissionPollResponse {
        submissions: submission_views(&submissions, &puzzle, &team),
        last_id,
        server_time: Utc::now(),
    }))
}

/// Resolve a puzzle key within the current hunt.
async fn lookup_hunt_puzzle(
    state: &AppState,
    hunt: &Hunt,
    puzzle_key: &str,
) -> Result<Puzzle, AppError> {
    let puzzle = db::queries::get_puzzle_by_key(&state.db, puzzle_key)
        .await?
        .ok_or(AppError::NotFound("puzzle"))?;
    if puzzle.hunt_id != hunt.hunt_id {
        return Err(AppError::NotFound("puzzle"));
    }
    Ok(puzzle)
}

fn submission_views(
    submissions: &[crate::models::Submission],
    puzzle: &Puzzle,
    team: &Team,
) -> Vec<SubmissionView> {
    submissions
        .iter()
        .map(|s| {
            let is_correct = grading::is_correct(&s.submission_text, &puzzle.answer);
            SubmissionView::new(s, puzzle.info(), &team.team_name, is_correct)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn hunt_at(start_offset: Duration, end_offset: Duration) -> Hunt {
        let now = Utc::now();
        Hunt {
            hunt_id: 1,
            hunt_name: "Test Hunt".to_string(),
            hunt_number: 1,
            team_size: 5,
            start_date: now + start_offset,
            end_date: now + end_offset,
            location: String::new(),
            is_current: true,
        }
    }

    fn team(playtester: bool) -> Team {
        Team {
            team_id: 1,
            hunt_id: 1,
            team_name: "Testers".to_string(),
            location: String::new(),
            join_code: "ABC23".to_string(),
            playtester,
            created_at: Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
        }
    }

    fn member() -> AuthenticatedUser {
        AuthenticatedUser {
            person_id: 1,
            display_name: "Member".to_string(),
            is_staff: false,
        }
    }

    fn staff() -> AuthenticatedUser {
        AuthenticatedUser {
            person_id: 2,
            display_name: "Staffer".to_string(),
            is_staff: true,
        }
    }

    #[test]
    fn test_locked_hunt_blocks_normal_teams() {
        let hunt = hunt_at(Duration::hours(1), Duration::hours(25));

        let result = ensure_can_view(&hunt, &team(false), &member());
        assert!(matches!(result, Err(AppError::HuntLocked)));
    }

    #[test]
    fn test_locked_hunt_allows_playtesters_and_staff() {
        let hunt = hunt_at(Duration::hours(1), Duration::hours(25));

        assert!(ensure_can_view(&hunt, &team(true), &member()).is_ok());
        assert!(ensure_can_view(&hunt, &team(false), &staff()).is_ok());
        assert!(ensure_can_submit(&hunt, &team(true), &member()).is_ok());
    }

    #[test]
    fn test_open_hunt_allows_everyone() {
        let hunt = hunt_at(Duration::hours(-1), Duration::hours(23));

        assert!(ensure_can_view(&hunt, &team(false), &member()).is_ok());
        assert!(ensure_can_submit(&hunt, &team(false), &member()).is_ok());
    }

    #[test]
    fn test_public_hunt_is_read_only() {
        let hunt = hunt_at(Duration::hours(-25), Duration::hours(-1));

        assert!(ensure_can_view(&hunt, &team(false), &member()).is_ok());
        let result = ensure_can_submit(&hunt, &team(false), &member());
        assert!(matches!(result, Err(AppError::HuntClosed)));

        // Not even staff record solves after the end.
        let result = ensure_can_submit(&hunt, &team(false), &staff());
        assert!(matches!(result, Err(AppError::HuntClosed)));
    }

    #[test]
    fn test_poll_params_defaults() {
        let params: SubmissionPollParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.last_id, 0);
        assert!(params.last_poll.is_none());
    }

    #[test]
    fn test_answer_request_deserialization() {
        let request: AnswerRequest = serde_json::from_str(r#"{"answer": "SOLDER"}"#).unwrap();
        assert_eq!(request.answer, "SOLDER");
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::PuzzleInfo;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Submission {
    pub submission_id: i64,
    pub team_id: i64,
    pub puzzle_id: i32,
    pub submission_text: String,
    /// Automatic or staff-written feedback; empty until someone responds
    pub response_text: String,
    pub submitted_at: DateTime<Utc>,
    /// Bumped whenever staff edit the response, so poll loops pick it up
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Unlock {
    pub unlock_id: i64,
    pub team_id: i64,
    pub puzzle_id: i32,
    pub unlocked_at: DateTime<Utc>,
}

/// Short clock time used on dashboards (e.g. "3:05 pm").
pub fn short_time(time: DateTime<Utc>) -> String {
    time.format("%-I:%M %P").to_string()
}

/// Submission shape the puzzle page poll loop consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionView {
    pub pk: i64,
    pub puzzle: PuzzleInfo,
    pub team: String,
    pub submission_text: String,
    pub response_text: String,
    pub is_correct: bool,
    pub time_str: String,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionView {
    pub fn new(
        submission: &Submission,
        puzzle: PuzzleInfo,
        team_name: &str,
        is_correct: bool,
    ) -> Self {
        Self {
            pk: submission.submission_id,
            puzzle,
            team: team_name.to_string(),
            submission_text: submission.submission_text.clone(),
            response_text: submission.response_text.clone(),
            is_correct,
            time_str: short_time(submission.submitted_at),
            submitted_at: submission.submitted_at,
        }
    }
}

/// Progress-poll event: a team solved or unlocked a puzzle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub puzzle: PuzzleInfo,
    pub team_pk: i64,
    pub status_type: String,
    pub time_str: String,
}

impl StatusUpdate {
    pub fn solve(puzzle: PuzzleInfo, team_id: i64, time: Option<DateTime<Utc>>) -> Self {
        Self {
            puzzle,
            team_pk: team_id,
            status_type: "solve".to_string(),
            // Solves always have a backing submission; "0:00 am" guards the
            // impossible missing case instead of crashing the dashboard.
            time_str: time.map(short_time).unwrap_or_else(|| "0:00 am".to_string()),
        }
    }

    pub fn unlock(puzzle: PuzzleInfo, team_id: i64, time: DateTime<Utc>) -> Self {
        Self {
            puzzle,
            team_pk: team_id,
            status_type: "unlock".to_string(),
            time_str: short_time(time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn info() -> PuzzleInfo {
        PuzzleInfo {
            id: "deadbeef".to_string(),
            number: 2,
            name: "Second Puzzle".to_string(),
        }
    }

    #[test]
    fn test_short_time_format() {
        let t = Utc.with_ymd_and_hms(2024, 4, 12, 15, 5, 0).unwrap();
        assert_eq!(short_time(t), "3:05 pm");

        let morning = Utc.with_ymd_and_hms(2024, 4, 12, 9, 30, 0).unwrap();
        assert_eq!(short_time(morning), "9:30 am");
    }

    #[test]
    fn test_submission_view_shape() {
        let submission = Submission {
            submission_id: 11,
            team_id: 3,
            puzzle_id: 2,
            submission_text: "wrong guess".to_string(),
            response_text: "Keep going".to_string(),
            submitted_at: Utc.with_ymd_and_hms(2024, 4, 12, 21, 15, 0).unwrap(),
            modified_at: Utc.with_ymd_and_hms(2024, 4, 12, 21, 15, 0).unwrap(),
        };

        let view = SubmissionView::new(&submission, info(), "The Sleepless", false);
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["pk"], 11);
        assert_eq!(json["team"], "The Sleepless");
        assert_eq!(json["is_correct"], false);
        assert_eq!(json["time_str"], "9:15 pm");
        assert_eq!(json["puzzle"]["id"], "deadbeef");
    }

    #[test]
    fn test_status_update_solve_and_unlock() {
        let t = Utc.with_ymd_and_hms(2024, 4, 12, 18, 45, 0).unwrap();

        let solve = StatusUpdate::solve(info(), 5, Some(t));
        assert_eq!(solve.status_type, "solve");
        assert_eq!(solve.team_pk, 5);
        assert_eq!(solve.time_str, "6:45 pm");

        let unlock = StatusUpdate::unlock(info(), 5, t);
        assert_eq!(unlock.status_type, "unlock");
        assert_eq!(unlock.time_str, "6:45 pm");
    }

    #[test]
    fn test_status_update_solve_without_time() {
        let solve = StatusUpdate::solve(info(), 5, None);
        assert_eq!(solve.time_str, "0:00 am");
    }
}

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    auth::StaffUser,
    db::{
        self,
        queries::{ChartBucket, PuzzleStats, QueueSubmission},
    },
    error::AppError,
    grading,
    models::{submission::short_time, PuzzleInfo, StatusUpdate, Submission, SubmissionView},
    routes::{current_hunt, info::HuntResponse},
    AppState,
};

// =============================================================================
// Progress dashboard
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ProgressCell {
    pub puzzle_id: i32,
    /// "locked", "unlocked" or "solved"
    pub status: &'static str,
    pub time_str: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TeamProgress {
    pub team_id: i64,
    pub team_name: String,
    pub playtester: bool,
    pub last_submission: Option<DateTime<Utc>>,
    pub last_solve: Option<DateTime<Utc>>,
    pub puzzles: Vec<ProgressCell>,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub puzzles: Vec<PuzzleInfo>,
    pub teams: Vec<TeamProgress>,
    pub last_solve_id: i64,
    pub last_unlock_id: i64,
}

/// Full team-by-puzzle matrix for the progress page
pub async fn progress(
    StaffUser(_user): StaffUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProgressResponse>, AppError> {
    let hunt = current_hunt(&state).await?;

    let puzzles = db::queries::list_puzzles(&state.db, hunt.hunt_id).await?;
    let teams = db::queries::list_teams(&state.db, hunt.hunt_id).await?;
    let solves = db::queries::hunt_solves_since(&state.db, hunt.hunt_id, 0).await?;
    let unlocks = db::queries::hunt_unlocks_since(&state.db, hunt.hunt_id, 0).await?;
    let activity = db::queries::team_activity(&state.db, hunt.hunt_id).await?;

    let last_solve_id = solves.iter().map(|s| s.solve_id).max().unwrap_or(0);
    let last_unlock_id = unlocks.iter().map(|u| u.unlock_id).max().unwrap_or(0);

    let mut solve_times: HashMap<(i64, i32), DateTime<Utc>> = HashMap::new();
    for s in &solves {
        solve_times.insert((s.team_id, s.puzzle_id), s.submitted_at);
    }
    let mut unlock_times: HashMap<(i64, i32), DateTime<Utc>> = HashMap::new();
    for u in &unlocks {
        unlock_times.insert((u.team_id, u.puzzle_id), u.unlocked_at);
    }
    let activity_by_team: HashMap<i64, _> =
        activity.into_iter().map(|a| (a.team_id, a)).collect();

    let team_rows = teams
        .into_iter()
        .map(|team| {
            let cells = puzzles
                .iter()
                .map(|p| {
                    let key = (team.team_id, p.puzzle_id);
                    if let Some(time) = solve_times.get(&key) {
                        ProgressCell {
                            puzzle_id: p.puzzle_id,
                            status: "solved",
                            time_str: Some(short_time(*time)),
                        }
                    } else if let Some(time) = unlock_times.get(&key) {
                        ProgressCell {
                            puzzle_id: p.puzzle_id,
                            status: "unlocked",
                            time_str: Some(short_time(*time)),
                        }
                    } else {
                        ProgressCell {
                            puzzle_id: p.puzzle_id,
                            status: "locked",
                            time_str: None,
                        }
                    }
                })
                .collect();

            let act = activity_by_team.get(&team.team_id);
            TeamProgress {
                team_id: team.team_id,
                team_name: team.team_name,
                playtester: team.playtester,
                last_submission: act.and_then(|a| a.last_submission),
                last_solve: act.and_then(|a| a.last_solve),
                puzzles: cells,
            }
        })
        .collect();

    Ok(Json(ProgressResponse {
        puzzles: puzzles.iter().map(|p| p.info()).collect(),
        teams: team_rows,
        last_solve_id,
        last_unlock_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ProgressPollParams {
    #[serde(default)]
    pub last_solve_id: i64,
    #[serde(default)]
    pub last_unlock_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ProgressUpdates {
    pub updates: Vec<StatusUpdate>,
    pub last_solve_id: i64,
    pub last_unlock_id: i64,
}

/// Poll loop for the progress page: solves and unlocks since last seen
pub async fn progress_updates(
    StaffUser(_user): StaffUser,
    Query(params): Query<ProgressPollParams>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProgressUpdates>, AppError> {
    let hunt = current_hunt(&state).await?;

    let puzzles = db::queries::list_puzzles(&state.db, hunt.hunt_id).await?;
    let info_by_id: HashMap<i32, PuzzleInfo> =
        puzzles.iter().map(|p| (p.puzzle_id, p.info())).collect();

    let solves =
        db::queries::hunt_solves_since(&state.db, hunt.hunt_id, params.last_solve_id).await?;
    let unlocks =
        db::queries::hunt_unlocks_since(&state.db, hunt.hunt_id, params.last_unlock_id).await?;

    let last_solve_id = solves
        .iter()
        .map(|s| s.solve_id)
        .max()
        .unwrap_or(params.last_solve_id);
    let last_unlock_id = unlocks
        .iter()
        .map(|u| u.unlock_id)
        .max()
        .unwrap_or(params.last_unlock_id);

    let mut updates = Vec::with_capacity(solves.len() + unlocks.len());
    for s in solves {
        if let Some(info) = info_by_id.get(&s.puzzle_id) {
            updates.push(StatusUpdate::solve(
                info.clone(),
                s.team_id,
                Some(s.submitted_at),
            ));
        }
    }
    for u in unlocks {
        if let Some(info) = info_by_id.get(&u.puzzle_id) {
            updates.push(StatusUpdate::unlock(info.clone(), u.team_id, u.unlocked_at));
        }
    }

    Ok(Json(ProgressUpdates {
        updates,
        last_solve_id,
        last_unlock_id,
    }))
}

// =============================================================================
// Submission queue
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct QueueParams {
    #[serde(default)]
    pub page: i64,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub submissions: Vec<SubmissionView>,
    pub page: i64,
    pub num_pages: i64,
}

fn queue_view(row: QueueSubmission) -> SubmissionView {
    let is_correct = grading::is_correct(&row.submission_text, &row.answer);
    let info = PuzzleInfo {
        id: row.puzzle_key,
        number: row.puzzle_number,
        name: row.puzzle_name,
    };
    let submission = Submission {
        submission_id: row.submission_id,
        team_id: row.team_id,
        puzzle_id: row.puzzle_id,
        submission_text: row.submission_text,
        response_text: row.response_text,
        submitted_at: row.submitted_at,
        modified_at: row.modified_at,
    };
    SubmissionView::new(&submission, info, &row.team_name, is_correct)
}

/// The grading queue: every submission of the current hunt, newest first
pub async fn submission_queue(
    StaffUser(_user): StaffUser,
    Query(params): Query<QueueParams>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<QueueResponse>, AppError> {
    let hunt = current_hunt(&state).await?;

    let page_size = state.config.hunt.queue_page_size;
    let page = params.page.max(1);
    let offset = db::queries::page_offset(page, page_size);

    let rows = db::queries::queue_submissions(&state.db, hunt.hunt_id, page_size, offset).await?;
    let total = db::queries::count_hunt_submissions(&state.db, hunt.hunt_id).await?;
    let num_pages = (total + page_size - 1) / page_size;

    Ok(Json(QueueResponse {
        submissions: rows.into_iter().map(queue_view).collect(),
        page,
        num_pages,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub response_text: String,
}

/// Manual grading: attach or replace the response on a submission
pub async fn respond_to_submission(
    StaffUser(user): StaffUser,
    Path(submission_id): Path<i64>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RespondRequest>,
) -> Result<Json<SubmissionView>, AppError> {
    let submission =
        db::queries::update_submission_response(&state.db, submission_id, &payload.response_text)
            .await?
            .ok_or(AppError::NotFound("submission"))?;

    let puzzle = db::queries::get_puzzle(&state.db, submission.puzzle_id)
        .await?
        .ok_or(AppError::NotFound("puzzle"))?;
    let team = db::queries::get_team(&state.db, submission.team_id)
        .await?
        .ok_or(AppError::NotFound("team"))?;

    tracing::info!(
        "Staffer {} responded to submission {} for team {:?}",
        user.person_id,
        submission_id,
        team.team_name
    );

    let is_correct = grading::is_correct(&submission.submission_text, &puzzle.answer);
    let view = SubmissionView::new(&submission, puzzle.info(), &team.team_name, is_correct);
    Ok(Json(view))
}

// =============================================================================
// Charts and overrides
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ChartsResponse {
    pub puzzles: Vec<PuzzleStats>,
    pub solves_per_hour: Vec<ChartBucket>,
}

/// Aggregates for the stats dashboard
pub async fn charts(
    StaffUser(_user): StaffUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ChartsResponse>, AppError> {
    let hunt = current_hunt(&state).await?;

    let puzzles = db::queries::puzzle_stats(&state.db, hunt.hunt_id).await?;
    let solves_per_hour = db::queries::solves_per_hour(&state.db, hunt.hunt_id).await?;

    Ok(Json(ChartsResponse {
        puzzles,
        solves_per_hour,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ManualUnlockRequest {
    pub team_id: i64,
    pub puzzle_id: i32,
}

#[derive(Debug, Serialize)]
pub struct ManualUnlockResponse {
    /// False when the team already had the puzzle
    pub created: bool,
    pub update: StatusUpdate,
}

/// Unlock a puzzle for a team by hand, bypassing the graph
pub async fn manual_unlock(
    StaffUser(user): StaffUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ManualUnlockRequest>,
) -> Result<Json<ManualUnlockResponse>, AppError> {
    let team = db::queries::get_team(&state.db, payload.team_id)
        .await?
        .ok_or(AppError::NotFound("team"))?;
    let puzzle = db::queries::get_puzzle(&state.db, payload.puzzle_id)
        .await?
        .ok_or(AppError::NotFound("puzzle"))?;
    if puzzle.hunt_id != team.hunt_id {
        return Err(AppError::BadRequest(
            "puzzle and team belong to different hunts".into(),
        ));
    }

    let unlock = db::queries::unlock_one(&state.db, team.team_id, puzzle.puzzle_id).await?;
    let (created, time) = match unlock {
        Some(u) => (true, u.unlocked_at),
        None => (false, Utc::now()),
    };

    if created {
        tracing::info!(
            "Staffer {} manually unlocked puzzle {:?} for team {:?}",
            user.person_id,
            puzzle.puzzle_name,
            team.team_name
        );
    }

    Ok(Json(ManualUnlockResponse {
        created,
        update: StatusUpdate::unlock(puzzle.info(), team.team_id, time),
    }))
}

/// Flip which hunt is current; exactly one is current afterwards
pub async fn make_hunt_current(
    StaffUser(user): StaffUser,
    Path(hunt_id): Path<i32>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<HuntResponse>, AppError> {
    let hunt = db::queries::set_current_hunt(&state.db, hunt_id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => AppError::NotFound("hunt"),
            other => AppError::Database(other),
        })?;

    tracing::info!(
        "Staffer {} made hunt {:?} ({}) current",
        user.person_id,
        hunt.hunt_name,
        hunt.hunt_id
    );

    Ok(Json(HuntResponse::from(hunt)))
}

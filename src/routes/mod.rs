pub mod auth;
pub mod chat;
pub mod health;
pub mod hunt;
pub mod info;
pub mod registration;
pub mod staff;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{
    db,
    error::AppError,
    models::{Hunt, Team},
    AppState,
};

pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_routes())
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/exchange", post(auth::exchange_token))
        .route(
            "/auth/me",
            get(auth::get_current_person).put(auth::update_contact_info),
        )
        .route("/hunts/current", get(info::current_hunt_info))
        .route("/hunts/previous", get(info::previous_hunts))
        .route(
            "/registration",
            get(registration::registration_status).post(registration::register),
        )
        .route("/hunt/puzzles", get(hunt::unlocked_puzzles))
        .route("/puzzles/{puzzle_key}", get(hunt::puzzle_detail))
        .route(
            "/puzzles/{puzzle_key}/submissions",
            post(hunt::submit_answer).get(hunt::poll_submissions),
        )
        .route(
            "/chat/messages",
            post(chat::post_message).get(chat::poll_messages),
        )
        .nest("/staff", staff_routes())
}

fn staff_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", get(chat::staff_poll_messages))
        .route("/progress", get(staff::progress))
        .route("/progress/updates", get(staff::progress_updates))
        .route("/queue", get(staff::submission_queue))
        .route("/submissions/{id}", put(staff::respond_to_submission))
        .route("/charts", get(staff::charts))
        .route("/unlocks", post(staff::manual_unlock))
        .route("/hunts/{id}/current", post(staff::make_hunt_current))
}

/// The current hunt, or a 404 when none is configured yet.
pub(crate) async fn current_hunt(state: &AppState) -> Result<Hunt, AppError> {
    db::queries::get_current_hunt(&state.db)
        .await?
        .ok_or(AppError::NotFound("current hunt"))
}

/// The caller's team for the current hunt.
pub(crate) async fn current_team(
    state: &AppState,
    person_id: i64,
) -> Result<(Hunt, Team), AppError> {
    let hunt = current_hunt(state).await?;
    let team = db::queries::team_for_person(&state.db, person_id, hunt.hunt_id)
        .await?
        .ok_or(AppError::NotFound("team"))?;
    Ok((hunt, team))
}

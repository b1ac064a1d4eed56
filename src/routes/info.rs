use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    db,
    error::AppError,
    models::{Hunt, HuntState},
    routes::current_hunt,
    AppState,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct HuntResponse {
    pub hunt_id: i32,
    pub hunt_name: String,
    pub hunt_number: i32,
    pub team_size: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub location: String,
    pub is_current: bool,
    pub state: HuntState,
}

impl From<Hunt> for HuntResponse {
    fn from(hunt: Hunt) -> Self {
        let state = hunt.state_at(Utc::now());
        Self {
            hunt_id: hunt.hunt_id,
            hunt_name: hunt.hunt_name,
            hunt_number: hunt.hunt_number,
            team_size: hunt.team_size,
            start_date: hunt.start_date,
            end_date: hunt.end_date,
            location: hunt.location,
            is_current: hunt.is_current,
            state,
        }
    }
}

/// The current hunt with its derived wall-clock state
pub async fn current_hunt_info(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HuntResponse>, AppError> {
    let hunt = current_hunt(&state).await?;
    Ok(Json(HuntResponse::from(hunt)))
}

/// All hunts ordered by number; the running hunt is hidden until it ends
pub async fn previous_hunts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<HuntResponse>>, AppError> {
    let hunt = current_hunt(&state).await?;
    let include_current = hunt.is_public();

    let hunts = db::queries::list_hunts(&state.db, include_current).await?;
    Ok(Json(hunts.into_iter().map(HuntResponse::from).collect()))
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level errors surfaced to HTTP clients.
///
/// Registration failures carry the short machine-readable codes the frontend
/// switches on (`fail-exists`, `fail-full`, `fail-password`).
#[derive(Error, Debug)]
pub enum AppError {
    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("not allowed")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("a team with that name already exists")]
    TeamExists,

    #[error("that team is already full")]
    TeamFull,

    #[error("incorrect join code")]
    WrongJoinCode,

    #[error("the hunt is not open yet")]
    HuntLocked,

    #[error("the hunt has ended")]
    HuntClosed,

    #[error("that puzzle is not unlocked for your team")]
    PuzzleLocked,

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Short stable code for the frontend; mirrors the legacy form responses.
    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad-request",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::NotFound(_) => "not-found",
            AppError::TeamExists => "fail-exists",
            AppError::TeamFull => "fail-full",
            AppError::WrongJoinCode => "fail-password",
            AppError::HuntLocked => "hunt-locked",
            AppError::HuntClosed => "hunt-closed",
            AppError::PuzzleLocked => "puzzle-locked",
            AppError::Database(_) => "database-error",
            AppError::Internal(_) => "internal-error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden
            | AppError::WrongJoinCode
            | AppError::HuntLocked
            | AppError::HuntClosed
            | AppError::PuzzleLocked => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TeamExists | AppError::TeamFull => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Server-side faults get logged with detail; the client only sees a
        // generic message for those.
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("database error: {}", e);
                "internal server error".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {:#}", e);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "code": self.code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

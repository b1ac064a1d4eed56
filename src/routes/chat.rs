use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    auth::{AuthenticatedUser, StaffUser},
    db,
    error::AppError,
    models::MessageView,
    routes::{current_hunt, current_team},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub text: String,
    /// Staff post into a specific team's chat; ignored for team members
    pub team_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ChatPollParams {
    #[serde(default)]
    pub last_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ChatPollResponse {
    pub messages: Vec<MessageView>,
    /// Highest message id seen; send back as `last_id` on the next poll
    pub last_id: i64,
}

fn poll_response(messages: Vec<crate::models::Message>, last_id: i64) -> ChatPollResponse {
    let last_id = messages
        .iter()
        .map(|m| m.message_id)
        .max()
        .unwrap_or(last_id);
    ChatPollResponse {
        messages: messages.into_iter().map(MessageView::from).collect(),
        last_id,
    }
}

/// Post a chat line. Team members write to their own team's chat; staff
/// answer into whichever team they name.
pub async fn post_message(
    user: AuthenticatedUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PostMessageRequest>,
) -> Result<Json<MessageView>, AppError> {
    let text = payload.text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("message must not be empty".into()));
    }
    if text.len() > 400 {
        return Err(AppError::BadRequest("message too long".into()));
    }

    let (team_id, is_response) = match (user.is_staff, payload.team_id) {
        (true, Some(team_id)) => {
            db::queries::get_team(&state.db, team_id)
                .await?
                .ok_or(AppError::NotFound("team"))?;
            (team_id, true)
        }
        _ => {
            let (_, team) = current_team(&state, user.person_id).await?;
            (team.team_id, false)
        }
    };

    let message = db::queries::create_message(&state.db, team_id, is_response, text).await?;
    Ok(Json(MessageView::from(message)))
}

/// Poll loop for a team's chat widget
pub async fn poll_messages(
    user: AuthenticatedUser,
    Query(params): Query<ChatPollParams>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ChatPollResponse>, AppError> {
    let (_, team) = current_team(&state, user.person_id).await?;

    let messages =
        db::queries::team_messages_since(&state.db, team.team_id, params.last_id).await?;
    Ok(Json(poll_response(messages, params.last_id)))
}

/// Staff poll: new chat lines across every team in the current hunt
pub async fn staff_poll_messages(
    StaffUser(_user): StaffUser,
    Query(params): Query<ChatPollParams>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ChatPollResponse>, AppError> {
    let hunt = current_hunt(&state).await?;

    let messages =
        db::queries::hunt_messages_since(&state.db, hunt.hunt_id, params.last_id).await?;
    Ok(Json(poll_response(messages, params.last_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;
    use chrono::{TimeZone, Utc};

    fn message(id: i64, team: i64, text: &str) -> Message {
        Message {
            message_id: id,
            team_id: team,
            is_response: false,
            text: text.to_string(),
            sent_at: Utc.with_ymd_and_hms(2024, 4, 12, 20, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_poll_response_advances_last_id() {
        let messages = vec![message(4, 1, "hello"), message(7, 1, "anyone there?")];
        let response = poll_response(messages, 3);

        assert_eq!(response.last_id, 7);
        assert_eq!(response.messages.len(), 2);
        assert_eq!(response.messages[0].pk, 4);
    }

    #[test]
    fn test_poll_response_keeps_last_id_when_empty() {
        let response = poll_response(Vec::new(), 12);
        assert_eq!(response.last_id, 12);
        assert!(response.messages.is_empty());
    }

    #[test]
    fn test_post_message_request_without_team() {
        let request: PostMessageRequest =
            serde_json::from_str(r#"{"text": "we are stuck"}"#).unwrap();
        assert_eq!(request.text, "we are stuck");
        assert!(request.team_id.is_none());
    }

    #[test]
    fn test_post_message_request_with_team() {
        let request: PostMessageRequest =
            serde_json::from_str(r#"{"text": "try the flavor text", "team_id": 5}"#).unwrap();
        assert_eq!(request.team_id, Some(5));
    }

    #[test]
    fn test_chat_poll_params_default_last_id() {
        let params: ChatPollParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.last_id, 0);
    }
}

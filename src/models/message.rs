use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::submission::short_time;

/// One chat line between a team and staff.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub message_id: i64,
    pub team_id: i64,
    /// True when the line was written by staff
    pub is_response: bool,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// Chat shape the poll loop consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub pk: i64,
    pub team_pk: i64,
    pub is_response: bool,
    pub text: String,
    pub time_str: String,
    pub sent_at: DateTime<Utc>,
}

impl From<Message> for MessageView {
    fn from(m: Message) -> Self {
        Self {
            pk: m.message_id,
            team_pk: m.team_id,
            is_response: m.is_response,
            time_str: short_time(m.sent_at),
            sent_at: m.sent_at,
            text: m.text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_message_view_from_message() {
        let message = Message {
            message_id: 9,
            team_id: 4,
            is_response: true,
            text: "Look at the title again".to_string(),
            sent_at: Utc.with_ymd_and_hms(2024, 4, 12, 22, 7, 0).unwrap(),
        };

        let view = MessageView::from(message);
        assert_eq!(view.pk, 9);
        assert_eq!(view.team_pk, 4);
        assert!(view.is_response);
        assert_eq!(view.time_str, "10:07 pm");
        assert_eq!(view.text, "Look at the title again");
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Team {
    pub team_id: i64,
    pub hunt_id: i32,
    pub team_name: String,
    pub location: String,
    /// 5-character code members use to join; never shown to other teams
    pub join_code: String,
    pub playtester: bool,
    pub created_at: DateTime<Utc>,
}

impl Team {
    pub fn is_playtester_team(&self) -> bool {
        self.playtester
    }

    pub fn is_normal_team(&self) -> bool {
        !self.playtester
    }
}

/// A team member row joined with the person's display fields.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeamMember {
    pub person_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub joined_at: DateTime<Utc>,
}

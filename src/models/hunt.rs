use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Hunt {
    pub hunt_id: i32,
    pub hunt_name: String,
    pub hunt_number: i32,
    /// Maximum number of people on one team
    pub team_size: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub location: String,
    pub is_current: bool,
}

/// Where a hunt sits relative to the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HuntState {
    /// Before the start date: puzzles hidden from normal teams
    Locked,
    /// Between start and end: the event is running
    Open,
    /// After the end date: everything is world-readable
    Public,
}

impl Hunt {
    pub fn state_at(&self, now: DateTime<Utc>) -> HuntState {
        if now < self.start_date {
            HuntState::Locked
        } else if now < self.end_date {
            HuntState::Open
        } else {
            HuntState::Public
        }
    }

    pub fn is_locked(&self) -> bool {
        self.state_at(Utc::now()) == HuntState::Locked
    }

    pub fn is_open(&self) -> bool {
        self.state_at(Utc::now()) == HuntState::Open
    }

    pub fn is_public(&self) -> bool {
        self.state_at(Utc::now()) == HuntState::Public
    }
}

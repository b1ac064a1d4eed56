use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    auth::AuthenticatedUser,
    db,
    error::AppError,
    generate_join_code,
    models::{Team, TeamMember},
    routes::current_hunt,
    unlock, AppState,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct TeamResponse {
    pub team_id: i64,
    pub team_name: String,
    pub location: String,
    /// Only revealed to the team's own members
    pub join_code: String,
    pub playtester: bool,
    pub created_at: DateTime<Utc>,
    pub members: Vec<TeamMember>,
}

impl TeamResponse {
    fn new(team: Team, members: Vec<TeamMember>) -> Self {
        Self {
            team_id: team.team_id,
            team_name: team.team_name,
            location: team.location,
            join_code: team.join_code,
            playtester: team.playtester,
            created_at: team.created_at,
            members,
        }
    }
}

/// What the registration page needs: either the caller's team, or the
/// names already taken so a new team can pick something else.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistrationStatus {
    Registered { team: TeamResponse },
    Unregistered { teams: Vec<String> },
}

pub async fn registration_status(
    user: AuthenticatedUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<RegistrationStatus>, AppError> {
    let hunt = current_hunt(&state).await?;

    match db::queries::team_for_person(&state.db, user.person_id, hunt.hunt_id).await? {
        Some(team) => {
            let members = db::queries::list_team_members(&state.db, team.team_id).await?;
            Ok(Json(RegistrationStatus::Registered {
                team: TeamResponse::new(team, members),
            }))
        }
        None => {
            let teams = db::queries::list_teams(&state.db, hunt.hunt_id).await?;
            Ok(Json(RegistrationStatus::Unregistered {
                teams: teams.into_iter().map(|t| t.team_name).collect(),
            }))
        }
    }
}

/// Registration form actions, discriminated the way the legacy forms were.
#[derive(Debug, Deserialize)]
#[serde(tag = "form_type", rename_all = "snake_case")]
pub enum RegistrationForm {
    NewTeam {
        team_name: String,
        #[serde(default)]
        location: String,
    },
    JoinTeam {
        team_name: String,
        join_code: String,
    },
    LeaveTeam,
}

pub async fn register(
    user: AuthenticatedUser,
    State(state): State<Arc<AppState>>,
    Json(form): Json<RegistrationForm>,
) -> Result<Json<RegistrationStatus>, AppError> {
    let hunt = current_hunt(&state).await?;

    // Once the hunt is over the roster is frozen.
    if hunt.is_public() {
        return Err(AppError::HuntClosed);
    }

    match form {
        RegistrationForm::NewTeam {
            team_name,
            location,
        } => {
            let team_name = team_name.trim().to_string();
            if team_name.is_empty() {
                return Err(AppError::BadRequest("team name must not be empty".into()));
            }
            if db::queries::team_for_person(&state.db, user.person_id, hunt.hunt_id)
                .await?
                .is_some()
            {
                return Err(AppError::BadRequest("already on a team".into()));
            }
            if db::queries::find_team_by_name(&state.db, hunt.hunt_id, &team_name)
                .await?
                .is_some()
            {
                return Err(AppError::TeamExists);
            }

            let join_code = generate_join_code();
            let team =
                db::queries::create_team(&state.db, hunt.hunt_id, &team_name, &location, &join_code)
                    .await?;
            db::queries::add_team_member(&state.db, team.team_id, user.person_id).await?;

            // New mid-hunt teams get their starting puzzles right away
            // instead of waiting for the background sweep.
            if !hunt.is_locked() {
                unlock::recompute_team_unlocks(&state.db, hunt.hunt_id, team.team_id).await?;
            }

            tracing::info!(
                "Person {} created team {:?} ({})",
                user.person_id,
                team.team_name,
                team.team_id
            );
        }
        RegistrationForm::JoinTeam {
            team_name,
            join_code,
        } => {
            let team = db::queries::find_team_by_name(&state.db, hunt.hunt_id, &team_name)
                .await?
                .ok_or(AppError::NotFound("team"))?;

            if db::queries::team_for_person(&state.db, user.person_id, hunt.hunt_id)
                .await?
                .is_some()
            {
                return Err(AppError::BadRequest("already on a team".into()));
            }

            let member_count = db::queries::team_member_count(&state.db, team.team_id).await?;
            if member_count >= hunt.team_size as i64 {
                return Err(AppError::TeamFull);
            }

            if !team.join_code.eq_ignore_ascii_case(join_code.trim()) {
                return Err(AppError::WrongJoinCode);
            }

            db::queries::add_team_member(&state.db, team.team_id, user.person_id).await?;

            tracing::info!(
                "Person {} joined team {:?} ({})",
                user.person_id,
                team.team_name,
                team.team_id
            );
        }
        RegistrationForm::LeaveTeam => {
            let team = db::queries::team_for_person(&state.db, user.person_id, hunt.hunt_id)
                .await?
                .ok_or(AppError::NotFound("team"))?;
            db::queries::remove_team_member(&state.db, team.team_id, user.person_id).await?;

            tracing::info!(
                "Person {} left team {:?} ({})",
                user.person_id,
                team.team_name,
                team.team_id
            );
        }
    }

    registration_status(user, State(state)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_team_form_deserialization() {
        let json = r#"{"form_type": "new_team", "team_name": "The Sleepless", "location": "GHC 4303"}"#;
        let form: RegistrationForm = serde_json::from_str(json).unwrap();

        match form {
            RegistrationForm::NewTeam {
                team_name,
                location,
            } => {
                assert_eq!(team_name, "The Sleepless");
                assert_eq!(location, "GHC 4303");
            }
            other => panic!("unexpected form: {:?}", other),
        }
    }

    #[test]
    fn test_new_team_form_location_defaults_empty() {
        let json = r#"{"form_type": "new_team", "team_name": "Remote Crew"}"#;
        let form: RegistrationForm = serde_json::from_str(json).unwrap();

        match form {
            RegistrationForm::NewTeam { location, .. } => assert!(location.is_empty()),
            other => panic!("unexpected form: {:?}", other),
        }
    }

    #[test]
    fn test_join_team_form_deserialization() {
        let json = r#"{"form_type": "join_team", "team_name": "The Sleepless", "join_code": "ABC23"}"#;
        let form: RegistrationForm = serde_json::from_str(json).unwrap();

        match form {
            RegistrationForm::JoinTeam {
                team_name,
                join_code,
            } => {
                assert_eq!(team_name, "The Sleepless");
                assert_eq!(join_code, "ABC23");
            }
            other => panic!("unexpected form: {:?}", other),
        }
    }

    #[test]
    fn test_leave_team_form_deserialization() {
        let json = r#"{"form_type": "leave_team"}"#;
        let form: RegistrationForm = serde_json::from_str(json).unwrap();
        assert!(matches!(form, RegistrationForm::LeaveTeam));
    }

    #[test]
    fn test_unknown_form_type_is_rejected() {
        let json = r#"{"form_type": "disband_team"}"#;
        let result: Result<RegistrationForm, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_registration_status_serialization() {
        let status = RegistrationStatus::Unregistered {
            teams: vec!["Alpha".to_string(), "Beta".to_string()],
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "unregistered");
        assert_eq!(json["teams"][1], "Beta");
    }
}

use crate::{auth, db, error::AppError, AppState};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct TokenExchangeRequest {
    /// Access token issued by the campus identity provider
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// JWT token for backend API authentication
    pub access_token: String,
}

/// Profile shape returned by the identity provider's userinfo endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityUser {
    /// Stable subject identifier
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PersonResponse {
    pub person_id: i64,
    pub display_name: String,
    pub email: String,
    pub phone: String,
    pub allergies: String,
    pub comments: String,
    pub is_staff: bool,
}

/// Exchange an identity-provider access token for a service JWT
///
/// The IdP is external: we never see credentials, only its access token,
/// which we validate by asking the userinfo endpoint who it belongs to.
pub async fn exchange_token(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TokenExchangeRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    tracing::info!("Exchanging identity provider token for service JWT");

    let identity = fetch_identity(&state, &payload.access_token)
        .await
        .map_err(|e| {
            tracing::warn!("Identity provider rejected token: {}", e);
            AppError::Unauthorized
        })?;

    let person = db::queries::upsert_person(
        &state.db,
        &identity.sub,
        &identity.email,
        identity.given_name.as_deref().unwrap_or(""),
        identity.family_name.as_deref().unwrap_or(""),
        true,
    )
    .await?;

    tracing::info!(
        "Authenticated person: {} (ID: {})",
        person.display_name(),
        person.person_id
    );

    let jwt_token = auth::generate_token(
        person.person_id,
        &person.display_name(),
        person.is_staff,
        &state.config.security.jwt_secret,
    )
    .map_err(|e| anyhow::anyhow!("failed to generate JWT token: {}", e))?;

    Ok(Json(TokenResponse {
        access_token: jwt_token,
    }))
}

/// Ask the identity provider who an access token belongs to
async fn fetch_identity(state: &AppState, access_token: &str) -> anyhow::Result<IdentityUser> {
    let response = state
        .http_client
        .get(&state.config.identity.userinfo_url)
        .header("Authorization", format!("Bearer {}", access_token))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await?;
        tracing::warn!("Userinfo fetch failed: {} - {}", status, error_text);
        anyhow::bail!("userinfo fetch failed with status {}", status);
    }

    let identity = response.json::<IdentityUser>().await?;
    Ok(identity)
}

/// Get the authenticated person's profile
pub async fn get_current_person(
    user: auth::AuthenticatedUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<PersonResponse>, AppError> {
    let person = db::queries::get_person(&state.db, user.person_id)
        .await?
        .ok_or(AppError::NotFound("person"))?;

    Ok(Json(person_response(person)))
}

#[derive(Debug, Deserialize)]
pub struct ContactInfoRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub allergies: String,
    #[serde(default)]
    pub comments: String,
}

/// Update the authenticated person's contact fields
pub async fn update_contact_info(
    user: auth::AuthenticatedUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ContactInfoRequest>,
) -> Result<Json<PersonResponse>, AppError> {
    let person = db::queries::update_person_contact(
        &state.db,
        user.person_id,
        &payload.phone,
        &payload.allergies,
        &payload.comments,
    )
    .await?
    .ok_or(AppError::NotFound("person"))?;

    Ok(Json(person_response(person)))
}

fn person_response(person: crate::models::Person) -> PersonResponse {
    PersonResponse {
        person_id: person.person_id,
        display_name: person.display_name(),
        email: person.email,
        phone: person.phone,
        allergies: person.allergies,
        comments: person.comments,
        is_staff: person.is_staff,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_exchange_request_deserialization() {
        let json = r#"{"access_token": "idp_token_12345"}"#;
        let request: TokenExchangeRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.access_token, "idp_token_12345");
    }

    #[test]
    fn test_token_response_serialization() {
        let response = TokenResponse {
            access_token: "jwt_token_here".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("access_token"));
        assert!(json.contains("jwt_token_here"));
    }

    #[test]
    fn test_identity_user_minimal() {
        // Providers are not required to send name fields
        let json = r#"{"sub": "abc123", "email": "someone@example.edu"}"#;
        let identity: IdentityUser = serde_json::from_str(json).unwrap();

        assert_eq!(identity.sub, "abc123");
        assert_eq!(identity.email, "someone@example.edu");
        assert!(identity.given_name.is_none());
        assert!(identity.family_name.is_none());
    }

    #[test]
    fn test_identity_user_full() {
        let json = r#"{
            "sub": "abc123",
            "email": "ada@example.edu",
            "given_name": "Ada",
            "family_name": "Lovelace"
        }"#;
        let identity: IdentityUser = serde_json::from_str(json).unwrap();

        assert_eq!(identity.given_name.as_deref(), Some("Ada"));
        assert_eq!(identity.family_name.as_deref(), Some("Lovelace"));
    }

    #[test]
    fn test_contact_info_request_defaults() {
        let request: ContactInfoRequest = serde_json::from_str("{}").unwrap();
        assert!(request.phone.is_empty());
        assert!(request.allergies.is_empty());
        assert!(request.comments.is_empty());
    }

    #[test]
    fn test_person_response_round_trip() {
        let original = PersonResponse {
            person_id: 99,
            display_name: "Ada Lovelace".to_string(),
            email: "ada@example.edu".to_string(),
            phone: "555-0100".to_string(),
            allergies: "peanuts".to_string(),
            comments: String::new(),
            is_staff: false,
        };

        let json = serde_json::to_string(&original).unwrap();
        let deserialized: PersonResponse = serde_json::from_str(&json).unwrap();

        assert_eq!(original.person_id, deserialized.person_id);
        assert_eq!(original.display_name, deserialized.display_name);
        assert_eq!(original.email, deserialized.email);
    }
}

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{error::AppError, AppState};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,       // Person ID
    pub name: String,      // Display name
    pub is_staff: bool,    // Staff surface access
    pub exp: usize,        // Expiration time
}

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub person_id: i64,
    pub display_name: String,
    pub is_staff: bool,
}

/// Extractor for authenticated users from JWT tokens
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let app_state = Arc::<AppState>::from_ref(state);

        // Try to extract token from Authorization header first
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(String::from)
            // If no Authorization header, try query parameter (poll loops)
            .or_else(|| {
                parts
                    .uri
                    .query()
                    .and_then(|q| {
                        serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok()
                    })
                    .and_then(|params| {
                        params
                            .iter()
                            .find(|(k, _)| k == "token")
                            .map(|(_, v)| v.clone())
                    })
            });

        async move {
            let token = token.ok_or(AppError::Unauthorized)?;

            // Validate the JWT token
            let token_data = decode::<Claims>(
                &token,
                &DecodingKey::from_secret(app_state.config.security.jwt_secret.as_ref()),
                &Validation::default(),
            )
            .map_err(|_| AppError::Unauthorized)?;

            let person_id = token_data
                .claims
                .sub
                .parse::<i64>()
                .map_err(|_| AppError::Unauthorized)?;

            Ok(AuthenticatedUser {
                person_id,
                display_name: token_data.claims.name,
                is_staff: token_data.claims.is_staff,
            })
        }
    }
}

/// Extractor that additionally requires the staff claim.
#[derive(Debug, Clone)]
pub struct StaffUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for StaffUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let user = AuthenticatedUser::from_request_parts(parts, state);
        async move {
            let user = user.await?;
            if !user.is_staff {
                return Err(AppError::Forbidden);
            }
            Ok(StaffUser(user))
        }
    }
}

/// Generate a JWT token for a person
pub fn generate_token(
    person_id: i64,
    display_name: &str,
    is_staff: bool,
    jwt_secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(24))
        .expect("valid timestamp")
        .timestamp();

    let claims = Claims {
        sub: person_id.to_string(),
        name: display_name.to_string(),
        is_staff,
        exp: expiration as usize,
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(jwt_secret.as_ref()),
    )
}

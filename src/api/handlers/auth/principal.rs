//! Authenticated principal extraction.
//!
//! Every protected handler starts here: read the session token, verify it,
//! and make sure the user it names still exists.

use axum::http::HeaderMap;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{
    session::extract_session_token, state::AuthState, storage::find_user_by_id,
    tokens::TokenAction,
};
use crate::api::handlers::ApiError;

#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Resolve the request's session token into a principal.
///
/// # Errors
/// [`ApiError::NoToken`] when no token is sent, [`ApiError::InvalidToken`]
/// when it fails verification or names a deleted user.
pub async fn require_auth(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
) -> Result<Principal, ApiError> {
    let token = extract_session_token(headers).ok_or(ApiError::NoToken)?;

    let claims = auth_state
        .tokens()
        .verify(&token, TokenAction::Session)
        .map_err(|err| {
            debug!("Rejected session token: {err}");
            ApiError::InvalidToken("Invalid authorization token")
        })?;

    let user = find_user_by_id(pool, claims.sub)
        .await?
        .ok_or(ApiError::InvalidToken("User not found"))?;

    Ok(Principal {
        user_id: user.id,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
    })
}

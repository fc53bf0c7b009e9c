use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    auth::{
        password::{hash_password, MIN_PASSWORD_LEN},
        storage::{insert_user_with_verification, NewUser},
        utils::{build_verify_url, non_blank, normalize_email, valid_email},
        AuthState,
    },
    user::UserResponse,
    ApiError,
};
use crate::api::email::OutboundEmail;

#[derive(ToSchema, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserRegister {
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[utoipa::path(
    post,
    path = "/user/register",
    request_body = UserRegister,
    responses(
        (status = 201, description = "Account created; a verification email is queued.", body = UserResponse),
        (status = 400, description = "Missing fields, invalid input, or email already in use.", body = super::MessageResponse),
    ),
    tag = "user"
)]
#[instrument(skip(pool, auth_state, payload))]
pub async fn register(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<UserRegister>>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.unwrap_or_default();

    let (Some(first_name), Some(last_name), Some(email), Some(password)) = (
        non_blank(request.first_name.as_deref()),
        non_blank(request.last_name.as_deref()),
        non_blank(request.email.as_deref()),
        request.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::MissingFields);
    };

    let email = normalize_email(email);
    if !valid_email(&email) {
        return Err(ApiError::BadRequest("Please enter a valid email"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters",
        ));
    }

    let password_hash = hash_password(password)?;
    let user_id = Uuid::new_v4();
    let token = auth_state.issue_email_verification(user_id)?;
    let verification = OutboundEmail::verify_email(
        &email,
        first_name,
        &build_verify_url(auth_state.config().frontend_base_url(), &token),
    );

    let user = insert_user_with_verification(
        &pool,
        NewUser {
            id: user_id,
            first_name,
            last_name,
            email: &email,
            password_hash: &password_hash,
        },
        &verification,
    )
    .await?;

    info!(user_id = %user.id, "user registered");

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::AuthConfig;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn state() -> Extension<Arc<AuthState>> {
        Extension(Arc::new(AuthState::new(AuthConfig::new(
            SecretString::from("0123456789abcdef0123456789abcdef".to_string()),
            "http://localhost:3000".to_string(),
        ))))
    }

    fn pool() -> anyhow::Result<Extension<PgPool>> {
        Ok(Extension(
            PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/carelink")?,
        ))
    }

    fn request(email: &str, password: &str) -> Option<Json<UserRegister>> {
        Some(Json(UserRegister {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }))
    }

    async fn rejection(payload: Option<Json<UserRegister>>) -> anyhow::Result<String> {
        match register(pool()?, state(), payload).await {
            Err(err) => Ok(err.to_string()),
            Ok(_) => anyhow::bail!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn missing_payload_or_fields() -> anyhow::Result<()> {
        assert_eq!(rejection(None).await?, "Please fill out all fields");
        let blank_name = Some(Json(UserRegister {
            first_name: Some("  ".to_string()),
            ..UserRegister::default()
        }));
        assert_eq!(rejection(blank_name).await?, "Please fill out all fields");
        Ok(())
    }

    #[tokio::test]
    async fn invalid_email_or_short_password() -> anyhow::Result<()> {
        assert_eq!(
            rejection(request("ada.example.com", "longenough")).await?,
            "Please enter a valid email"
        );
        assert_eq!(
            rejection(request("ada@example.com", "short")).await?,
            "Password must be at least 8 characters"
        );
        Ok(())
    }
}

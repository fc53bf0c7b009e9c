//! Email confirmation and resending the confirmation link.

use axum::{
    extract::{Extension, Path},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use super::{
    auth::{
        storage::{confirm_user, find_user_by_email, find_user_by_id},
        tokens::TokenAction,
        utils::{build_verify_url, non_blank, normalize_email},
        AuthState,
    },
    ApiError, MessageResponse,
};
use crate::api::email::{self, OutboundEmail};

const RESEND_MESSAGE: &str =
    "If an unconfirmed account exists for that email, a new verification link has been sent.";

#[utoipa::path(
    post,
    path = "/user/verification/{token}",
    params(("token" = String, Path, description = "Email verification token")),
    responses(
        (status = 200, description = "Email confirmed.", body = MessageResponse),
        (status = 400, description = "Email already confirmed.", body = MessageResponse),
        (status = 401, description = "Invalid token or unknown user.", body = MessageResponse),
    ),
    tag = "user"
)]
#[instrument(skip(pool, auth_state, token))]
pub async fn verify_email(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = auth_state
        .tokens()
        .verify(&token, TokenAction::VerifyEmail)
        .map_err(|err| {
            debug!("Rejected verification token: {err}");
            ApiError::InvalidToken("Invalid verification token")
        })?;

    let user = find_user_by_id(&pool, claims.sub)
        .await?
        .ok_or(ApiError::InvalidToken("User not found"))?;

    if user.confirmed || !confirm_user(&pool, user.id).await? {
        return Err(ApiError::BadRequest("Email already confirmed"));
    }

    info!(user_id = %user.id, "email confirmed");
    Ok(Json(MessageResponse::new("Email successfully confirmed.")))
}

#[derive(ToSchema, Deserialize, Default)]
pub struct ResendVerificationRequest {
    email: Option<String>,
}

#[utoipa::path(
    post,
    path = "/user/resend-verification",
    request_body = ResendVerificationRequest,
    responses(
        (status = 200, description = "Accepted; never reveals whether the account exists.", body = MessageResponse),
        (status = 400, description = "Missing email.", body = MessageResponse),
    ),
    tag = "user"
)]
#[instrument(skip(pool, auth_state, payload))]
pub async fn resend_verification(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResendVerificationRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.unwrap_or_default();
    let email = non_blank(request.email.as_deref())
        .map(normalize_email)
        .ok_or(ApiError::MissingFields)?;

    if let Some(user) = find_user_by_email(&pool, &email).await? {
        if !user.confirmed {
            let token = auth_state.issue_email_verification(user.id)?;
            let message = OutboundEmail::verify_email(
                &user.email,
                &user.first_name,
                &build_verify_url(auth_state.config().frontend_base_url(), &token),
            );
            email::enqueue(&*pool, &message).await?;
        }
    }

    Ok(Json(MessageResponse::new(RESEND_MESSAGE)))
}

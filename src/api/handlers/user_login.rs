//! Login and logout. A successful login sets the session cookie; logout
//! always clears it.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

use super::{
    auth::{
        password::verify_password,
        session::{clear_session_cookie, session_cookie},
        storage::find_user_by_email,
        utils::{non_blank, normalize_email},
        AuthState,
    },
    user::UserResponse,
    ApiError, MessageResponse,
};

#[derive(ToSchema, Deserialize, Default)]
pub struct UserLogin {
    email: Option<String>,
    password: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub message: String,
    pub user: UserResponse,
}

#[utoipa::path(
    post,
    path = "/user/login",
    request_body = UserLogin,
    responses(
        (status = 200, description = "Logged in; the session cookie is set.", body = LoginResponse),
        (status = 400, description = "Missing fields, invalid credentials, or unconfirmed email.", body = MessageResponse),
    ),
    tag = "user"
)]
#[instrument(skip(pool, auth_state, payload))]
pub async fn login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<UserLogin>>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.unwrap_or_default();
    let (Some(email), Some(password)) = (
        non_blank(request.email.as_deref()),
        request.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::MissingFields);
    };

    let user = find_user_by_email(&pool, &normalize_email(email))
        .await?
        .filter(|user| verify_password(password, &user.password_hash))
        .ok_or(ApiError::BadRequest("Invalid credentials"))?;

    if !user.confirmed {
        return Err(ApiError::BadRequest("Please confirm your email"));
    }

    let token = auth_state.issue_session(user.id)?;
    let cookie = session_cookie(auth_state.config(), &token)
        .map_err(|err| ApiError::Internal(anyhow::Error::new(err)))?;

    info!(user_id = %user.id, "user logged in");

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok((
        StatusCode::OK,
        headers,
        Json(LoginResponse {
            message: "Logged in Successfully".to_string(),
            user: UserResponse::from(&user),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/user/logout",
    responses(
        (status = 200, description = "Session cookie cleared.", body = MessageResponse)
    ),
    tag = "user"
)]
pub async fn logout(auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    match clear_session_cookie(auth_state.config()) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build logout cookie: {err}"),
    }
    (StatusCode::OK, headers, Json(MessageResponse::new("Logged out")))
}

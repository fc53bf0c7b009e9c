//! `GET /user`: the signed-in user and the patients they coordinate or care for.

use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    auth::{principal::require_auth, storage::UserRecord, AuthState},
    patients::{storage::list_patients_for_user, types::PatientResponse},
    ApiError,
};

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub confirmed: bool,
}

impl From<&UserRecord> for UserResponse {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            confirmed: user.confirmed,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub coordinating: Vec<PatientResponse>,
    pub caring: Vec<PatientResponse>,
}

#[utoipa::path(
    get,
    path = "/user",
    responses(
        (status = 200, description = "Signed-in user with their patients.", body = UserProfileResponse),
        (status = 401, description = "Missing or invalid session.", body = super::MessageResponse),
    ),
    tag = "user"
)]
pub async fn current_user(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &auth_state).await?;

    let (coordinating, caring): (Vec<_>, Vec<_>) = list_patients_for_user(&pool, principal.user_id)
        .await?
        .into_iter()
        .partition(|patient| patient.coordinator_id == principal.user_id);

    Ok(Json(UserProfileResponse {
        id: principal.user_id,
        first_name: principal.first_name,
        last_name: principal.last_name,
        email: principal.email,
        coordinating: coordinating.into_iter().map(Into::into).collect(),
        caring: caring.into_iter().map(Into::into).collect(),
    }))
}

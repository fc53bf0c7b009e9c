//! Carer rosters: invitations, redemption, and removal.
//!
//! Inviting never touches the roster. The coordinator's invite mails the
//! carer a signed `add_carer` token, and redeeming that token is what adds
//! them, so the carer has to act before anything changes.

pub(crate) mod storage;

use axum::{
    extract::{Extension, Path},
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use self::storage::{add_carer, remove_carer};
use super::{
    auth::{
        principal::require_auth,
        storage::{find_user_by_email, find_user_by_id},
        tokens::TokenAction,
        utils::{
            build_invite_url, is_foreign_key_violation, non_blank, normalize_email, parse_id,
        },
        AuthState,
    },
    patients::{load_patient, storage::find_patient, types::PatientResponse},
    ApiError, MessageResponse,
};
use crate::api::email::{self, OutboundEmail};

#[derive(ToSchema, Deserialize, Default, Debug)]
pub struct InviteCarerRequest {
    email: Option<String>,
}

#[utoipa::path(
    post,
    path = "/carer/invite/{id}",
    params(("id" = String, Path, description = "Patient id")),
    request_body = InviteCarerRequest,
    responses(
        (status = 200, description = "Invitation queued.", body = MessageResponse),
        (status = 400, description = "Patient not found, missing email, or carer cannot be invited.", body = MessageResponse),
        (status = 401, description = "Not the coordinator.", body = MessageResponse),
    ),
    tag = "carer"
)]
#[instrument(skip(headers, pool, auth_state, payload))]
pub async fn invite_carer(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
    payload: Option<Json<InviteCarerRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &auth_state).await?;
    let Json(request) = payload.unwrap_or_default();

    let patient = load_patient(&pool, &id).await?;
    let access = patient.access();
    access.require_coordinator(principal.user_id)?;

    let Some(email) = non_blank(request.email.as_deref()).map(normalize_email) else {
        return Err(ApiError::MissingFields);
    };

    let Some(carer) = find_user_by_email(&pool, &email).await? else {
        return Err(ApiError::BadRequest("Carer has not made an account yet"));
    };
    if access.is_coordinator(carer.id) {
        return Err(ApiError::BadRequest("Coordinator cannot be added as a carer"));
    }
    if access.is_carer(carer.id) {
        return Err(ApiError::BadRequest("Carer already exists"));
    }

    let token = auth_state.issue_carer_invite(carer.id, patient.id)?;
    let invite_url = build_invite_url(auth_state.config().frontend_base_url(), &token);
    let coordinator_name = format!("{} {}", principal.first_name, principal.last_name);
    let message = OutboundEmail::carer_invite(
        &carer.email,
        &coordinator_name,
        &patient.full_name(),
        &invite_url,
    );
    email::enqueue(&*pool, &message).await?;

    info!(patient_id = %patient.id, carer_id = %carer.id, "carer invited");
    Ok(Json(MessageResponse::new("Email Sent")))
}

#[utoipa::path(
    post,
    path = "/carer/add/{token}",
    params(("token" = String, Path, description = "Invitation token from the email")),
    responses(
        (status = 200, description = "Carer added; returns the patient.", body = PatientResponse),
        (status = 400, description = "Patient or carer missing, or carer already on the roster.", body = MessageResponse),
        (status = 401, description = "Invalid invitation token.", body = MessageResponse),
    ),
    tag = "carer"
)]
#[instrument(skip(pool, auth_state, token))]
pub async fn redeem_invite(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = auth_state
        .tokens()
        .verify(&token, TokenAction::AddCarer)
        .map_err(|err| {
            debug!("Rejected invitation token: {err}");
            ApiError::InvalidToken("Invalid invitation token")
        })?;
    let patient_id = claims
        .patient
        .ok_or(ApiError::InvalidToken("Invalid invitation token"))?;

    let patient = find_patient(&pool, patient_id)
        .await?
        .ok_or(ApiError::NotFound("Patient not found"))?;
    let carer = find_user_by_id(&pool, claims.sub)
        .await?
        .ok_or(ApiError::BadRequest("Carer has not made an account yet"))?;
    if patient.access().is_coordinator(carer.id) {
        return Err(ApiError::BadRequest("Coordinator cannot be added as a carer"));
    }

    let added = match add_carer(&pool, patient.id, carer.id).await {
        Ok(added) => added,
        Err(err) if is_foreign_key_violation(&err) => {
            return Err(ApiError::NotFound("Patient not found"));
        }
        Err(err) => return Err(err.into()),
    };
    if !added {
        return Err(ApiError::BadRequest("Carer already exists"));
    }

    let patient = find_patient(&pool, patient.id)
        .await?
        .ok_or(ApiError::NotFound("Patient not found"))?;
    info!(patient_id = %patient.id, carer_id = %carer.id, "carer added");
    Ok(Json(PatientResponse::from(patient)))
}

#[utoipa::path(
    delete,
    path = "/carer/remove/{patient_id}/{carer_id}",
    params(
        ("patient_id" = String, Path, description = "Patient id"),
        ("carer_id" = String, Path, description = "Carer user id"),
    ),
    responses(
        (status = 200, description = "Carer removed with their shifts for this patient.", body = PatientResponse),
        (status = 400, description = "Patient not found or carer not on the roster.", body = MessageResponse),
        (status = 401, description = "Not the coordinator.", body = MessageResponse),
    ),
    tag = "carer"
)]
#[instrument(skip(headers, pool, auth_state))]
pub async fn remove_carer_handler(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path((patient_id, carer_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &auth_state).await?;
    let patient = load_patient(&pool, &patient_id).await?;
    patient.access().require_coordinator(principal.user_id)?;

    let Some(carer_id) = parse_id(&carer_id) else {
        return Err(ApiError::BadRequest("Carer does not exist"));
    };
    if !remove_carer(&pool, patient.id, carer_id).await? {
        return Err(ApiError::BadRequest("Carer does not exist"));
    }

    let patient = find_patient(&pool, patient.id)
        .await?
        .ok_or(ApiError::NotFound("Patient not found"))?;
    info!(patient_id = %patient.id, carer_id = %carer_id, "carer removed");
    Ok(Json(PatientResponse::from(patient)))
}

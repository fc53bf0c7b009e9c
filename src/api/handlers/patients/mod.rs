//! Patient records owned by a coordinator.

pub(crate) mod storage;
pub mod types;

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument};

use self::{
    storage::{
        delete_patient, find_patient, insert_patient, list_patients_for_user, load_people,
        update_patient, PatientRecord,
    },
    types::{
        CreatePatientRequest, PatientDetail, PatientDetailResponse, PatientResponse, Person,
        UpdatePatientRequest,
    },
};
use super::{
    auth::{principal::require_auth, utils::non_blank, utils::parse_id, AuthState},
    ApiError, MessageResponse,
};

/// Resolve a path id to an existing patient. Malformed ids read as missing.
pub(crate) async fn load_patient(pool: &PgPool, raw_id: &str) -> Result<PatientRecord, ApiError> {
    let Some(id) = parse_id(raw_id) else {
        return Err(ApiError::NotFound("Patient not found"));
    };
    find_patient(pool, id)
        .await?
        .ok_or(ApiError::NotFound("Patient not found"))
}

#[utoipa::path(
    get,
    path = "/patient",
    responses(
        (status = 200, description = "Patients the user coordinates or cares for.", body = [PatientResponse]),
        (status = 401, description = "Missing or invalid session.", body = MessageResponse),
    ),
    tag = "patient"
)]
pub async fn list_patients(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &auth_state).await?;
    let patients: Vec<PatientResponse> = list_patients_for_user(&pool, principal.user_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(patients))
}

#[utoipa::path(
    post,
    path = "/patient",
    request_body = CreatePatientRequest,
    responses(
        (status = 201, description = "Patient created; the requester is its coordinator.", body = PatientResponse),
        (status = 400, description = "Missing fields.", body = MessageResponse),
        (status = 401, description = "Missing or invalid session.", body = MessageResponse),
    ),
    tag = "patient"
)]
#[instrument(skip(headers, pool, auth_state, payload))]
pub async fn create_patient(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<CreatePatientRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &auth_state).await?;
    let Json(request) = payload.unwrap_or_default();

    let (Some(first_name), Some(last_name)) = (
        non_blank(request.first_name.as_deref()),
        non_blank(request.last_name.as_deref()),
    ) else {
        return Err(ApiError::MissingFields);
    };

    let patient = insert_patient(&pool, principal.user_id, first_name, last_name).await?;
    info!(patient_id = %patient.id, coordinator_id = %principal.user_id, "patient created");

    Ok((StatusCode::CREATED, Json(PatientResponse::from(patient))))
}

#[utoipa::path(
    get,
    path = "/patient/{id}",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Patient with coordinator and carers expanded.", body = PatientDetailResponse),
        (status = 400, description = "Patient not found.", body = MessageResponse),
        (status = 401, description = "Not the coordinator or a carer.", body = MessageResponse),
    ),
    tag = "patient"
)]
pub async fn get_patient(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &auth_state).await?;
    let patient = load_patient(&pool, &id).await?;
    patient.access().require_read(principal.user_id)?;

    let mut ids = Vec::with_capacity(patient.carer_ids.len() + 1);
    ids.push(patient.coordinator_id);
    ids.extend(patient.carer_ids.iter().copied());
    let mut people: Vec<Person> = load_people(&pool, &ids)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let coordinator_at = people
        .iter()
        .position(|person| person.id == patient.coordinator_id)
        .ok_or_else(|| anyhow::anyhow!("coordinator {} has no user row", patient.coordinator_id))?;
    let coordinator = people.remove(coordinator_at);

    Ok(Json(PatientDetailResponse {
        patient: PatientDetail {
            id: patient.id,
            first_name: patient.first_name,
            last_name: patient.last_name,
            coordinator,
            carers: people,
            created_at: patient.created_at,
            updated_at: patient.updated_at,
        },
    }))
}

#[utoipa::path(
    put,
    path = "/patient/{id}",
    params(("id" = String, Path, description = "Patient id")),
    request_body = UpdatePatientRequest,
    responses(
        (status = 200, description = "Patient updated.", body = PatientResponse),
        (status = 400, description = "Missing fields or patient not found.", body = MessageResponse),
        (status = 401, description = "Not the coordinator.", body = MessageResponse),
    ),
    tag = "patient"
)]
#[instrument(skip(headers, pool, auth_state, payload))]
pub async fn update_patient_handler(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
    payload: Option<Json<UpdatePatientRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &auth_state).await?;
    let Json(request) = payload.unwrap_or_default();

    let first_name = non_blank(request.first_name.as_deref());
    let last_name = non_blank(request.last_name.as_deref());
    if first_name.is_none() && last_name.is_none() {
        return Err(ApiError::MissingFields);
    }

    let patient = load_patient(&pool, &id).await?;
    patient.access().require_coordinator(principal.user_id)?;

    let updated = update_patient(&pool, patient.id, first_name, last_name)
        .await?
        .ok_or(ApiError::NotFound("Patient not found"))?;
    Ok(Json(PatientResponse::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/patient/{id}",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Patient, roster, and shifts deleted.", body = MessageResponse),
        (status = 400, description = "Patient not found.", body = MessageResponse),
        (status = 401, description = "Not the coordinator.", body = MessageResponse),
    ),
    tag = "patient"
)]
#[instrument(skip(headers, pool, auth_state))]
pub async fn delete_patient_handler(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &auth_state).await?;
    let patient = load_patient(&pool, &id).await?;
    patient.access().require_coordinator(principal.user_id)?;

    if !delete_patient(&pool, patient.id).await? {
        return Err(ApiError::NotFound("Patient not found"));
    }

    info!(patient_id = %patient.id, "patient deleted");
    Ok(Json(MessageResponse::new(format!(
        "Deleted patient {}",
        patient.id
    ))))
}

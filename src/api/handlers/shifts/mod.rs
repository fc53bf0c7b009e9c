//! Shifts scheduled by a coordinator and worked by one rostered carer.

pub(crate) mod storage;
pub mod types;

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use self::{
    storage::{
        delete_shift, find_shift, insert_incident_report, insert_shift, list_shifts_for_patient,
        list_shifts_for_user, submit_shift_notes, update_shift, NewShift, ShiftChanges,
        ShiftRecord,
    },
    types::{
        CreateShiftRequest, IncidentReportRequest, ShiftNotesRequest, ShiftResponse,
        UpdateShiftRequest,
    },
};
use super::{
    access::PatientAccess,
    auth::{
        principal::require_auth,
        utils::{is_check_violation, is_foreign_key_violation, non_blank, parse_id},
        AuthState,
    },
    patients::{load_patient, storage::find_patient},
    ApiError, MessageResponse,
};

const NOT_ASSIGNED: &str = "Carer is not assigned to this patient";
const END_BEFORE_START: &str = "Shift end time must be after start time";

fn parse_shift_time(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|time| time.with_timezone(&Utc))
        .map_err(|_| ApiError::BadRequest("Invalid shift time"))
}

fn check_time_order(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ApiError> {
    if end > start {
        Ok(())
    } else {
        Err(ApiError::BadRequest(END_BEFORE_START))
    }
}

/// The carer must already be on the patient's roster.
fn rostered_carer(access: &PatientAccess, raw: &str) -> Result<Uuid, ApiError> {
    parse_id(raw)
        .filter(|carer_id| access.is_carer(*carer_id))
        .ok_or(ApiError::BadRequest(NOT_ASSIGNED))
}

/// Constraint failures that slip past the checks above under concurrent edits.
fn map_shift_write_error(err: sqlx::Error) -> ApiError {
    if is_foreign_key_violation(&err) {
        ApiError::BadRequest(NOT_ASSIGNED)
    } else if is_check_violation(&err) {
        ApiError::BadRequest(END_BEFORE_START)
    } else {
        err.into()
    }
}

async fn load_shift(pool: &PgPool, raw_id: &str) -> Result<ShiftRecord, ApiError> {
    let Some(id) = parse_id(raw_id) else {
        return Err(ApiError::NotFound("Shift not found"));
    };
    find_shift(pool, id)
        .await?
        .ok_or(ApiError::NotFound("Shift not found"))
}

async fn reload_shift(pool: &PgPool, id: Uuid) -> Result<Json<ShiftResponse>, ApiError> {
    let shift = find_shift(pool, id)
        .await?
        .ok_or(ApiError::NotFound("Shift not found"))?;
    Ok(Json(shift.into()))
}

#[utoipa::path(
    get,
    path = "/shift",
    responses(
        (status = 200, description = "Shifts the user coordinates or works.", body = [ShiftResponse]),
        (status = 401, description = "Missing or invalid session.", body = MessageResponse),
    ),
    tag = "shift"
)]
pub async fn list_shifts(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &auth_state).await?;
    let shifts: Vec<ShiftResponse> = list_shifts_for_user(&pool, principal.user_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(shifts))
}

#[utoipa::path(
    get,
    path = "/shift/{id}",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "The patient's shifts by start time.", body = [ShiftResponse]),
        (status = 400, description = "Patient not found.", body = MessageResponse),
        (status = 401, description = "Not the coordinator or a carer.", body = MessageResponse),
    ),
    tag = "shift"
)]
pub async fn patient_shifts(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &auth_state).await?;
    let patient = load_patient(&pool, &id).await?;
    patient.access().require_read(principal.user_id)?;

    let shifts: Vec<ShiftResponse> = list_shifts_for_patient(&pool, patient.id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(shifts))
}

#[utoipa::path(
    post,
    path = "/shift/{id}",
    params(("id" = String, Path, description = "Patient id")),
    request_body = CreateShiftRequest,
    responses(
        (status = 201, description = "Shift scheduled.", body = ShiftResponse),
        (status = 400, description = "Missing fields, patient not found, unrostered carer, or bad times.", body = MessageResponse),
        (status = 401, description = "Not the coordinator.", body = MessageResponse),
    ),
    tag = "shift"
)]
#[instrument(skip(headers, pool, auth_state, payload))]
pub async fn create_shift(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
    payload: Option<Json<CreateShiftRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &auth_state).await?;
    let Json(request) = payload.unwrap_or_default();

    let (Some(carer), Some(start), Some(end)) = (
        non_blank(request.carer_id.as_deref()),
        non_blank(request.shift_start_time.as_deref()),
        non_blank(request.shift_end_time.as_deref()),
    ) else {
        return Err(ApiError::MissingFields);
    };

    let patient = load_patient(&pool, &id).await?;
    let access = patient.access();
    access.require_coordinator(principal.user_id)?;

    let carer_id = rostered_carer(&access, carer)?;
    let start = parse_shift_time(start)?;
    let end = parse_shift_time(end)?;
    check_time_order(start, end)?;

    let shift_id = insert_shift(
        &pool,
        NewShift {
            patient_id: patient.id,
            coordinator_id: patient.coordinator_id,
            carer_id,
            start,
            end,
            coordinator_notes: request.coordinator_notes.as_deref().unwrap_or_default(),
        },
    )
    .await
    .map_err(map_shift_write_error)?;

    info!(shift_id = %shift_id, patient_id = %patient.id, carer_id = %carer_id, "shift scheduled");
    Ok((StatusCode::CREATED, reload_shift(&pool, shift_id).await?))
}

#[utoipa::path(
    put,
    path = "/shift/{id}",
    params(("id" = String, Path, description = "Shift id")),
    request_body = UpdateShiftRequest,
    responses(
        (status = 200, description = "Shift updated.", body = ShiftResponse),
        (status = 400, description = "Missing fields, shift not found, unrostered carer, or bad times.", body = MessageResponse),
        (status = 401, description = "Not the coordinator.", body = MessageResponse),
    ),
    tag = "shift"
)]
#[instrument(skip(headers, pool, auth_state, payload))]
pub async fn update_shift_handler(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
    payload: Option<Json<UpdateShiftRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &auth_state).await?;
    let Json(request) = payload.unwrap_or_default();

    let carer = non_blank(request.carer_id.as_deref());
    let start = non_blank(request.shift_start_time.as_deref());
    let end = non_blank(request.shift_end_time.as_deref());
    if carer.is_none() && start.is_none() && end.is_none() && request.coordinator_notes.is_none() {
        return Err(ApiError::MissingFields);
    }

    let shift = load_shift(&pool, &id).await?;
    shift.access().require_coordinator(principal.user_id)?;

    let carer_id = match carer {
        Some(raw) => {
            let patient = find_patient(&pool, shift.patient_id)
                .await?
                .ok_or(ApiError::NotFound("Patient not found"))?;
            rostered_carer(&patient.access(), raw)?
        }
        None => shift.carer_id,
    };
    let start = start.map(parse_shift_time).transpose()?.unwrap_or(shift.shift_start_time);
    let end = end.map(parse_shift_time).transpose()?.unwrap_or(shift.shift_end_time);
    check_time_order(start, end)?;

    let changes = ShiftChanges {
        carer_id,
        start,
        end,
        coordinator_notes: request
            .coordinator_notes
            .as_deref()
            .unwrap_or(shift.coordinator_notes.as_str()),
    };
    if !update_shift(&pool, shift.id, changes)
        .await
        .map_err(map_shift_write_error)?
    {
        return Err(ApiError::NotFound("Shift not found"));
    }

    reload_shift(&pool, shift.id).await
}

#[utoipa::path(
    delete,
    path = "/shift/{id}",
    params(("id" = String, Path, description = "Shift id")),
    responses(
        (status = 200, description = "Shift deleted.", body = MessageResponse),
        (status = 400, description = "Shift not found.", body = MessageResponse),
        (status = 401, description = "Not the coordinator.", body = MessageResponse),
    ),
    tag = "shift"
)]
#[instrument(skip(headers, pool, auth_state))]
pub async fn delete_shift_handler(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &auth_state).await?;
    let shift = load_shift(&pool, &id).await?;
    shift.access().require_coordinator(principal.user_id)?;

    if !delete_shift(&pool, shift.id).await? {
        return Err(ApiError::NotFound("Shift not found"));
    }

    info!(shift_id = %shift.id, "shift deleted");
    Ok(Json(MessageResponse::new(format!("Deleted shift {}", shift.id))))
}

#[utoipa::path(
    post,
    path = "/shift/notes/{id}",
    params(("id" = String, Path, description = "Shift id")),
    request_body = ShiftNotesRequest,
    responses(
        (status = 200, description = "Notes saved.", body = ShiftResponse),
        (status = 400, description = "Missing notes or shift not found.", body = MessageResponse),
        (status = 401, description = "Not the assigned carer.", body = MessageResponse),
    ),
    tag = "shift"
)]
#[instrument(skip(headers, pool, auth_state, payload))]
pub async fn submit_notes(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
    payload: Option<Json<ShiftNotesRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &auth_state).await?;
    let Json(request) = payload.unwrap_or_default();
    let Some(notes) = non_blank(request.shift_notes.as_deref()) else {
        return Err(ApiError::MissingFields);
    };

    let shift = load_shift(&pool, &id).await?;
    shift.access().require_assigned_carer(principal.user_id)?;

    if !submit_shift_notes(&pool, shift.id, notes).await? {
        return Err(ApiError::NotFound("Shift not found"));
    }
    reload_shift(&pool, shift.id).await
}

#[utoipa::path(
    post,
    path = "/shift/reports/{id}",
    params(("id" = String, Path, description = "Shift id")),
    request_body = IncidentReportRequest,
    responses(
        (status = 200, description = "Report appended.", body = ShiftResponse),
        (status = 400, description = "Missing report or shift not found.", body = MessageResponse),
        (status = 401, description = "Not the assigned carer.", body = MessageResponse),
    ),
    tag = "shift"
)]
#[instrument(skip(headers, pool, auth_state, payload))]
pub async fn submit_report(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
    payload: Option<Json<IncidentReportRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &auth_state).await?;
    let Json(request) = payload.unwrap_or_default();
    let Some(report) = non_blank(request.incident_report.as_deref()) else {
        return Err(ApiError::MissingFields);
    };

    let shift = load_shift(&pool, &id).await?;
    shift.access().require_assigned_carer(principal.user_id)?;

    match insert_incident_report(&pool, shift.id, principal.user_id, report).await {
        Ok(()) => {}
        Err(err) if is_foreign_key_violation(&err) => {
            return Err(ApiError::NotFound("Shift not found"));
        }
        Err(err) => return Err(err.into()),
    }

    info!(shift_id = %shift.id, author_id = %principal.user_id, "incident reported");
    reload_shift(&pool, shift.id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn shift_times_are_rfc3339() -> anyhow::Result<()> {
        let parsed = parse_shift_time("2024-03-01T09:00:00+02:00")?;
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap());
        assert!(matches!(
            parse_shift_time("tomorrow morning"),
            Err(ApiError::BadRequest("Invalid shift time"))
        ));
        Ok(())
    }

    #[test]
    fn end_must_follow_start() -> anyhow::Result<()> {
        let start = parse_shift_time("2024-03-01T09:00:00Z")?;
        let end = parse_shift_time("2024-03-01T17:00:00Z")?;
        assert!(check_time_order(start, end).is_ok());
        assert!(matches!(
            check_time_order(end, start),
            Err(ApiError::BadRequest(END_BEFORE_START))
        ));
        assert!(check_time_order(start, start).is_err());
        Ok(())
    }

    #[test]
    fn carer_must_be_rostered() {
        let carer = Uuid::new_v4();
        let access = PatientAccess {
            coordinator_id: Uuid::new_v4(),
            carer_ids: vec![carer],
        };
        assert_eq!(rostered_carer(&access, &carer.to_string()).ok(), Some(carer));
        assert!(matches!(
            rostered_carer(&access, &Uuid::new_v4().to_string()),
            Err(ApiError::BadRequest(NOT_ASSIGNED))
        ));
        assert!(matches!(
            rostered_carer(&access, &access.coordinator_id.to_string()),
            Err(ApiError::BadRequest(NOT_ASSIGNED))
        ));
        assert!(rostered_carer(&access, "nobody").is_err());
    }

    #[test]
    fn shift_response_shape() -> anyhow::Result<()> {
        let now = Utc::now();
        let record = ShiftRecord {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            coordinator_id: Uuid::new_v4(),
            carer_id: Uuid::new_v4(),
            shift_start_time: now,
            shift_end_time: now,
            coordinator_notes: String::new(),
            shift_notes: None,
            shift_notes_submitted_at: None,
            incident_reports: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(ShiftResponse::from(record.clone()))?;
        assert!(value["shiftNotes"].is_null());
        assert_eq!(value["incidentReports"], serde_json::json!([]));
        assert_eq!(value["carer"], record.carer_id.to_string());

        let with_notes = ShiftRecord {
            shift_notes: Some("Quiet night".to_string()),
            shift_notes_submitted_at: Some(now),
            ..record
        };
        let value = serde_json::to_value(ShiftResponse::from(with_notes))?;
        assert_eq!(value["shiftNotes"]["notes"], "Quiet night");
        assert!(value["shiftNotes"].get("submittedAt").is_some());
        Ok(())
    }

    #[test]
    fn carer_accepted_under_either_key() -> anyhow::Result<()> {
        let carer = Uuid::new_v4().to_string();

        let update: UpdateShiftRequest = serde_json::from_value(serde_json::json!({
            "carer": carer,
            "shiftStartTime": "2024-03-01T09:00:00Z",
        }))?;
        assert_eq!(update.carer_id.as_deref(), Some(carer.as_str()));

        let update: UpdateShiftRequest =
            serde_json::from_value(serde_json::json!({ "carerID": carer }))?;
        assert_eq!(update.carer_id.as_deref(), Some(carer.as_str()));

        let create: CreateShiftRequest =
            serde_json::from_value(serde_json::json!({ "carer": carer }))?;
        assert_eq!(create.carer_id.as_deref(), Some(carer.as_str()));
        Ok(())
    }
}

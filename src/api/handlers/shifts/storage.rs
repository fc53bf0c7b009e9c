//! Shift queries. Incident reports are folded into each row as JSON.

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::types::IncidentReport;
use crate::api::handlers::{access::ShiftAccess, db_span};

const SHIFT_SELECT: &str = r"
    SELECT s.id, s.patient_id, s.coordinator_id, s.carer_id,
        s.shift_start_time, s.shift_end_time, s.coordinator_notes,
        s.shift_notes, s.shift_notes_submitted_at, s.created_at, s.updated_at,
        COALESCE(
            (
                SELECT JSON_AGG(
                    JSON_BUILD_OBJECT(
                        'id', r.id,
                        'report', r.report,
                        'author', r.author_id,
                        'createdAt', r.created_at
                    )
                    ORDER BY r.created_at
                )
                FROM incident_reports r
                WHERE r.shift_id = s.id
            ),
            '[]'::json
        ) AS incident_reports
    FROM shifts s
";

#[derive(Debug, Clone)]
pub(crate) struct ShiftRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub coordinator_id: Uuid,
    pub carer_id: Uuid,
    pub shift_start_time: DateTime<Utc>,
    pub shift_end_time: DateTime<Utc>,
    pub coordinator_notes: String,
    pub shift_notes: Option<String>,
    pub shift_notes_submitted_at: Option<DateTime<Utc>>,
    pub incident_reports: Vec<IncidentReport>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShiftRecord {
    pub(crate) fn access(&self) -> ShiftAccess {
        ShiftAccess {
            coordinator_id: self.coordinator_id,
            carer_id: self.carer_id,
        }
    }
}

/// Columns for a new shift; `coordinator_id` is copied from the patient.
#[derive(Debug)]
pub(crate) struct NewShift<'a> {
    pub patient_id: Uuid,
    pub coordinator_id: Uuid,
    pub carer_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub coordinator_notes: &'a str,
}

/// Fully resolved values for an update; unchanged fields carry the old value.
#[derive(Debug)]
pub(crate) struct ShiftChanges<'a> {
    pub carer_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub coordinator_notes: &'a str,
}

fn shift_from_row(row: &PgRow) -> Result<ShiftRecord, sqlx::Error> {
    let Json(incident_reports): Json<Vec<IncidentReport>> = row.try_get("incident_reports")?;
    Ok(ShiftRecord {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        coordinator_id: row.try_get("coordinator_id")?,
        carer_id: row.try_get("carer_id")?,
        shift_start_time: row.try_get("shift_start_time")?,
        shift_end_time: row.try_get("shift_end_time")?,
        coordinator_notes: row.try_get("coordinator_notes")?,
        shift_notes: row.try_get("shift_notes")?,
        shift_notes_submitted_at: row.try_get("shift_notes_submitted_at")?,
        incident_reports,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(crate) async fn find_shift(pool: &PgPool, id: Uuid) -> Result<Option<ShiftRecord>, sqlx::Error> {
    let query = format!("{SHIFT_SELECT} WHERE s.id = $1");
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    row.as_ref().map(shift_from_row).transpose()
}

/// Shifts the user coordinates or works, by start time.
pub(crate) async fn list_shifts_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<ShiftRecord>, sqlx::Error> {
    let query = format!(
        "{SHIFT_SELECT}
        WHERE s.coordinator_id = $1 OR s.carer_id = $1
        ORDER BY s.shift_start_time ASC"
    );
    let rows = sqlx::query(&query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    rows.iter().map(shift_from_row).collect()
}

pub(crate) async fn list_shifts_for_patient(
    pool: &PgPool,
    patient_id: Uuid,
) -> Result<Vec<ShiftRecord>, sqlx::Error> {
    let query = format!(
        "{SHIFT_SELECT}
        WHERE s.patient_id = $1
        ORDER BY s.shift_start_time ASC"
    );
    let rows = sqlx::query(&query)
        .bind(patient_id)
        .fetch_all(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    rows.iter().map(shift_from_row).collect()
}

pub(crate) async fn insert_shift(pool: &PgPool, shift: NewShift<'_>) -> Result<Uuid, sqlx::Error> {
    let query = r"
        INSERT INTO shifts
            (patient_id, coordinator_id, carer_id, shift_start_time, shift_end_time, coordinator_notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
    ";
    let row = sqlx::query(query)
        .bind(shift.patient_id)
        .bind(shift.coordinator_id)
        .bind(shift.carer_id)
        .bind(shift.start)
        .bind(shift.end)
        .bind(shift.coordinator_notes)
        .fetch_one(pool)
        .instrument(db_span("INSERT", query))
        .await?;
    row.try_get("id")
}

pub(crate) async fn update_shift(
    pool: &PgPool,
    id: Uuid,
    changes: ShiftChanges<'_>,
) -> Result<bool, sqlx::Error> {
    let query = r"
        UPDATE shifts
        SET carer_id = $2,
            shift_start_time = $3,
            shift_end_time = $4,
            coordinator_notes = $5,
            updated_at = NOW()
        WHERE id = $1
    ";
    let result = sqlx::query(query)
        .bind(id)
        .bind(changes.carer_id)
        .bind(changes.start)
        .bind(changes.end)
        .bind(changes.coordinator_notes)
        .execute(pool)
        .instrument(db_span("UPDATE", query))
        .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn delete_shift(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let query = "DELETE FROM shifts WHERE id = $1";
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(db_span("DELETE", query))
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Replace the carer's notes and stamp the submission time.
pub(crate) async fn submit_shift_notes(
    pool: &PgPool,
    id: Uuid,
    notes: &str,
) -> Result<bool, sqlx::Error> {
    let query = r"
        UPDATE shifts
        SET shift_notes = $2,
            shift_notes_submitted_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
    ";
    let result = sqlx::query(query)
        .bind(id)
        .bind(notes)
        .execute(pool)
        .instrument(db_span("UPDATE", query))
        .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn insert_incident_report(
    pool: &PgPool,
    shift_id: Uuid,
    author_id: Uuid,
    report: &str,
) -> Result<(), sqlx::Error> {
    let query = r"
        INSERT INTO incident_reports (shift_id, author_id, report)
        VALUES ($1, $2, $3)
    ";
    sqlx::query(query)
        .bind(shift_id)
        .bind(author_id)
        .bind(report)
        .execute(pool)
        .instrument(db_span("INSERT", query))
        .await?;
    Ok(())
}

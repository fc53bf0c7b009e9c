use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::storage::ShiftRecord;

#[derive(Debug, Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateShiftRequest {
    #[serde(rename = "carerID", alias = "carer")]
    pub carer_id: Option<String>,
    /// RFC 3339 timestamp.
    pub shift_start_time: Option<String>,
    /// RFC 3339 timestamp, after the start.
    pub shift_end_time: Option<String>,
    pub coordinator_notes: Option<String>,
}

/// Any subset of the creation fields.
#[derive(Debug, Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShiftRequest {
    #[serde(rename = "carerID", alias = "carer")]
    pub carer_id: Option<String>,
    pub shift_start_time: Option<String>,
    pub shift_end_time: Option<String>,
    pub coordinator_notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ShiftNotesRequest {
    pub shift_notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct IncidentReportRequest {
    pub incident_report: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShiftNotes {
    pub notes: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IncidentReport {
    pub id: Uuid,
    pub report: String,
    pub author: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ShiftResponse {
    pub id: Uuid,
    pub patient: Uuid,
    pub coordinator: Uuid,
    pub carer: Uuid,
    pub shift_start_time: DateTime<Utc>,
    pub shift_end_time: DateTime<Utc>,
    pub coordinator_notes: String,
    pub shift_notes: Option<ShiftNotes>,
    pub incident_reports: Vec<IncidentReport>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ShiftRecord> for ShiftResponse {
    fn from(record: ShiftRecord) -> Self {
        let shift_notes = record.shift_notes.map(|notes| ShiftNotes {
            notes,
            submitted_at: record.shift_notes_submitted_at.unwrap_or(record.updated_at),
        });
        Self {
            id: record.id,
            patient: record.patient_id,
            coordinator: record.coordinator_id,
            carer: record.carer_id,
            shift_start_time: record.shift_start_time,
            shift_end_time: record.shift_end_time,
            coordinator_notes: record.coordinator_notes,
            shift_notes,
            incident_reports: record.incident_reports,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

//! Patient and roster queries.

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::handlers::{access::PatientAccess, db_span};

/// Patient columns plus the roster aggregated in `added_at` order.
const PATIENT_SELECT: &str = r"
    SELECT p.id, p.first_name, p.last_name, p.coordinator_id, p.created_at, p.updated_at,
        COALESCE(
            ARRAY_AGG(pc.carer_id ORDER BY pc.added_at) FILTER (WHERE pc.carer_id IS NOT NULL),
            '{}'
        ) AS carer_ids
    FROM patients p
    LEFT JOIN patient_carers pc ON pc.patient_id = p.id
";

#[derive(Debug, Clone)]
pub(crate) struct PatientRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub coordinator_id: Uuid,
    pub carer_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PatientRecord {
    pub(crate) fn access(&self) -> PatientAccess {
        PatientAccess {
            coordinator_id: self.coordinator_id,
            carer_ids: self.carer_ids.clone(),
        }
    }

    pub(crate) fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PersonRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

fn patient_from_row(row: &PgRow) -> Result<PatientRecord, sqlx::Error> {
    Ok(PatientRecord {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        coordinator_id: row.try_get("coordinator_id")?,
        carer_ids: row.try_get("carer_ids")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(crate) async fn find_patient(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<PatientRecord>, sqlx::Error> {
    let query = format!("{PATIENT_SELECT} WHERE p.id = $1 GROUP BY p.id");
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    row.as_ref().map(patient_from_row).transpose()
}

/// Patients the user coordinates or cares for, oldest first.
pub(crate) async fn list_patients_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<PatientRecord>, sqlx::Error> {
    let query = format!(
        "{PATIENT_SELECT}
        WHERE p.coordinator_id = $1
           OR EXISTS (
               SELECT 1 FROM patient_carers mine
               WHERE mine.patient_id = p.id AND mine.carer_id = $1
           )
        GROUP BY p.id
        ORDER BY p.created_at ASC"
    );
    let rows = sqlx::query(&query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    rows.iter().map(patient_from_row).collect()
}

pub(crate) async fn insert_patient(
    pool: &PgPool,
    coordinator_id: Uuid,
    first_name: &str,
    last_name: &str,
) -> Result<PatientRecord, sqlx::Error> {
    let query = r"
        INSERT INTO patients (first_name, last_name, coordinator_id)
        VALUES ($1, $2, $3)
        RETURNING id, first_name, last_name, coordinator_id, created_at, updated_at,
            '{}'::uuid[] AS carer_ids
    ";
    let row = sqlx::query(query)
        .bind(first_name)
        .bind(last_name)
        .bind(coordinator_id)
        .fetch_one(pool)
        .instrument(db_span("INSERT", query))
        .await?;
    patient_from_row(&row)
}

/// Apply the provided names. The coordinator is never changed.
pub(crate) async fn update_patient(
    pool: &PgPool,
    id: Uuid,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<Option<PatientRecord>, sqlx::Error> {
    let query = r"
        UPDATE patients
        SET first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            updated_at = NOW()
        WHERE id = $1
    ";
    sqlx::query(query)
        .bind(id)
        .bind(first_name)
        .bind(last_name)
        .execute(pool)
        .instrument(db_span("UPDATE", query))
        .await?;
    find_patient(pool, id).await
}

/// Roster and shifts go with it through `ON DELETE CASCADE`.
pub(crate) async fn delete_patient(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let query = "DELETE FROM patients WHERE id = $1";
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(db_span("DELETE", query))
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Load users by id, returned in the order of `ids`. Unknown ids are skipped.
pub(crate) async fn load_people(
    pool: &PgPool,
    ids: &[Uuid],
) -> Result<Vec<PersonRecord>, sqlx::Error> {
    let query = r"
        SELECT id, first_name, last_name, email
        FROM users
        WHERE id = ANY($1)
    ";
    let rows = sqlx::query(query)
        .bind(ids)
        .fetch_all(pool)
        .instrument(db_span("SELECT", query))
        .await?;

    let mut people = rows
        .iter()
        .map(|row| {
            Ok(PersonRecord {
                id: row.try_get("id")?,
                first_name: row.try_get("first_name")?,
                last_name: row.try_get("last_name")?,
                email: row.try_get("email")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;
    people.sort_by_key(|person| ids.iter().position(|id| *id == person.id));
    Ok(people)
}

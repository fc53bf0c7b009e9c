use sqlx::PgPool;
use tracing::Instrument;
use uuid::Uuid;

use crate::api::handlers::db_span;

/// Add a carer to a roster. `false` when the pair already exists.
pub(crate) async fn add_carer(
    pool: &PgPool,
    patient_id: Uuid,
    carer_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let query = r"
        INSERT INTO patient_carers (patient_id, carer_id)
        VALUES ($1, $2)
        ON CONFLICT (patient_id, carer_id) DO NOTHING
    ";
    let result = sqlx::query(query)
        .bind(patient_id)
        .bind(carer_id)
        .execute(pool)
        .instrument(db_span("INSERT", query))
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Drop a carer from a roster; their shifts for the patient cascade.
/// `false` when the carer was not on the roster.
pub(crate) async fn remove_carer(
    pool: &PgPool,
    patient_id: Uuid,
    carer_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let query = "DELETE FROM patient_carers WHERE patient_id = $1 AND carer_id = $2";
    let result = sqlx::query(query)
        .bind(patient_id)
        .bind(carer_id)
        .execute(pool)
        .instrument(db_span("DELETE", query))
        .await?;
    Ok(result.rows_affected() == 1)
}

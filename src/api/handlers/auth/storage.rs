//! User persistence for registration, login, and email confirmation.

use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::utils::is_unique_violation;
use crate::api::{
    email::{self, OutboundEmail},
    handlers::{db_span, ApiError},
};

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, confirmed";

#[derive(Debug, Clone)]
pub(crate) struct UserRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub confirmed: bool,
}

#[derive(Debug)]
pub(crate) struct NewUser<'a> {
    pub id: Uuid,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

fn user_from_row(row: &PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        confirmed: row.get("confirmed"),
    }
}

pub(crate) async fn find_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    Ok(row.as_ref().map(user_from_row))
}

pub(crate) async fn find_user_by_id(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    Ok(row.as_ref().map(user_from_row))
}

/// Insert the user and queue the verification email in one transaction.
/// A duplicate email surfaces as a `400` through the unique index.
pub(crate) async fn insert_user_with_verification(
    pool: &PgPool,
    user: NewUser<'_>,
    verification: &OutboundEmail,
) -> Result<UserRecord, ApiError> {
    let mut tx = pool.begin().await?;

    let query = format!(
        "INSERT INTO users (id, first_name, last_name, email, password_hash) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
    );
    let inserted = sqlx::query(&query)
        .bind(user.id)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.email)
        .bind(user.password_hash)
        .fetch_one(&mut *tx)
        .instrument(db_span("INSERT", &query))
        .await;

    let row = match inserted {
        Ok(row) => row,
        Err(err) if is_unique_violation(&err) => {
            return Err(ApiError::BadRequest(
                "This email is associated with an account already.",
            ));
        }
        Err(err) => return Err(ApiError::Database(err)),
    };

    email::enqueue(&mut *tx, verification).await?;
    tx.commit().await?;

    Ok(user_from_row(&row))
}

/// Flip `confirmed` once. Returns `false` if the user was already confirmed.
pub(crate) async fn confirm_user(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let query = r"
        UPDATE users
        SET confirmed = TRUE, updated_at = NOW()
        WHERE id = $1 AND confirmed = FALSE
    ";
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(db_span("UPDATE", query))
        .await?;
    Ok(result.rows_affected() == 1)
}

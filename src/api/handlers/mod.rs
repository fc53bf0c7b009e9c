//! Route handlers and the pieces they share.
//!
//! Every protected handler follows the same order: authenticate, check the
//! required fields, load the resource (`400` if missing), authorize against
//! its roster (`401` if denied), then apply business rules and write.

pub mod access;
pub mod auth;
pub mod carers;
pub mod error;
pub mod health;
pub mod patients;
pub mod shifts;
pub mod user;
pub mod user_login;
pub mod user_register;
pub mod user_verification;

pub use error::ApiError;

use serde::{Deserialize, Serialize};
use tracing::{info_span, Span};
use utoipa::ToSchema;

/// `{"message": "..."}` body used for errors and plain acknowledgements.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Span wrapped around each SQL statement.
pub(crate) fn db_span(operation: &str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

//! Error type shared by every handler.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use super::{auth::tokens::TokenError, MessageResponse};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Please fill out all fields")]
    MissingFields,
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("No authorization token found")]
    NoToken,
    #[error("{0}")]
    InvalidToken(&'static str),
    #[error("User is not authorized")]
    NotAuthorized,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingFields | Self::BadRequest(_) | Self::NotFound(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NoToken | Self::InvalidToken(_) | Self::NotAuthorized => {
                StatusCode::UNAUTHORIZED
            }
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Signing failures only; verification errors are mapped by each handler.
impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        Self::Internal(anyhow::Error::new(err))
    }
}

impl IntoResponse for ApiError {
    /// Server-side failures are logged and surfaced without details.
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Database(err) => {
                error!("Database error: {err}");
                "Internal server error".to_string()
            }
            Self::Internal(err) => {
                error!("Internal error: {err:#}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(MessageResponse { message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_message(err: ApiError) -> anyhow::Result<(StatusCode, String)> {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;
        let message = body
            .get("message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok((status, message))
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() -> anyhow::Result<()> {
        assert_eq!(
            body_message(ApiError::MissingFields).await?,
            (StatusCode::BAD_REQUEST, "Please fill out all fields".to_string())
        );
        assert_eq!(
            body_message(ApiError::NotFound("Shift not found")).await?,
            (StatusCode::BAD_REQUEST, "Shift not found".to_string())
        );
        assert_eq!(
            body_message(ApiError::NoToken).await?,
            (
                StatusCode::UNAUTHORIZED,
                "No authorization token found".to_string()
            )
        );
        assert_eq!(
            body_message(ApiError::NotAuthorized).await?,
            (StatusCode::UNAUTHORIZED, "User is not authorized".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn server_errors_hide_details() -> anyhow::Result<()> {
        let (status, message) =
            body_message(ApiError::Internal(anyhow::anyhow!("secret detail"))).await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");

        let (status, message) = body_message(ApiError::Database(sqlx::Error::PoolTimedOut)).await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");
        Ok(())
    }
}

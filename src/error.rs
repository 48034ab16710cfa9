//! ==============================================================================
//! error.rs - typed errors for storage and the http api
//! ==============================================================================
//!
//! purpose:
//!     storage failures are matched on (the fallback decorator absorbs write
//!     errors, the api turns read errors into 500s), so they get real enum
//!     variants instead of anyhow strings.
//!
//! relationships:
//!     - used by: storage/*.rs (StorageError)
//!     - used by: api.rs (ApiError -> json error envelope)
//!
//! ==============================================================================

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use crate::domain::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// non-2xx answer from the table service
    #[error("table service returned {status}: {code} {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("invalid account key: {0}")]
    InvalidAccountKey(#[from] base64::DecodeError),

    #[error("malformed table response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StorageError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Service { status: 409, .. })
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    /// details stay in the server log; the client only sees a generic message
    #[error("Internal server error")]
    Internal(#[from] StorageError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(source) = &self {
            tracing::error!("request failed: {}", source);
        }
        let body = serde_json::json!({
            "success": false,
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

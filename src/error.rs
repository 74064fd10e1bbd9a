//! Unified error handling for recent-messages.
//!
//! [`ServiceError`] collects the failures of the read path and the bot;
//! [`ApiError`] is what the HTTP layer turns them into.

use crate::container::ContainerError;
use crate::db::DbError;
use crate::feed::FeedError;
use crate::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Service Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("registry error: {0}")]
    Registry(#[from] DbError),

    #[error("malformed stored message: {0}")]
    Container(#[from] ContainerError),

    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("invalid channel name: {0}")]
    InvalidChannel(String),
}

impl ServiceError {
    /// Get a static error code string for logs and metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Store(_) => "store_error",
            Self::Registry(_) => "registry_error",
            Self::Container(_) => "malformed_message",
            Self::Feed(_) => "feed_error",
            Self::InvalidChannel(_) => "invalid_channel",
        }
    }
}

// ============================================================================
// HTTP Errors
// ============================================================================

/// Error body returned by the HTTP API.
#[derive(Debug, Serialize)]
struct ErrorBody {
    status: u16,
    message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidChannel(_) => {
                Self::new(StatusCode::BAD_REQUEST, "Invalid channel name format")
            }
            other => {
                tracing::error!(error = %other, code = other.error_code(), "Request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: self.status.as_u16(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

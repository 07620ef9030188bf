//! # API Error Types
//!
//! Every non-2xx response produced by this crate has the same body:
//!
//! ```json
//! { "error": "Bad Request", "message": "...", "statusCode": 400 }
//! ```
//!
//! `error` is the reason phrase of the status and `statusCode` is always a
//! JSON number. Validation rejections, unparsable bodies and oversized
//! bodies all go through [`ApiError`]. Configuration failures never reach
//! this type: they stop [`Server::build`](crate::Server::build) instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqgate_core::ValidationErrorDetail;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured JSON error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Reason phrase, e.g. `"Bad Request"`.
    pub error: String,
    /// Human-readable detail.
    pub message: String,
    /// Numeric HTTP status.
    pub status_code: u16,
}

impl ErrorBody {
    /// Body for `status` carrying `message`.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: message.into(),
            status_code: status.as_u16(),
        }
    }
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The body was rejected by its route's validator, or did not parse (400).
    #[error("{0}")]
    BadRequest(String),

    /// The body exceeded the configured limit (413).
    #[error("{0}")]
    PayloadTooLarge(String),
}

impl ApiError {
    /// The HTTP status code for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// The body sent to the client.
    pub fn body(&self) -> ErrorBody {
        let (Self::BadRequest(message) | Self::PayloadTooLarge(message)) = self;
        ErrorBody::new(self.status(), message.clone())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!(status = %self.status(), error = %self, "request refused");
        (self.status(), Json(self.body())).into_response()
    }
}

/// A validation rejection is a client error.
impl From<ValidationErrorDetail> for ApiError {
    fn from(detail: ValidationErrorDetail) -> Self {
        Self::BadRequest(detail.message())
    }
}

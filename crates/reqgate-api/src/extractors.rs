//! # Request Body Extraction
//!
//! Bodies are read as raw bytes so that an empty body can be told apart
//! from a JSON `null`: an empty (or whitespace-only) body is absent, and the
//! route validator sees `null` only because the invoker substitutes it.

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

/// A request body accepted by its route's validator, after coercion and
/// additional-property removal.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBody(pub Value);

impl ValidatedBody {
    /// The accepted JSON value.
    pub fn into_inner(self) -> Value {
        self.0
    }

    /// Deserialize the accepted value into a typed request.
    ///
    /// # Errors
    ///
    /// [`ApiError::BadRequest`] if the value does not fit `T`.
    pub fn parse<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        serde_json::from_value(self.0).map_err(|err| ApiError::BadRequest(err.to_string()))
    }
}

/// Turn the raw body extraction result into an optional JSON value.
///
/// # Errors
///
/// - [`ApiError::PayloadTooLarge`] when the body limit was exceeded.
/// - [`ApiError::BadRequest`] when the body could not be read or is not JSON.
pub fn parse_body(result: Result<Bytes, BytesRejection>) -> Result<Option<Value>, ApiError> {
    let bytes = result.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    })?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|err| ApiError::BadRequest(err.to_string()))
}

//! # Validation Outcomes
//!
//! Every validator, whatever engine produced it, answers with a
//! [`ValidationOutcome`]. Rejections carry either structured
//! [`ViolationRecord`]s (default engine) or a free-form message (custom
//! engines and panics). Both collapse to a single string through
//! [`ValidationErrorDetail::message`], which is what the 400 response carries.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One violated constraint, reported in schema-traversal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationRecord {
    /// Schema keyword that failed (`type`, `required`, ...).
    pub keyword: String,
    /// Dotted instance path, e.g. `.hello` or `.items[0]`. Empty at the root.
    pub path: String,
    /// `#`-prefixed JSON pointer to the failing keyword in the schema.
    pub schema_path: String,
    /// Keyword-specific parameters, e.g. `{"type": "integer"}`.
    pub params: Value,
    /// Human-readable description.
    pub message: String,
}

/// Why a body was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationErrorDetail {
    /// Structured violations from the default engine.
    Violations(Vec<ViolationRecord>),
    /// Free-form message from a custom engine or a caught panic.
    Message(String),
}

impl ValidationErrorDetail {
    /// The rejection message sent to clients.
    ///
    /// Violations render as the JSON array of records; messages verbatim.
    pub fn message(&self) -> String {
        match self {
            Self::Violations(records) => serde_json::to_string(records)
                .unwrap_or_else(|e| format!("unserializable violation records: {e}")),
            Self::Message(message) => message.clone(),
        }
    }

    /// Structured records, empty for message-only rejections.
    pub fn violations(&self) -> &[ViolationRecord] {
        match self {
            Self::Violations(records) => records,
            Self::Message(_) => &[],
        }
    }
}

impl fmt::Display for ValidationErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Result of running a compiled validator over a body.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// The body conforms. Carries the body the handler must see, which may
    /// differ from the input through coercion or property stripping.
    Accepted(Value),
    /// The body does not conform. The handler must not run.
    Rejected(ValidationErrorDetail),
}

impl ValidationOutcome {
    /// Shorthand for a message-only rejection.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(ValidationErrorDetail::Message(message.into()))
    }

    /// Whether the body was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// Convert into a `Result`, accepted bodies on the `Ok` side.
    pub fn into_result(self) -> Result<Value, ValidationErrorDetail> {
        match self {
            Self::Accepted(body) => Ok(body),
            Self::Rejected(detail) => Err(detail),
        }
    }
}

impl From<Result<Value, ValidationErrorDetail>> for ValidationOutcome {
    fn from(result: Result<Value, ValidationErrorDetail>) -> Self {
        match result {
            Ok(body) => Self::Accepted(body),
            Err(detail) => Self::Rejected(detail),
        }
    }
}

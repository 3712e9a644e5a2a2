//! Error taxonomy shared by every crate in the workspace.
//!
//! Each variant carries a human-readable cause; `kind()` gives the compact
//! machine-facing label that API envelopes report.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WfmError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("capacity exhausted: {0}")]
    Capacity(String),

    #[error("upstream failure: {0}")]
    Upstream(String),
}

pub type WfmResult<T> = Result<T, WfmError>;

/// Compact error label for API responses and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Timeout,
    Cancelled,
    Capacity,
    Upstream,
}

impl WfmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WfmError::NotFound(_) => ErrorKind::NotFound,
            WfmError::Validation(_) => ErrorKind::Validation,
            WfmError::Conflict(_) => ErrorKind::Conflict,
            WfmError::Timeout(_) => ErrorKind::Timeout,
            WfmError::Cancelled(_) => ErrorKind::Cancelled,
            WfmError::Capacity(_) => ErrorKind::Capacity,
            WfmError::Upstream(_) => ErrorKind::Upstream,
        }
    }
}

/// Partial-success envelope for batch operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<EnvelopeError>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub kind: ErrorKind,
    pub cause: String,
    /// Subject the error applies to (employee id, service id, ...).
    pub subject: Option<String>,
}

impl ResultEnvelope {
    pub fn ok(&mut self) {
        self.success_count += 1;
    }

    pub fn record(&mut self, subject: Option<String>, err: &WfmError) {
        self.error_count += 1;
        self.errors.push(EnvelopeError {
            kind: err.kind(),
            cause: err.to_string(),
            subject,
        });
    }
}

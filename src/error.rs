//! Worker-wide failure classification (spec §7)
//!
//! Every error surface in the runtime — dispatch, auth, storage, cache —
//! eventually collapses into one of these kinds so the runtime can decide
//! how to report it to the API and whether it was worth alerting on.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network / 5xx / throttling. Locally retried where policy allows;
    /// otherwise reported as `failed: transient`.
    Transient,
    /// Payload fails schema decode or semantic validation. Never retried.
    InvalidInput,
    /// Handler or assessment raised an unexpected error. Alert-worthy.
    Internal,
    /// Claimed a job whose type isn't registered. Indicates config drift.
    UnknownJobType,
    /// Object-store upload exhausted its retry budget.
    UploadFailure,
    /// Credentials rejected even after a token refresh.
    AuthFailure,
    /// The in-flight job was abandoned due to a termination signal.
    Cancelled,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Transient => "transient",
            FailureKind::InvalidInput => "invalid_input",
            FailureKind::Internal => "internal",
            FailureKind::UnknownJobType => "invalid_input",
            FailureKind::UploadFailure => "upload",
            FailureKind::AuthFailure => "auth_failure",
            FailureKind::Cancelled => "cancelled",
        }
    }

    /// Whether this failure kind should trigger an observability alert
    /// (spec §7: "InternalError ... observability alert emitted").
    pub fn is_alert_worthy(self) -> bool {
        matches!(self, FailureKind::Internal | FailureKind::UnknownJobType)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified, human-readable failure ready to be POSTed back to the
/// API as a job result (spec §6 `POST /jobs/assignments/<id>/result`).
#[derive(Debug, Clone)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

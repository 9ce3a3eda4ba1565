// ── Core error types ──
//
// User-facing errors from pbxctl-core. Manager-protocol failures are
// translated into domain variants by the `From<pbxctl_ami::Error>` impl, so
// consumers never match on wire-level details.

use thiserror::Error;

use crate::model::RecordKind;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to switch at {target}: {reason}")]
    ConnectionFailed { target: String, reason: String },

    #[error("Switch authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Not connected to the switch")]
    NotConnected,

    #[error("Connection to the switch was lost")]
    ConnectionLost,

    #[error("Switch did not answer {action} within {timeout_ms}ms")]
    Timeout { action: String, timeout_ms: u64 },

    // ── Switch errors ────────────────────────────────────────────────
    #[error("Switch rejected {action}: {message}")]
    SwitchRejected { action: String, message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("{kind} not found: {identifier}")]
    NotFound {
        kind: RecordKind,
        identifier: String,
    },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("SIP trace logging is disabled")]
    TraceLoggingDisabled,

    #[error("Record store error: {message}")]
    Store { message: String },

    // ── Filesystem ───────────────────────────────────────────────────
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(kind: RecordKind, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            identifier: identifier.into(),
        }
    }

    /// Returns `true` when the switch could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::NotConnected
                | Self::ConnectionLost
                | Self::AuthenticationFailed { .. }
        )
    }
}

// ── Conversion from manager-protocol errors ──────────────────────────

impl From<pbxctl_ami::Error> for CoreError {
    fn from(err: pbxctl_ami::Error) -> Self {
        match err {
            pbxctl_ami::Error::Connect { addr, reason } => CoreError::ConnectionFailed {
                target: addr,
                reason,
            },
            pbxctl_ami::Error::Io(e) => CoreError::ConnectionFailed {
                target: String::new(),
                reason: e.to_string(),
            },
            pbxctl_ami::Error::Protocol(message) => {
                CoreError::Internal(format!("Manager protocol error: {message}"))
            }
            pbxctl_ami::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            pbxctl_ami::Error::NotConnected | pbxctl_ami::Error::Shutdown => {
                CoreError::NotConnected
            }
            pbxctl_ami::Error::ConnectionLost => CoreError::ConnectionLost,
            pbxctl_ami::Error::ActionFailed { action, message } => {
                CoreError::SwitchRejected { action, message }
            }
            pbxctl_ami::Error::ActionTimeout { action, timeout_ms } => {
                CoreError::Timeout { action, timeout_ms }
            }
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Store {
            message: err.to_string(),
        }
    }
}

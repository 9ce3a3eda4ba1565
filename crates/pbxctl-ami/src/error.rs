use thiserror::Error;

/// Top-level error type for the `pbxctl-ami` crate.
///
/// Connectivity failures are recovered by the client's reconnection loop;
/// callers only ever observe them as [`Error::NotConnected`] or
/// [`Error::ConnectionLost`] on their own in-flight actions.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// TCP connect failed or timed out.
    #[error("Cannot connect to manager interface at {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// Read or write on an established stream failed.
    #[error("Manager I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer sent something that is not AMI framing.
    #[error("Manager protocol error: {0}")]
    Protocol(String),

    // ── Session ─────────────────────────────────────────────────────
    /// Login was rejected by the switch.
    #[error("Manager authentication failed: {message}")]
    Authentication { message: String },

    /// No live session; the action was never sent.
    #[error("Not connected to the manager interface")]
    NotConnected,

    /// The session dropped before the action's response arrived.
    #[error("Manager connection lost")]
    ConnectionLost,

    /// The client was stopped while the operation was in progress.
    #[error("Manager client shut down")]
    Shutdown,

    // ── Actions ─────────────────────────────────────────────────────
    /// The switch answered `Response: Error`.
    #[error("Action {action} failed: {message}")]
    ActionFailed { action: String, message: String },

    /// No response within the configured per-action timeout.
    #[error("Action {action} timed out after {timeout_ms}ms")]
    ActionTimeout { action: String, timeout_ms: u64 },
}

impl Error {
    /// Returns `true` for failures caused by the session rather than the action.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::Io(_)
                | Self::NotConnected
                | Self::ConnectionLost
                | Self::Shutdown
        )
    }

    /// Returns `true` if the switch itself rejected the action.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::ActionFailed { .. } | Self::Authentication { .. }
        )
    }
}

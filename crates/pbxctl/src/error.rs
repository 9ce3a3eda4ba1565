//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use pbxctl_config::ConfigError;
use pbxctl_core::{CoreError, RecordKind};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to the switch at {target}")]
    #[diagnostic(
        code(pbxctl::connection_failed),
        help(
            "Check that the manager interface is enabled and reachable.\n\
             {reason}\n\
             Record commands still work with --offline."
        )
    )]
    ConnectionFailed { target: String, reason: String },

    #[error("Not connected to the switch")]
    #[diagnostic(
        code(pbxctl::not_connected),
        help("This command needs a live manager session; drop --offline.")
    )]
    NotConnected,

    #[error("Connection to the switch was lost")]
    #[diagnostic(code(pbxctl::connection_lost))]
    ConnectionLost,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Switch authentication failed: {message}")]
    #[diagnostic(
        code(pbxctl::auth_failed),
        help(
            "Verify the manager username and secret in manager.conf.\n\
             Run: pbxctl config set-password"
        )
    )]
    AuthFailed { message: String },

    #[error("No AMI password configured for profile '{profile}'")]
    #[diagnostic(
        code(pbxctl::no_credentials),
        help(
            "Store one with: pbxctl config set-password --profile {profile}\n\
             Or set the AMI_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Records ──────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(pbxctl::not_found),
        help("Run: pbxctl {list_command} to see what exists")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Conflict: {message}")]
    #[diagnostic(code(pbxctl::conflict))]
    Conflict { message: String },

    #[error("Record store error: {message}")]
    #[diagnostic(
        code(pbxctl::store),
        help("Check the data_file path and its permissions.")
    )]
    Store { message: String },

    // ── Switch ───────────────────────────────────────────────────────
    #[error("Switch rejected {action}: {message}")]
    #[diagnostic(code(pbxctl::rejected))]
    SwitchRejected { action: String, message: String },

    #[error("Switch did not answer {action} within {timeout_ms}ms")]
    #[diagnostic(
        code(pbxctl::timeout),
        help("Raise action_timeout_secs in the profile or check switch load.")
    )]
    Timeout { action: String, timeout_ms: u64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pbxctl::validation))]
    Validation { field: String, reason: String },

    #[error("SIP trace logging is disabled")]
    #[diagnostic(
        code(pbxctl::traces_disabled),
        help("Set sip_trace_enabled = true in the profile to accept traces.")
    )]
    TracesDisabled,

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(pbxctl::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: pbxctl config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(pbxctl::config))]
    Config(ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(pbxctl::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(
        code(pbxctl::json),
        help("Check the JSON file contents and try again.")
    )]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(pbxctl::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected | Self::ConnectionLost => {
                exit_code::CONNECTION
            }
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::TracesDisabled
            | Self::ProfileNotFound { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

/// `pbxctl <command> list` for a record kind.
fn list_command(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Extension => "extensions list",
        RecordKind::Trunk => "trunks list",
        RecordKind::Queue => "queues list",
        RecordKind::InboundRoute => "inbound-routes list",
        RecordKind::OutboundRoute => "outbound-routes list",
        RecordKind::CallDetailRecord => "cdr list",
        RecordKind::SipTrace => "traces list",
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { target, reason } => {
                CliError::ConnectionFailed { target, reason }
            }

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::NotConnected => CliError::NotConnected,
            CoreError::ConnectionLost => CliError::ConnectionLost,

            CoreError::Timeout { action, timeout_ms } => CliError::Timeout { action, timeout_ms },

            CoreError::SwitchRejected { action, message } => {
                CliError::SwitchRejected { action, message }
            }

            CoreError::NotFound { kind, identifier } => CliError::NotFound {
                resource_type: kind.to_string(),
                identifier,
                list_command: list_command(kind).into(),
            },

            CoreError::Conflict { message } => CliError::Conflict { message },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::TraceLoggingDisabled => CliError::TracesDisabled,

            CoreError::Store { message } => CliError::Store { message },

            CoreError::Io(e) => CliError::Io(e),

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}

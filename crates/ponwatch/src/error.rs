//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use ponwatch_config::ConfigError;
use ponwatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach OLT {host}")]
    #[diagnostic(
        code(ponwatch::unreachable),
        help(
            "{reason}\n\
             Check the management address, SNMP community and firewall rules."
        )
    )]
    Unreachable { host: String, reason: String },

    #[error("No data source answered for OLT '{olt}'")]
    #[diagnostic(
        code(ponwatch::no_data_source),
        help(
            "Telemetry returned nothing and no session credentials are configured.\n\
             Add `username` and a password to [olts.{olt}] to enable the CLI fallback."
        )
    )]
    NoDataSource { olt: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(ponwatch::auth_failed),
        help("Verify the session credentials with: ponwatch config set-secret <OLT> --kind ssh-password")
    )]
    AuthFailed { message: String },

    #[error("No {what} configured for OLT '{olt}'")]
    #[diagnostic(
        code(ponwatch::no_credentials),
        help(
            "Store it with: ponwatch config set-secret {olt} --kind community\n\
             Or reference an environment variable from the OLT profile."
        )
    )]
    NoCredentials { olt: String, what: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(ponwatch::not_found),
        help("Run: ponwatch {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Device operations ────────────────────────────────────────────
    #[error("Command refused: {reason}")]
    #[diagnostic(
        code(ponwatch::command_rejected),
        help("Only read-only `show` and `display` commands may be sent free-form.")
    )]
    CommandRejected { reason: String },

    #[error("Device rejected the operation: {message}")]
    #[diagnostic(code(ponwatch::device_rejected))]
    DeviceRejected { message: String },

    #[error("Operation '{operation}' requires {required}")]
    #[diagnostic(
        code(ponwatch::unsupported),
        help("Add session credentials to the OLT profile with: ponwatch config init")
    )]
    Unsupported { operation: String, required: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ponwatch::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No OLTs configured")]
    #[diagnostic(
        code(ponwatch::no_config),
        help(
            "Create one with: ponwatch config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(ponwatch::config))]
    Config { message: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Operation '{action}' requires confirmation")]
    #[diagnostic(
        code(ponwatch::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(ponwatch::timeout),
        help("Increase the timeout with --timeout or check the device load.")
    )]
    Timeout { seconds: u64 },

    #[error("Internal error: {0}")]
    #[diagnostic(code(ponwatch::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON encoding failed: {0}")]
    #[diagnostic(code(ponwatch::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML encoding failed: {0}")]
    #[diagnostic(code(ponwatch::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } | Self::NoDataSource { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::CommandRejected { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::Unsupported { .. } => exit_code::PERMISSION,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Unreachable { host, reason } => CliError::Unreachable { host, reason },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::NoDataSource { olt } => CliError::NoDataSource { olt },

            CoreError::OltNotFound { identifier } => CliError::NotFound {
                resource_type: "OLT".into(),
                identifier,
                list_command: "olts".into(),
            },

            CoreError::OnuNotFound { identifier } => CliError::NotFound {
                resource_type: "ONU".into(),
                identifier,
                list_command: "onus <OLT>".into(),
            },

            CoreError::CommandRejected { reason, .. } => CliError::CommandRejected { reason },

            CoreError::Rejected { message } => CliError::DeviceRejected { message },

            CoreError::Unsupported {
                operation,
                required,
            } => CliError::Unsupported {
                operation,
                required,
            },

            CoreError::Config { message } => CliError::Config { message },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { olt, what } => CliError::NoCredentials { olt, what },
            ConfigError::UnknownOlt { name } => CliError::NotFound {
                resource_type: "OLT".into(),
                identifier: name,
                list_command: "olts".into(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_free_form_is_a_usage_error() {
        let err: CliError = CoreError::CommandRejected {
            command: "reload".into(),
            reason: "verb not allowed".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }

    #[test]
    fn unknown_olt_maps_to_not_found() {
        let err: CliError = ConfigError::UnknownOlt {
            name: "west".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
    }

    #[test]
    fn unreachable_maps_to_connection() {
        let err: CliError = CoreError::Unreachable {
            host: "10.0.0.1".into(),
            reason: "timeout".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
    }
}

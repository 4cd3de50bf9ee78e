// ── Core error types ──
//
// User-facing errors from ponwatch-core. Consumers never see raw SNMP,
// SSH or HTTP failures directly. The `From<ponwatch_api::Error>` impl
// translates transport-layer errors into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Device reachability ──────────────────────────────────────────
    #[error("Cannot reach OLT at {host}: {reason}")]
    Unreachable { host: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("No data source answered for OLT {olt}")]
    NoDataSource { olt: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("OLT not found: {identifier}")]
    OltNotFound { identifier: String },

    #[error("ONU not found: {identifier}")]
    OnuNotFound { identifier: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Command rejected: {reason}")]
    CommandRejected { command: String, reason: String },

    #[error("Operation rejected by device: {message}")]
    Rejected { message: String },

    #[error("Operation not supported: {operation} (requires {required})")]
    Unsupported { operation: String, required: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Validation failures that never reached a device.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::CommandRejected { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ponwatch_api::Error> for CoreError {
    fn from(err: ponwatch_api::Error) -> Self {
        use ponwatch_api::Error as Api;

        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::PrivilegeDenied { message } => CoreError::AuthenticationFailed {
                message: format!("privilege escalation refused: {message}"),
            },
            Api::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            Api::CommandRejected { command, reason } => {
                CoreError::CommandRejected { command, reason }
            }
            Api::DeviceRejected { command, output } => CoreError::Rejected {
                message: format!("`{command}`: {output}"),
            },
            Api::Snmp { message } | Api::Session { message } => CoreError::Unreachable {
                host: String::new(),
                reason: message,
            },
            Api::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else {
                    CoreError::Unreachable {
                        host: e
                            .url()
                            .and_then(|u| u.host_str())
                            .unwrap_or_default()
                            .to_owned(),
                        reason: e.to_string(),
                    }
                }
            }
            Api::HttpStatus { status, url } => CoreError::Unreachable {
                host: url,
                reason: format!("HTTP {status}"),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            Api::Io(e) => CoreError::Unreachable {
                host: String::new(),
                reason: e.to_string(),
            },
        }
    }
}

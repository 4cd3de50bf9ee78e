use thiserror::Error;

/// Top-level error type for the `ponwatch-api` crate.
///
/// Covers every failure mode across the three device surfaces:
/// structured telemetry, interactive sessions, and the self-reported
/// diagnostics scrape. `ponwatch-core` maps these into user-facing errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Structured telemetry ────────────────────────────────────────
    /// The agent answered with an error status or an unparseable PDU.
    #[error("SNMP error: {message}")]
    Snmp { message: String },

    /// No response within the configured timeout.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Interactive session ─────────────────────────────────────────
    /// SSH handshake, channel or pty failure.
    #[error("Session error: {message}")]
    Session { message: String },

    /// Login rejected by the device.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The device never presented a privileged prompt after `enable`.
    #[error("Privilege escalation failed: {message}")]
    PrivilegeDenied { message: String },

    /// A free-form or templated command failed validation. Raised before
    /// any connection is opened.
    #[error("Command rejected: {reason}")]
    CommandRejected { command: String, reason: String },

    /// The device answered a command with an error marker.
    #[error("Device rejected `{command}`: {output}")]
    DeviceRejected { command: String, output: String },

    // ── Self-reported diagnostics ───────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup for the diagnostics client failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Unexpected HTTP status from the diagnostics endpoint.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    // ── Generic ─────────────────────────────────────────────────────
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
            ),
            _ => false,
        }
    }

    /// Returns `true` for validation failures that never reached the device.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::CommandRejected { .. })
    }
}

impl From<ssh2::Error> for Error {
    fn from(err: ssh2::Error) -> Self {
        match err.code() {
            // LIBSSH2_ERROR_AUTHENTICATION_FAILED / PUBLICKEY_UNVERIFIED
            ssh2::ErrorCode::Session(-18 | -19) => Self::Authentication {
                message: err.message().to_owned(),
            },
            // LIBSSH2_ERROR_TIMEOUT
            ssh2::ErrorCode::Session(-9) => Self::Timeout { timeout_secs: 0 },
            _ => Self::Session {
                message: err.to_string(),
            },
        }
    }
}

//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use homelink_config::ConfigError;
use homelink_core::{AuthFailureReason, CoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the controller")]
    #[diagnostic(
        code(homelink::connection_failed),
        help(
            "Check that the controller is running and reachable.\n\
             Self-signed certificate? Use --insecure (-k) or set ca_cert in your profile."
        )
    )]
    ConnectionFailed {
        #[source]
        source: CoreError,
    },

    #[error("The controller did not answer in time")]
    #[diagnostic(
        code(homelink::timeout),
        help("Increase the timeout with --timeout or check controller responsiveness.")
    )]
    Timeout {
        #[source]
        source: CoreError,
    },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {reason}")]
    #[diagnostic(
        code(homelink::auth_failed),
        help(
            "Verify the username, password and role.\n\
             Store a password with: homelink config set-password --profile <name>"
        )
    )]
    AuthFailed {
        reason: AuthFailureReason,
        message: String,
    },

    #[error("Session rejected by the controller")]
    #[diagnostic(
        code(homelink::session_rejected),
        help("The session expired or the role lacks permission for this request.")
    )]
    SessionRejected { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(homelink::no_credentials),
        help(
            "Store a password with: homelink config set-password --profile {profile}\n\
             Or set the HOMELINK_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── API ──────────────────────────────────────────────────────────

    #[error("Controller rejected the request: {message}")]
    #[diagnostic(code(homelink::api_error))]
    ApiError {
        code: Option<String>,
        message: String,
    },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(homelink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(homelink::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No controller configured")]
    #[diagnostic(
        code(homelink::no_config),
        help(
            "Pass --controller and --username, or add a profile to the config file.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(homelink::config))]
    Config(ConfigError),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::SessionRejected { .. } | Self::NoCredentials { .. } => {
                exit_code::AUTH
            }
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            Self::ApiError { .. } | Self::Config(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if err.is_timeout() {
            return CliError::Timeout { source: err };
        }
        match err {
            CoreError::AuthenticationFailed { reason, message } => {
                CliError::AuthFailed { reason, message }
            }
            CoreError::NotAuthenticated | CoreError::SessionExpired => CliError::SessionRejected {
                message: err.to_string(),
            },
            CoreError::AccessDenied { message } => CliError::SessionRejected { message },
            CoreError::Api { code, message } => CliError::ApiError { code, message },
            CoreError::Config { message } => CliError::Validation {
                field: "controller".into(),
                reason: message,
            },
            CoreError::Transport { .. } | CoreError::SubscriptionTeardown { .. } => {
                CliError::ConnectionFailed { source: err }
            }
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::ProfileNotFound { name, available } => {
                CliError::ProfileNotFound { name, available }
            }
            other => CliError::Config(other),
        }
    }
}

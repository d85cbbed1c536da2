// ── Core error types ──
//
// User-facing errors from homelink-core. The `From<homelink_api::Error>`
// impl sorts transport-layer failures into the classes callers act on:
// rejected login, missing or expired session, network trouble, or a
// controller-side refusal.

use homelink_api::AuthFailureReason;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session errors ───────────────────────────────────────────────
    /// Login rejected; `reason` tells bad password from restricted account.
    #[error("Authentication failed ({reason}): {message}")]
    AuthenticationFailed {
        reason: AuthFailureReason,
        message: String,
    },

    /// Operation attempted without a connected session. No remote call was made.
    #[error("Not authenticated -- log in first")]
    NotAuthenticated,

    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    // ── Transport errors ─────────────────────────────────────────────
    /// Network failure, timeout, unexpected HTTP status or malformed body.
    #[error("Controller unreachable or misbehaving: {source}")]
    Transport {
        #[source]
        source: homelink_api::Error,
    },

    // ── Remote errors ────────────────────────────────────────────────
    #[error("Controller error: {message}")]
    Api {
        /// Controller error code (e.g. "values.unknown_id").
        code: Option<String>,
        message: String,
    },

    // ── Subscription errors ──────────────────────────────────────────
    /// Disabling notifications failed. Logged, never surfaced by a stream.
    #[error("Failed to disable value notifications: {reason}")]
    SubscriptionTeardown { reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` for network-level failures worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { source } if source.is_transient())
    }

    /// Returns `true` if the controller did not answer in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { source } if source.is_timeout())
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<homelink_api::Error> for CoreError {
    fn from(err: homelink_api::Error) -> Self {
        match err {
            homelink_api::Error::Authentication { reason, message } => {
                CoreError::AuthenticationFailed { reason, message }
            }
            homelink_api::Error::SessionExpired => CoreError::SessionExpired,
            homelink_api::Error::Forbidden { message } => CoreError::AccessDenied { message },
            homelink_api::Error::Remote { code, message } => CoreError::Api { code, message },
            homelink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            homelink_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS setup failed: {msg}"),
            },
            source @ (homelink_api::Error::Transport(_)
            | homelink_api::Error::Status { .. }
            | homelink_api::Error::Deserialization { .. }) => CoreError::Transport { source },
        }
    }
}

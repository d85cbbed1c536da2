use thiserror::Error;

use crate::models::AuthFailureReason;

/// Top-level error type for the `homelink-api` crate.
///
/// Every variant maps to one failure class of the transport layer:
/// authentication, network, HTTP status, malformed body, or a remote
/// rejection carried in the response envelope. `homelink-core` maps these
/// into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected by the controller.
    #[error("Authentication failed ({reason}): {message}")]
    Authentication {
        reason: AuthFailureReason,
        message: String,
    },

    /// Session cookie missing, expired or revoked (HTTP 401 outside login).
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    /// The controller refused the operation for this session (HTTP 403).
    #[error("Access denied: {message}")]
    Forbidden { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Non-success HTTP status outside the authentication codes.
    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    // ── Remote ──────────────────────────────────────────────────────
    /// Error reported in the `{meta: {rc, code, msg}}` envelope.
    #[error("Controller error: {message}")]
    Remote {
        code: Option<String>,
        message: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the session is gone and re-authentication
    /// might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if this is a transient error worth retrying.
    ///
    /// A connection dropped mid-exchange surfaces from reqwest as a request
    /// or body error and counts as transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            Self::Status { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Returns `true` if the request timed out client-side.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }

    /// Extract the controller error code, if available.
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            Self::Remote { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

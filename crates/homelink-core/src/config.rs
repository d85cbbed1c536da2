// ── Runtime connection configuration ──
//
// These types describe *how* to talk to a controller: endpoint, identity,
// TLS, timeouts and subscription tuning. They never touch disk; the CLI
// builds a `ControllerConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use homelink_api::{ApplicationRole, TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

/// Default bound on the synchronous logout performed when a session is disposed.
pub const DEFAULT_DISPOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Login identity: user, password and the application role to request.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
    pub role: ApplicationRole,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: SecretString,
        role: impl Into<ApplicationRole>,
    ) -> Self {
        Self {
            username: username.into(),
            password,
            role: role.into(),
        }
    }
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed certs). Default for LAN controllers.
    #[default]
    DangerAcceptInvalid,
}

impl TlsVerification {
    pub fn to_tls_mode(&self) -> TlsMode {
        match self {
            Self::SystemDefaults => TlsMode::System,
            Self::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            Self::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Tuning for live value subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionConfig {
    /// Server-side wait per long poll.
    pub wait_timeout: Duration,
    /// Consecutive transient poll failures tolerated before the stream fails.
    pub max_poll_retries: u32,
    /// Delay before the first retry; doubles per consecutive failure.
    pub retry_delay: Duration,
    /// Upper bound on the retry delay.
    pub max_retry_delay: Duration,
    /// Bound on the disable call made when a subscription ends.
    pub teardown_timeout: Duration,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(30),
            max_poll_retries: 3,
            retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(5),
            teardown_timeout: Duration::from_secs(10),
        }
    }
}

/// Configuration for one controller identity.
///
/// Built by the CLI, passed to the session layer -- core never reads config files.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Controller URL (e.g., `https://192.168.1.20`).
    pub url: Url,
    pub credentials: Credentials,
    pub tls: TlsVerification,
    /// Per-request timeout for one-shot calls.
    pub timeout: Duration,
    pub subscription: SubscriptionConfig,
    pub dispose_timeout: Duration,
}

impl ControllerConfig {
    pub fn new(url: Url, credentials: Credentials) -> Self {
        Self {
            url,
            credentials,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            subscription: SubscriptionConfig::default(),
            dispose_timeout: DEFAULT_DISPOSE_TIMEOUT,
        }
    }

    /// Settings for the transport channel this identity talks through.
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::new(self.url.clone())
            .with_tls(self.tls.to_tls_mode())
            .with_timeout(self.timeout)
    }
}

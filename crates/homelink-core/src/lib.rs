// homelink-core: Session lifecycle and live value subscriptions on top of homelink-api.

pub mod config;
pub mod error;
pub mod points;
pub mod session;
pub mod subscription;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{
    ControllerConfig, Credentials, DEFAULT_DISPOSE_TIMEOUT, SubscriptionConfig, TlsVerification,
};
pub use error::CoreError;
pub use session::{SessionInfo, SessionManager};
pub use subscription::{SubscriptionEngine, ValueChangeEvent, ValueChangeStream};

// Re-export the wire-level types consumers handle directly.
pub use homelink_api::{
    ApplicationRole, AuthFailureReason, PointId, PointValue, PointValueRecord, TransportChannel,
};
pub use tokio_util::sync::CancellationToken;

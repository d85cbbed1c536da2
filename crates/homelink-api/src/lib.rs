// homelink-api: Async Rust client for the home-automation controller remote API

pub mod auth;
pub mod error;
pub mod models;
pub mod transport;
pub mod values;

pub use error::Error;
pub use models::{
    ApplicationRole, AuthFailureReason, Operation, PointId, PointValue, PointValueRecord,
    SessionCookie, ValueChange, WaitOutcome,
};
pub use transport::{
    CallInterceptor, CallOutcome, CallRecord, TlsMode, TracingInterceptor, TransportChannel,
    TransportConfig,
};

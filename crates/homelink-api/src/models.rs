// Remote API wire types
//
// Models for the controller's JSON API. Every response is wrapped in the
// `Envelope<T>` shape; request bodies are borrowed views so callers never
// clone point lists just to serialize them.

use std::fmt;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

// ── Response Envelope ────────────────────────────────────────────────

/// Standard response envelope.
///
/// ```json
/// { "meta": { "rc": "ok", "code": "optional", "msg": "optional" }, "data": ... }
/// ```
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub meta: Meta,
    pub data: Option<T>,
}

/// Metadata from the envelope. `rc` == `"ok"` means success.
#[derive(Debug, Deserialize)]
pub struct Meta {
    pub rc: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

// ── Operations ───────────────────────────────────────────────────────

/// Remote operations exposed by the controller, one URL path each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Login,
    Logout,
    GetValues,
    SetValues,
    EnableNotifications,
    WaitForChanges,
    DisableNotifications,
}

impl Operation {
    /// Path below `{base}/api/`.
    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::GetValues => "values/get",
            Self::SetValues => "values/set",
            Self::EnableNotifications => "notifications/enable",
            Self::WaitForChanges => "notifications/wait",
            Self::DisableNotifications => "notifications/disable",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// Opaque session token issued by a successful login.
///
/// Wraps a [`SecretString`] so it never shows up in `Debug` output or logs.
#[derive(Clone)]
pub struct SessionCookie(SecretString);

impl SessionCookie {
    /// Cookie name used in the `Cookie` request header.
    pub const NAME: &'static str = "session";

    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// The raw token value.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Value for the `Cookie` request header, e.g. `session=abc123`.
    pub(crate) fn header_value(&self) -> String {
        format!("{}={}", Self::NAME, self.expose())
    }
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionCookie([REDACTED])")
    }
}

/// Application role requested at login (e.g. `administrator`, `visualization`).
///
/// The controller scopes what a session may do by this role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationRole(String);

impl ApplicationRole {
    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApplicationRole {
    fn from(role: &str) -> Self {
        Self::new(role)
    }
}

impl From<String> for ApplicationRole {
    fn from(role: String) -> Self {
        Self(role)
    }
}

/// Why a login was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureReason {
    /// Unknown user or wrong password.
    InvalidCredentials,
    /// Account exists but may not log in with this role or from this host.
    AccessRestricted,
    /// Any other login rejection.
    Unknown,
}

impl AuthFailureReason {
    /// Classify a controller error code from the login envelope.
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("auth.invalid_credentials") => Self::InvalidCredentials,
            Some("auth.access_restricted") => Self::AccessRestricted,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for AuthFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidCredentials => "invalid credentials",
            Self::AccessRestricted => "access restricted",
            Self::Unknown => "unknown login error",
        })
    }
}

// ── Points ───────────────────────────────────────────────────────────

/// Stable reference to one readable/controllable value on the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointId(u32);

impl PointId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for PointId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PointId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Typed point value as carried on the wire.
///
/// Variant order matters for untagged deserialization: JSON integers land in
/// `Integer`, everything else numeric in `Float`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for PointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl FromStr for PointValue {
    type Err = std::convert::Infallible;

    /// Parse user input: booleans, then integers, then floats, else text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(b) = trimmed.parse::<bool>() {
            return Ok(Self::Bool(b));
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Ok(Self::Integer(i));
        }
        if let Ok(x) = trimmed.parse::<f64>() {
            return Ok(Self::Float(x));
        }
        Ok(Self::Text(s.to_owned()))
    }
}

/// A point identifier paired with its current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointValueRecord {
    pub id: PointId,
    pub value: PointValue,
}

/// One server-pushed value change from a `notifications/wait` batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueChange {
    pub id: PointId,
    pub value: PointValue,
    /// `false` when the controller reports a cached rather than a live value.
    #[serde(default = "default_live")]
    pub live: bool,
}

fn default_live() -> bool {
    true
}

/// Result of one long-poll wait.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    /// The server-side wait elapsed without any change.
    TimedOut,
    /// Changed values, in server order.
    Changes(Vec<ValueChange>),
}

// ── Request / response bodies ────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub role: &'a ApplicationRole,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginData {
    pub cookie: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct IdsRequest<'a> {
    pub ids: &'a [PointId],
}

#[derive(Debug, Serialize)]
pub(crate) struct SetValuesRequest<'a> {
    pub values: &'a [PointValueRecord],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WaitRequest {
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WaitData {
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub changes: Vec<ValueChange>,
}

impl From<WaitData> for WaitOutcome {
    fn from(data: WaitData) -> Self {
        if data.timed_out {
            Self::TimedOut
        } else {
            Self::Changes(data.changes)
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Empty {}

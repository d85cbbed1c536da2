// Shared transport channel for all remote operations.
//
// One `reqwest::Client` (and its connection pool) per channel. Session
// cookies are attached per call rather than kept in a jar, so several
// sessions can share one channel. Every call passes through the configured
// `CallInterceptor` once it has completed.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::models::{Envelope, Operation, SessionCookie};

const USER_AGENT: &str = concat!("homelink/", env!("CARGO_PKG_VERSION"));

/// Added on top of a long-poll's requested wait so the client-side timeout
/// never fires before the controller answers.
pub const WAIT_GRACE: Duration = Duration::from_secs(10);

static SHARED: OnceLock<Arc<TransportChannel>> = OnceLock::new();

/// TLS verification mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (for self-signed controllers).
    DangerAcceptInvalid,
}

// ── Diagnostics ──────────────────────────────────────────────────────

/// How a single remote call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failed(String),
}

/// Diagnostic record handed to the interceptor after every call.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub operation: Operation,
    pub elapsed: Duration,
    /// HTTP status, when a response was received at all.
    pub status: Option<u16>,
    pub outcome: CallOutcome,
    /// Whether the call carried a session cookie.
    pub authenticated: bool,
}

/// Per-call diagnostic hook. Observes calls; cannot change their outcome.
pub trait CallInterceptor: Send + Sync + fmt::Debug {
    fn on_call(&self, record: &CallRecord);
}

/// Default interceptor: one `tracing` event per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingInterceptor;

impl CallInterceptor for TracingInterceptor {
    fn on_call(&self, record: &CallRecord) {
        let elapsed_ms = u64::try_from(record.elapsed.as_millis()).unwrap_or(u64::MAX);
        match &record.outcome {
            CallOutcome::Success => debug!(
                operation = %record.operation,
                status = ?record.status,
                elapsed_ms,
                "remote call completed"
            ),
            CallOutcome::Failed(error) => debug!(
                operation = %record.operation,
                status = ?record.status,
                elapsed_ms,
                error = %error,
                "remote call failed"
            ),
        }
    }
}

// ── TransportConfig ──────────────────────────────────────────────────

/// Configuration bound to a [`TransportChannel`] when it is built.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Controller root, e.g. `https://192.168.1.20`.
    pub base_url: Url,
    pub tls: TlsMode,
    pub timeout: Duration,
    pub interceptor: Arc<dyn CallInterceptor>,
}

impl TransportConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(30),
            interceptor: Arc::new(TracingInterceptor),
        }
    }

    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn CallInterceptor>) -> Self {
        self.interceptor = interceptor;
        self
    }

    /// Build a `reqwest::Client` from this config.
    fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

// ── TransportChannel ─────────────────────────────────────────────────

/// Connection-reusing channel every remote operation goes through.
///
/// Build one with [`new`](Self::new) and hand it (as `Arc`) to each
/// component, or use [`shared`](Self::shared) for the process-wide
/// instance. The typed operations (`login`, `wait_for_value_changes`, ...)
/// are inherent methods implemented in sibling modules.
pub struct TransportChannel {
    http: reqwest::Client,
    config: TransportConfig,
}

impl fmt::Debug for TransportChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportChannel")
            .field("base_url", &self.config.base_url.as_str())
            .field("timeout", &self.config.timeout)
            .finish_non_exhaustive()
    }
}

impl TransportChannel {
    /// Build a standalone channel with its own connection pool.
    pub fn new(config: TransportConfig) -> Result<Self, Error> {
        let http = config.build_client()?;
        Ok(Self { http, config })
    }

    /// The process-wide channel.
    ///
    /// The first caller's configuration wins. Later callers get the same
    /// channel even when their configuration differs; the mismatch is only
    /// logged.
    pub fn shared(config: TransportConfig) -> Result<Arc<Self>, Error> {
        if let Some(existing) = SHARED.get() {
            existing.warn_if_mismatched(&config);
            return Ok(Arc::clone(existing));
        }

        let candidate = Arc::new(Self::new(config.clone())?);
        let channel = SHARED.get_or_init(|| candidate);
        channel.warn_if_mismatched(&config);
        Ok(Arc::clone(channel))
    }

    /// A fresh channel with the same configuration and an empty pool.
    ///
    /// Used where the calling runtime may not be the one that owns the
    /// pooled connections (synchronous teardown).
    pub fn isolated(&self) -> Result<Self, Error> {
        Self::new(self.config.clone())
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// The controller base URL.
    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    fn warn_if_mismatched(&self, requested: &TransportConfig) {
        if self.config.base_url != requested.base_url
            || self.config.timeout != requested.timeout
            || self.config.tls != requested.tls
        {
            warn!(
                bound = %self.config.base_url,
                requested = %requested.base_url,
                "shared transport channel already configured; ignoring new settings"
            );
        }
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// `{base}/api/{operation}`
    fn operation_url(&self, operation: Operation) -> Result<Url, Error> {
        let base = self.config.base_url.as_str().trim_end_matches('/');
        let full = format!("{base}/api/{}", operation.path());
        Ok(Url::parse(&full)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Issue one call and return the envelope's `data`, which must be present.
    pub async fn send<Req, Resp>(
        &self,
        operation: Operation,
        payload: &Req,
        cookie: Option<&SessionCookie>,
    ) -> Result<Resp, Error>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        self.call(operation, payload, cookie, None)
            .await?
            .ok_or_else(|| Error::Deserialization {
                message: format!("{operation}: response carried no data"),
                body: String::new(),
            })
    }

    /// Issue one call whose `data` (if any) is irrelevant.
    pub async fn send_unit<Req>(
        &self,
        operation: Operation,
        payload: &Req,
        cookie: Option<&SessionCookie>,
    ) -> Result<(), Error>
    where
        Req: Serialize + ?Sized + Sync,
    {
        self.call::<Req, IgnoredAny>(operation, payload, cookie, None)
            .await
            .map(|_| ())
    }

    /// POST the payload, parse the envelope, and report to the interceptor.
    pub(crate) async fn call<Req, Resp>(
        &self,
        operation: Operation,
        payload: &Req,
        cookie: Option<&SessionCookie>,
        timeout: Option<Duration>,
    ) -> Result<Option<Resp>, Error>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.operation_url(operation)?;
        debug!("POST {}", url);

        let started = Instant::now();
        let mut builder = self.http.post(url).json(payload);
        if let Some(cookie) = cookie {
            builder = builder.header(reqwest::header::COOKIE, cookie.header_value());
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let (status, result) = match builder.send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                (Some(status), parse_envelope(resp).await)
            }
            Err(e) => (e.status().map(|s| s.as_u16()), Err(Error::Transport(e))),
        };

        self.config.interceptor.on_call(&CallRecord {
            operation,
            elapsed: started.elapsed(),
            status,
            outcome: match &result {
                Ok(_) => CallOutcome::Success,
                Err(e) => CallOutcome::Failed(e.to_string()),
            },
            authenticated: cookie.is_some(),
        });

        result
    }
}

/// Parse the `{ meta, data }` envelope, returning `data` on success
/// or an `Error::Remote` if `meta.rc != "ok"`.
async fn parse_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<Option<T>, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::SessionExpired);
    }

    if status == reqwest::StatusCode::FORBIDDEN {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Forbidden {
            message: preview(&body).to_owned(),
        });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Status {
            status: status.as_u16(),
            body: preview(&body).to_owned(),
        });
    }

    let body = resp.text().await?;

    let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
        let message = format!("{e} (body preview: {:?})", preview(&body));
        Error::Deserialization { message, body: body.clone() }
    })?;

    match envelope.meta.rc.as_str() {
        "ok" => Ok(envelope.data),
        rc => Err(Error::Remote {
            message: envelope.meta.msg.unwrap_or_else(|| format!("rc={rc}")),
            code: envelope.meta.code,
        }),
    }
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

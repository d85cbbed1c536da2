// ── Session lifecycle ──
//
// One logical session per `SessionManager`: authenticate, observe, and
// release. The {cookie, connected} pair lives behind a single mutex and
// every read or write goes through it. The lock is never held across an
// await.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use homelink_api::{ApplicationRole, SessionCookie, TransportChannel};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{ControllerConfig, Credentials, DEFAULT_DISPOSE_TIMEOUT};
use crate::error::CoreError;

/// Snapshot of a freshly authenticated session. The cookie never leaves the crate.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub endpoint: Url,
    pub username: String,
    pub role: ApplicationRole,
    pub authenticated_at: DateTime<Utc>,
}

// ── SessionManager ───────────────────────────────────────────────

/// Owns authentication state for one identity (endpoint + credentials + role).
///
/// Cheaply cloneable via `Arc<SessionInner>`. When the last clone is
/// dropped while still connected, the remote session is logged out
/// synchronously (see [`dispose`](Self::dispose)).
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    channel: Arc<TransportChannel>,
    credentials: Credentials,
    state: Mutex<SessionState>,
    dispose_timeout: Duration,
}

#[derive(Default)]
struct SessionState {
    cookie: Option<SessionCookie>,
    connected: bool,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("endpoint", &self.inner.channel.base_url().as_str())
            .field("username", &self.inner.credentials.username)
            .field("role", &self.inner.credentials.role)
            .field("connected", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a disconnected session. Does NOT log in --
    /// call [`authenticate()`](Self::authenticate).
    pub fn new(channel: Arc<TransportChannel>, credentials: Credentials) -> Self {
        Self::with_dispose_timeout(channel, credentials, DEFAULT_DISPOSE_TIMEOUT)
    }

    pub fn with_dispose_timeout(
        channel: Arc<TransportChannel>,
        credentials: Credentials,
        dispose_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                channel,
                credentials,
                state: Mutex::new(SessionState::default()),
                dispose_timeout,
            }),
        }
    }

    /// Session for `config`'s identity on an explicitly provided channel.
    pub fn from_config(config: &ControllerConfig, channel: Arc<TransportChannel>) -> Self {
        Self::with_dispose_timeout(channel, config.credentials.clone(), config.dispose_timeout)
    }

    /// The channel every call of this session goes through.
    pub fn channel(&self) -> &Arc<TransportChannel> {
        &self.inner.channel
    }

    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Log in with the stored credentials and role.
    ///
    /// On success the new cookie replaces any previous one. On failure the
    /// session is left disconnected with no cookie retained.
    pub async fn authenticate(&self) -> Result<SessionInfo, CoreError> {
        let creds = &self.inner.credentials;
        let result = self
            .inner
            .channel
            .login(&creds.username, &creds.password, &creds.role)
            .await;

        match result {
            Ok(cookie) => {
                {
                    let mut state = self.inner.lock();
                    state.cookie = Some(cookie);
                    state.connected = true;
                }
                info!(username = %creds.username, role = %creds.role, "session authenticated");
                Ok(SessionInfo {
                    endpoint: self.inner.channel.base_url().clone(),
                    username: creds.username.clone(),
                    role: creds.role.clone(),
                    authenticated_at: Utc::now(),
                })
            }
            Err(e) => {
                self.inner.lock().clear();
                warn!(username = %creds.username, error = %e, "authentication failed");
                Err(e.into())
            }
        }
    }

    /// Lock-protected read of the connected flag. Never performs I/O.
    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().connected
    }

    /// Log in only if not currently connected.
    pub async fn ensure_authenticated(&self) -> Result<(), CoreError> {
        if self.is_authenticated() {
            return Ok(());
        }
        debug!("session not connected; re-authenticating");
        self.authenticate().await.map(|_| ())
    }

    /// Log out remotely, then mark the session disconnected.
    ///
    /// Local state is cleared even when the logout call fails. Returns
    /// `true` only if a connected session was logged out remotely.
    pub async fn disconnect(&self) -> bool {
        let Some(cookie) = self.inner.current_cookie() else {
            debug!("disconnect requested but session is not connected");
            return false;
        };

        let logged_out = match self.inner.channel.logout(&cookie).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "logout failed (non-fatal)");
                false
            }
        };

        self.inner.lock().clear();
        info!("session disconnected");
        logged_out
    }

    /// Mark the session disconnected without contacting the controller.
    ///
    /// Used when a call reveals that the controller already dropped the session.
    pub fn invalidate(&self) {
        let was_connected = {
            let mut state = self.inner.lock();
            let was = state.connected;
            state.clear();
            was
        };
        if was_connected {
            info!("session invalidated");
        }
    }

    /// Synchronous, bounded-time logout.
    ///
    /// When this returns, the remote session is either closed or abandoned
    /// and locally marked closed; no logout is left in flight. Blocks the
    /// calling thread for at most the configured dispose timeout.
    pub fn dispose(&self) -> bool {
        self.inner.dispose()
    }

    // ── Crate-internal helpers ───────────────────────────────────

    /// The current cookie, or `NotAuthenticated` without any remote call.
    pub(crate) fn require_cookie(&self) -> Result<SessionCookie, CoreError> {
        self.inner
            .current_cookie()
            .ok_or(CoreError::NotAuthenticated)
    }

    /// Convert a call failure, dropping local session state if the
    /// controller reports the session gone.
    pub(crate) fn observe(&self, err: homelink_api::Error) -> CoreError {
        if err.is_auth_expired() {
            self.invalidate();
        }
        err.into()
    }

    // ── One-shot convenience ─────────────────────────────────────

    /// One-shot: authenticate, run closure, disconnect.
    ///
    /// Uses the default dispose timeout; build the session with
    /// [`from_config`](Self::from_config) and call [`run_once`](Self::run_once)
    /// to honour a configured one.
    pub async fn oneshot<F, Fut, T>(
        channel: Arc<TransportChannel>,
        credentials: Credentials,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(SessionManager) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        SessionManager::new(channel, credentials).run_once(f).await
    }

    /// Authenticate this session, run `f`, then disconnect.
    pub async fn run_once<F, Fut, T>(self, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(SessionManager) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        self.authenticate().await?;
        let result = f(self.clone()).await;
        self.disconnect().await;
        result
    }
}

// ── SessionInner ─────────────────────────────────────────────────

impl SessionState {
    fn clear(&mut self) {
        self.cookie = None;
        self.connected = false;
    }
}

impl SessionInner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_cookie(&self) -> Option<SessionCookie> {
        let state = self.lock();
        if state.connected {
            state.cookie.clone()
        } else {
            None
        }
    }

    fn dispose(&self) -> bool {
        let cookie = {
            let mut state = self.lock();
            let cookie = state.cookie.take();
            state.connected = false;
            cookie
        };
        let Some(cookie) = cookie else {
            return false;
        };

        // Pooled connections belong to the runtime that opened them, which
        // may be the very thread blocked here; log out over a fresh pool.
        let channel = match self.channel.isolated() {
            Ok(channel) => channel,
            Err(e) => {
                warn!(error = %e, "dispose: cannot build logout channel; session abandoned");
                return false;
            }
        };
        let timeout = self.dispose_timeout;

        let outcome = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .map_err(|e| e.to_string())?;
                    runtime.block_on(async {
                        match tokio::time::timeout(timeout, channel.logout(&cookie)).await {
                            Ok(result) => result.map_err(|e| e.to_string()),
                            Err(_) => Err(format!("logout timed out after {timeout:?}")),
                        }
                    })
                })
                .join()
        });

        match outcome {
            Ok(Ok(())) => {
                info!("session disposed");
                true
            }
            Ok(Err(reason)) => {
                warn!(%reason, "dispose: logout failed; session abandoned");
                false
            }
            Err(_) => {
                warn!("dispose: logout thread panicked; session abandoned");
                false
            }
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if self.lock().connected {
            self.dispose();
        }
    }
}

// ── Live value subscriptions ──
//
// Turns the controller's enable / wait / disable notification protocol
// into a lazily produced stream of value-change events. One stream is one
// remote subscription: it is enabled on first poll and disabled exactly
// once when the stream ends, whether it was exhausted, cancelled, failed,
// or dropped by the consumer.

mod retry;

use std::collections::BTreeSet;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_core::Stream;
use homelink_api::{PointId, PointValue, SessionCookie, TransportChannel, ValueChange, WaitOutcome};
use serde::Serialize;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info_span, trace, warn};
use uuid::Uuid;

use self::retry::PollRetry;
use crate::config::SubscriptionConfig;
use crate::error::CoreError;
use crate::session::SessionManager;

/// Stream of value changes. A terminal failure arrives as the last item,
/// after the remote subscription has been torn down.
pub type ValueChangeStream =
    Pin<Box<dyn Stream<Item = Result<ValueChangeEvent, CoreError>> + Send>>;

/// One changed point value as delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueChangeEvent {
    pub point_id: PointId,
    pub value: PointValue,
    /// `false` when the controller reported a cached value.
    pub is_live: bool,
    /// Client-assigned, best effort. Shared by every event of one batch.
    pub received_at: DateTime<Utc>,
}

impl ValueChangeEvent {
    fn from_change(change: ValueChange, received_at: DateTime<Utc>) -> Self {
        Self {
            point_id: change.id,
            value: change.value,
            is_live: change.live,
            received_at,
        }
    }
}

// ── SubscriptionEngine ───────────────────────────────────────────

/// Opens live value subscriptions on top of a [`SessionManager`].
#[derive(Debug, Clone)]
pub struct SubscriptionEngine {
    session: SessionManager,
    config: SubscriptionConfig,
}

impl SubscriptionEngine {
    pub fn new(session: SessionManager, config: SubscriptionConfig) -> Self {
        Self { session, config }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn config(&self) -> &SubscriptionConfig {
        &self.config
    }

    /// Stream changes of `ids` until `cancel` fires or polling fails for good.
    ///
    /// Every call is an independent remote subscription; overlapping sets
    /// are not merged. Nothing happens until the stream is first polled.
    ///
    /// - Not connected: yields `NotAuthenticated` and makes no remote call.
    /// - Enable fails: yields that error; nothing is disabled.
    /// - Cancellation is checked before each wait, so the stream ends at
    ///   most one server-side wait after `cancel` fires.
    /// - The disable call ignores `cancel`, and its failure is only logged.
    pub fn stream_changes<I>(&self, ids: I, cancel: CancellationToken) -> ValueChangeStream
    where
        I: IntoIterator<Item = PointId>,
    {
        let ids: Vec<PointId> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let session = self.session.clone();
        let config = self.config.clone();
        let span = info_span!("subscription", id = %Uuid::new_v4(), points = ids.len());

        Box::pin(async_stream::stream! {
            let cookie = match session.require_cookie() {
                Ok(cookie) => cookie,
                Err(e) => {
                    debug!(parent: &span, "session not connected; subscription refused");
                    yield Err(e);
                    return;
                }
            };
            let channel = Arc::clone(session.channel());

            // ── Enable ──
            // Spawned so a stream dropped mid-enable still gets disabled
            // once the controller has accepted the subscription.
            let enable = tokio::spawn({
                let channel = Arc::clone(&channel);
                let cookie = cookie.clone();
                let ids = ids.clone();
                async move { channel.enable_value_notifications(&cookie, &ids).await }
                    .instrument(span.clone())
            });
            let mut guard = TeardownGuard::enabling(enable, Teardown {
                channel: Arc::clone(&channel),
                cookie: cookie.clone(),
                ids: ids.clone(),
                timeout: config.teardown_timeout,
                span: span.clone(),
            });
            match guard.enabled().await {
                Ok(Ok(())) => debug!(parent: &span, "notifications enabled"),
                Ok(Err(e)) => {
                    warn!(parent: &span, error = %e, "enabling notifications failed");
                    yield Err(session.observe(e));
                    return;
                }
                Err(e) => {
                    warn!(parent: &span, error = %e, "enable task did not complete");
                    yield Err(CoreError::Api {
                        code: None,
                        message: format!("enabling notifications did not complete: {e}"),
                    });
                    return;
                }
            }
            let mut retry = PollRetry::new(&config);
            let mut failure = None;

            // ── Poll ──
            loop {
                if cancel.is_cancelled() {
                    debug!(parent: &span, "cancelled; ending subscription");
                    break;
                }
                if !session.is_authenticated() {
                    debug!(parent: &span, "session disconnected; ending subscription");
                    break;
                }

                let outcome = channel
                    .wait_for_value_changes(&cookie, config.wait_timeout)
                    .instrument(span.clone())
                    .await;

                match outcome {
                    Ok(WaitOutcome::TimedOut) => {
                        retry.reset();
                        trace!(parent: &span, "wait timed out without changes");
                    }
                    Ok(WaitOutcome::Changes(changes)) => {
                        retry.reset();
                        let received_at = Utc::now();
                        debug!(parent: &span, count = changes.len(), "value changes received");
                        for change in changes {
                            yield Ok(ValueChangeEvent::from_change(change, received_at));
                        }
                    }
                    Err(e) => {
                        if let Some(delay) = retry.next_delay(e.is_transient()) {
                            warn!(
                                parent: &span,
                                error = %e,
                                attempt = retry.failures(),
                                ?delay,
                                "wait failed; retrying"
                            );
                            tokio::select! {
                                () = cancel.cancelled() => {}
                                () = tokio::time::sleep(delay) => {}
                            }
                        } else {
                            warn!(
                                parent: &span,
                                error = %e,
                                failures = retry.failures(),
                                "wait failed; ending subscription"
                            );
                            failure = Some(session.observe(e));
                            break;
                        }
                    }
                }
            }

            // ── Disable ──
            if let Some(teardown) = guard.disarm() {
                teardown.run().await;
            }
            if let Some(err) = failure {
                yield Err(err);
            }
        })
    }
}

// ── Teardown ─────────────────────────────────────────────────────

/// The disable call for one subscription, owning everything it needs so it
/// can run as a detached task.
struct Teardown {
    channel: Arc<TransportChannel>,
    cookie: SessionCookie,
    ids: Vec<PointId>,
    timeout: Duration,
    span: Span,
}

impl Teardown {
    /// Spawn the disable call and wait for it. The spawned task completes
    /// even if this future is dropped.
    async fn run(self) {
        let span = self.span.clone();
        if let Err(e) = tokio::spawn(self.execute()).await {
            warn!(parent: &span, error = %e, "teardown task did not complete");
        }
    }

    async fn execute(self) {
        match self.disable().await {
            Ok(()) => debug!(parent: &self.span, "notifications disabled"),
            Err(e) => warn!(parent: &self.span, error = %e, "subscription teardown failed"),
        }
    }

    async fn disable(&self) -> Result<(), CoreError> {
        let call = self
            .channel
            .disable_value_notifications(&self.cookie, &self.ids)
            .instrument(self.span.clone());

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(CoreError::SubscriptionTeardown {
                reason: e.to_string(),
            }),
            Err(_) => Err(CoreError::SubscriptionTeardown {
                reason: format!("timed out after {:?}", self.timeout),
            }),
        }
    }
}

type EnableTask = JoinHandle<Result<(), homelink_api::Error>>;

/// Runs the teardown in the background if the stream is dropped while the
/// subscription is enabled or still being enabled.
struct TeardownGuard {
    enable: Option<EnableTask>,
    teardown: Option<Teardown>,
}

impl TeardownGuard {
    fn enabling(enable: EnableTask, teardown: Teardown) -> Self {
        Self {
            enable: Some(enable),
            teardown: Some(teardown),
        }
    }

    /// Wait for the enable call. Disarms when it did not succeed.
    async fn enabled(&mut self) -> Result<Result<(), homelink_api::Error>, JoinError> {
        let Some(enable) = self.enable.as_mut() else {
            return Ok(Ok(()));
        };
        let outcome = enable.await;
        self.enable = None;
        if !matches!(outcome, Ok(Ok(()))) {
            self.teardown = None;
        }
        outcome
    }

    fn disarm(&mut self) -> Option<Teardown> {
        self.teardown.take()
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        let Some(teardown) = self.teardown.take() else {
            return;
        };
        let enable = self.enable.take();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            debug!(parent: &teardown.span, "stream dropped; disabling notifications in background");
            handle.spawn(async move {
                // Disable only after the controller has accepted the enable.
                if let Some(enable) = enable {
                    if !matches!(enable.await, Ok(Ok(()))) {
                        return;
                    }
                }
                teardown.execute().await;
            });
        } else {
            warn!(
                parent: &teardown.span,
                "stream dropped outside a runtime; remote subscription abandoned"
            );
        }
    }
}

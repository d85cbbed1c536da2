#![allow(clippy::unwrap_used)]
// Integration tests for `SubscriptionEngine` against a wiremock controller.

mod common;

use std::time::Duration;

use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use std::sync::Arc;

use homelink_api::{TransportChannel, TransportConfig};
use homelink_core::{
    CancellationToken, CoreError, PointId, PointValue, SessionManager, SubscriptionConfig,
    SubscriptionEngine,
};

use common::{
    DISABLE, ENABLE, LOGIN, Sequence, WAIT, changes, connected, count, credentials,
    dropping_controller, mount, ok_empty, paths, setup, timed_out,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn fast_config() -> SubscriptionConfig {
    SubscriptionConfig {
        wait_timeout: Duration::from_secs(1),
        max_poll_retries: 2,
        retry_delay: Duration::from_millis(10),
        max_retry_delay: Duration::from_millis(40),
        teardown_timeout: Duration::from_secs(2),
    }
}

fn points() -> [PointId; 2] {
    [PointId::new(101), PointId::new(102)]
}

/// Enable/disable that only accept the {101, 102} subscription.
async fn mount_notifications(server: &MockServer, disable: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(ENABLE))
        .and(body_json(json!({ "ids": [101, 102] })))
        .respond_with(ok_empty())
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(DISABLE))
        .and(body_json(json!({ "ids": [101, 102] })))
        .respond_with(disable)
        .mount(server)
        .await;
}

async fn wait_for_count(server: &MockServer, at: &str, expected: usize) {
    for _ in 0..100 {
        if count(server, at).await >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// ── Delivery ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_change_after_two_timeouts_is_delivered_once() {
    let (server, session) = connected().await;
    mount_notifications(&server, ok_empty()).await;
    mount(
        &server,
        WAIT,
        Sequence::new(vec![
            timed_out(),
            timed_out(),
            changes(json!([{ "id": 101, "value": true }])),
            timed_out(),
        ]),
    )
    .await;

    let engine = SubscriptionEngine::new(session, fast_config());
    let cancel = CancellationToken::new();
    let mut stream = engine.stream_changes(points(), cancel.clone());

    let event = stream.next().await.unwrap().unwrap();
    assert_eq!(event.point_id, PointId::new(101));
    assert_eq!(event.value, PointValue::Bool(true));
    assert!(event.is_live);

    cancel.cancel();
    assert!(stream.next().await.is_none());

    assert_eq!(
        paths(&server).await,
        vec![LOGIN, ENABLE, WAIT, WAIT, WAIT, DISABLE]
    );
}

#[tokio::test]
async fn test_batch_order_is_preserved() {
    let (server, session) = connected().await;
    mount_notifications(&server, ok_empty()).await;
    mount(
        &server,
        WAIT,
        Sequence::new(vec![
            changes(json!([
                { "id": 102, "value": 3 },
                { "id": 101, "value": false, "live": false },
                { "id": 102, "value": 4 }
            ])),
            timed_out(),
        ]),
    )
    .await;

    let engine = SubscriptionEngine::new(session, fast_config());
    let cancel = CancellationToken::new();
    let stream = engine.stream_changes(points(), cancel.clone());

    let events: Vec<_> = stream
        .take(3)
        .map(|item| item.unwrap())
        .collect()
        .await;

    let observed: Vec<_> = events
        .iter()
        .map(|e| (e.point_id.get(), e.value.clone(), e.is_live))
        .collect();
    assert_eq!(
        observed,
        vec![
            (102, PointValue::Integer(3), true),
            (101, PointValue::Bool(false), false),
            (102, PointValue::Integer(4), true),
        ]
    );
    assert!(events.iter().all(|e| e.received_at == events[0].received_at));
    assert_eq!(count(&server, WAIT).await, 1);
}

#[tokio::test]
async fn test_transient_failure_is_retried_without_loss() {
    let (server, session) = connected().await;
    mount_notifications(&server, ok_empty()).await;
    mount(
        &server,
        WAIT,
        Sequence::new(vec![
            ResponseTemplate::new(503),
            changes(json!([{ "id": 102, "value": 21.5 }])),
            timed_out(),
        ]),
    )
    .await;

    let engine = SubscriptionEngine::new(session, fast_config());
    let cancel = CancellationToken::new();
    let mut stream = engine.stream_changes(points(), cancel.clone());

    let event = stream.next().await.unwrap().unwrap();
    assert_eq!(event.point_id, PointId::new(102));
    assert_eq!(event.value, PointValue::Float(21.5));

    cancel.cancel();
    assert!(stream.next().await.is_none());
    assert_eq!(count(&server, WAIT).await, 2);
    assert_eq!(count(&server, DISABLE).await, 1);
}

// ── Termination ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_cancel_after_one_event_disables_once() {
    let (server, session) = connected().await;
    mount_notifications(&server, ok_empty()).await;
    mount(
        &server,
        WAIT,
        changes(json!([{ "id": 101, "value": true }])),
    )
    .await;

    let engine = SubscriptionEngine::new(session, fast_config());
    let cancel = CancellationToken::new();
    let mut stream = engine.stream_changes(points(), cancel.clone());

    stream.next().await.unwrap().unwrap();
    cancel.cancel();
    assert!(stream.next().await.is_none());

    let waits_at_end = count(&server, WAIT).await;
    assert_eq!(waits_at_end, 1);
    assert_eq!(count(&server, DISABLE).await, 1);

    // Polling a finished stream issues nothing further.
    assert!(stream.next().await.is_none());
    assert_eq!(count(&server, WAIT).await, waits_at_end);
    assert_eq!(paths(&server).await.last().map(String::as_str), Some(DISABLE));
}

#[tokio::test]
async fn test_cancel_during_wait_still_disables() {
    let (server, session) = connected().await;
    mount_notifications(&server, ok_empty()).await;
    mount(
        &server,
        WAIT,
        timed_out().set_delay(Duration::from_millis(300)),
    )
    .await;

    let engine = SubscriptionEngine::new(session, fast_config());
    let cancel = CancellationToken::new();
    let stream = engine.stream_changes(points(), cancel.clone());

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let items: Vec<_> = stream.collect().await;

    assert!(items.is_empty(), "expected a clean stop, got: {items:?}");
    assert!(cancel.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(count(&server, WAIT).await, 1);
    assert_eq!(count(&server, DISABLE).await, 1);
}

#[tokio::test]
async fn test_dropped_stream_disables_in_background() {
    let (server, session) = connected().await;
    mount_notifications(&server, ok_empty()).await;
    mount(
        &server,
        WAIT,
        changes(json!([{ "id": 101, "value": true }])),
    )
    .await;

    let engine = SubscriptionEngine::new(session, fast_config());
    let mut stream = engine.stream_changes(points(), CancellationToken::new());

    stream.next().await.unwrap().unwrap();
    drop(stream);

    wait_for_count(&server, DISABLE, 1).await;
    assert_eq!(count(&server, DISABLE).await, 1);
    assert_eq!(count(&server, WAIT).await, 1);
}

#[tokio::test]
async fn test_invalidated_session_ends_stream() {
    let (server, session) = connected().await;
    mount_notifications(&server, ok_empty()).await;
    mount(
        &server,
        WAIT,
        changes(json!([{ "id": 101, "value": true }])),
    )
    .await;

    let engine = SubscriptionEngine::new(session.clone(), fast_config());
    let mut stream = engine.stream_changes(points(), CancellationToken::new());

    stream.next().await.unwrap().unwrap();
    session.invalidate();

    assert!(stream.next().await.is_none());
    assert_eq!(count(&server, WAIT).await, 1);
    assert_eq!(count(&server, DISABLE).await, 1);
}

// ── Failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_not_authenticated_makes_no_calls() {
    let (server, session) = setup().await;

    let engine = SubscriptionEngine::new(session, fast_config());
    let mut stream = engine.stream_changes(points(), CancellationToken::new());

    let first = stream.next().await.unwrap();
    assert!(
        matches!(first, Err(CoreError::NotAuthenticated)),
        "expected NotAuthenticated, got: {first:?}"
    );
    assert!(stream.next().await.is_none());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_enable_failure_skips_wait_and_disable() {
    let (server, session) = connected().await;
    mount(&server, ENABLE, ResponseTemplate::new(500)).await;
    mount(&server, WAIT, timed_out()).await;
    mount(&server, DISABLE, ok_empty()).await;

    let engine = SubscriptionEngine::new(session, fast_config());
    let mut stream = engine.stream_changes(points(), CancellationToken::new());

    let first = stream.next().await.unwrap();
    assert!(
        matches!(first, Err(CoreError::Transport { .. })),
        "expected Transport, got: {first:?}"
    );
    assert!(stream.next().await.is_none());
    assert_eq!(count(&server, ENABLE).await, 1);
    assert_eq!(count(&server, WAIT).await, 0);
    assert_eq!(count(&server, DISABLE).await, 0);
}

#[tokio::test]
async fn test_exhausted_retries_fail_after_teardown() {
    let (server, session) = connected().await;
    mount_notifications(&server, ok_empty()).await;
    mount(&server, WAIT, ResponseTemplate::new(503)).await;

    let engine = SubscriptionEngine::new(session, fast_config());
    let mut stream = engine.stream_changes(points(), CancellationToken::new());

    let first = stream.next().await.unwrap();
    match first {
        Err(ref err @ CoreError::Transport { .. }) => assert!(err.is_transient()),
        ref other => panic!("expected Transport, got: {other:?}"),
    }
    assert!(stream.next().await.is_none());

    // One initial wait plus two retries, then exactly one disable.
    assert_eq!(count(&server, WAIT).await, 3);
    assert_eq!(count(&server, DISABLE).await, 1);
    assert_eq!(paths(&server).await.last().map(String::as_str), Some(DISABLE));
}

#[tokio::test]
async fn test_disable_failure_does_not_mask_poll_failure() {
    let (server, session) = connected().await;
    mount_notifications(&server, ResponseTemplate::new(500)).await;
    mount(&server, WAIT, ResponseTemplate::new(503)).await;

    let engine = SubscriptionEngine::new(session, fast_config());
    let items: Vec<_> = engine
        .stream_changes(points(), CancellationToken::new())
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    assert!(
        matches!(items[0], Err(CoreError::Transport { .. })),
        "expected the poll failure, got: {items:?}"
    );
    assert_eq!(count(&server, DISABLE).await, 1);
}

#[tokio::test]
async fn test_disable_failure_after_cancel_is_swallowed() {
    let (server, session) = connected().await;
    mount_notifications(&server, ResponseTemplate::new(500)).await;
    mount(&server, WAIT, timed_out()).await;

    let engine = SubscriptionEngine::new(session, fast_config());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let items: Vec<_> = engine.stream_changes(points(), cancel).collect().await;

    assert!(items.is_empty(), "expected a clean stop, got: {items:?}");
    assert_eq!(count(&server, ENABLE).await, 1);
    assert_eq!(count(&server, WAIT).await, 0);
    assert_eq!(count(&server, DISABLE).await, 1);
}

#[tokio::test]
async fn test_expired_session_during_poll_is_terminal() {
    let (server, session) = connected().await;
    mount_notifications(&server, ok_empty()).await;
    mount(&server, WAIT, ResponseTemplate::new(401)).await;

    let engine = SubscriptionEngine::new(session.clone(), fast_config());
    let items: Vec<_> = engine
        .stream_changes(points(), CancellationToken::new())
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(CoreError::SessionExpired)));
    assert!(!session.is_authenticated());
    assert_eq!(count(&server, WAIT).await, 1);
    assert_eq!(count(&server, DISABLE).await, 1);
}

// ── Independence ────────────────────────────────────────────────────

#[tokio::test]
async fn test_overlapping_subscriptions_are_independent() {
    let (server, session) = connected().await;
    mount_notifications(&server, ok_empty()).await;
    mount(&server, WAIT, timed_out()).await;

    let engine = SubscriptionEngine::new(session, fast_config());
    let first_cancel = CancellationToken::new();
    let second_cancel = CancellationToken::new();
    first_cancel.cancel();
    second_cancel.cancel();

    let first: Vec<_> = engine
        .stream_changes(points(), first_cancel)
        .collect()
        .await;
    let second: Vec<_> = engine
        .stream_changes([PointId::new(102), PointId::new(101), PointId::new(101)], second_cancel)
        .collect()
        .await;

    assert!(first.is_empty());
    assert!(second.is_empty());
    assert_eq!(count(&server, ENABLE).await, 2);
    assert_eq!(count(&server, DISABLE).await, 2);
}

#[tokio::test]
async fn test_lazy_until_polled() {
    let (server, session) = connected().await;
    mount_notifications(&server, ok_empty()).await;

    let engine = SubscriptionEngine::new(session, fast_config());
    let stream = engine.stream_changes(points(), CancellationToken::new());
    drop(stream);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(count(&server, ENABLE).await, 0);
    assert_eq!(count(&server, DISABLE).await, 0);
}

#[tokio::test]
async fn test_stream_dropped_during_enable_still_disables() {
    let (server, session) = connected().await;
    mount(
        &server,
        ENABLE,
        ok_empty().set_delay(Duration::from_millis(200)),
    )
    .await;
    mount(&server, DISABLE, ok_empty()).await;

    let engine = SubscriptionEngine::new(session, fast_config());
    let mut stream = engine.stream_changes(points(), CancellationToken::new());

    let early = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
    assert!(early.is_err(), "enable should still be in flight");
    drop(stream);

    wait_for_count(&server, DISABLE, 1).await;
    assert_eq!(count(&server, ENABLE).await, 1);
    assert_eq!(count(&server, DISABLE).await, 1);
    assert_eq!(count(&server, WAIT).await, 0);

    let seen = paths(&server).await;
    let enabled = seen.iter().position(|p| p == ENABLE).unwrap();
    let disabled = seen.iter().position(|p| p == DISABLE).unwrap();
    assert!(enabled < disabled, "disable sent before enable: {seen:?}");
}

// ── Dropped connections ─────────────────────────────────────────────

#[tokio::test]
async fn test_dropped_wait_connection_is_retried() {
    let (url, seen) = dropping_controller(json!([{ "id": 101, "value": true }])).await;
    let channel = Arc::new(TransportChannel::new(TransportConfig::new(url)).unwrap());
    let session = SessionManager::new(channel, credentials("secret"));
    session.authenticate().await.unwrap();

    let cancel = CancellationToken::new();
    let engine = SubscriptionEngine::new(session.clone(), fast_config());
    let mut stream = engine.stream_changes([PointId::new(101)], cancel.clone());

    let event = stream.next().await.unwrap().unwrap();
    assert_eq!(event.point_id, PointId::new(101));
    assert_eq!(event.value, PointValue::Bool(true));

    cancel.cancel();
    while stream.next().await.is_some() {}
    session.disconnect().await;

    let seen = seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![LOGIN, ENABLE, WAIT, WAIT, DISABLE, common::LOGOUT]
    );
}

#![allow(dead_code, clippy::unwrap_used)]
// Shared wiremock fixtures for homelink-core integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use secrecy::SecretString;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use homelink_api::{TransportChannel, TransportConfig};
use homelink_core::{Credentials, SessionManager};

pub const LOGIN: &str = "/api/login";
pub const LOGOUT: &str = "/api/logout";
pub const GET_VALUES: &str = "/api/values/get";
pub const SET_VALUES: &str = "/api/values/set";
pub const ENABLE: &str = "/api/notifications/enable";
pub const WAIT: &str = "/api/notifications/wait";
pub const DISABLE: &str = "/api/notifications/disable";

/// Replays responses in order, repeating the last one once exhausted.
pub struct Sequence {
    responses: Vec<ResponseTemplate>,
    next: AtomicUsize,
}

impl Sequence {
    pub fn new(responses: Vec<ResponseTemplate>) -> Self {
        assert!(!responses.is_empty(), "sequence needs at least one response");
        Self {
            responses,
            next: AtomicUsize::new(0),
        }
    }
}

impl Respond for Sequence {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        self.responses[index.min(self.responses.len() - 1)].clone()
    }
}

// ── Envelopes ───────────────────────────────────────────────────────

pub fn ok(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "meta": { "rc": "ok" }, "data": data }))
}

pub fn ok_empty() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "meta": { "rc": "ok" } }))
}

pub fn rejected(code: &str, msg: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_json(json!({ "meta": { "rc": "error", "code": code, "msg": msg } }))
}

pub fn login_ok(cookie: &str) -> ResponseTemplate {
    ok(json!({ "cookie": cookie }))
}

pub fn timed_out() -> ResponseTemplate {
    ok(json!({ "timedOut": true }))
}

pub fn changes(changes: serde_json::Value) -> ResponseTemplate {
    ok(json!({ "changes": changes }))
}

// ── Setup ───────────────────────────────────────────────────────────

pub fn credentials(password: &str) -> Credentials {
    Credentials::new("admin", SecretString::from(password.to_string()), "administrator")
}

pub fn channel(server: &MockServer) -> Arc<TransportChannel> {
    let config = TransportConfig::new(Url::parse(&server.uri()).unwrap());
    Arc::new(TransportChannel::new(config).unwrap())
}

/// Mock controller with working login/logout and a disconnected session.
pub async fn setup() -> (MockServer, SessionManager) {
    let server = MockServer::start().await;
    mount(&server, LOGIN, login_ok("abc123")).await;
    mount(&server, LOGOUT, ok_empty()).await;
    let session = SessionManager::new(channel(&server), credentials("secret"));
    (server, session)
}

/// Like [`setup`], with the session already authenticated as `abc123`.
pub async fn connected() -> (MockServer, SessionManager) {
    let (server, session) = setup().await;
    session.authenticate().await.unwrap();
    (server, session)
}

pub async fn mount(server: &MockServer, at: &str, response: impl Respond + 'static) {
    Mock::given(method("POST"))
        .and(path(at))
        .respond_with(response)
        .mount(server)
        .await;
}

// ── Request inspection ──────────────────────────────────────────────

pub async fn paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| r.url.path().to_owned())
        .collect()
}

pub async fn count(server: &MockServer, at: &str) -> usize {
    paths(server).await.iter().filter(|p| *p == at).count()
}

pub async fn cookies(server: &MockServer, at: &str) -> Vec<Option<String>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == at)
        .map(|r| {
            r.headers
                .get("cookie")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        })
        .collect()
}

pub async fn bodies(server: &MockServer, at: &str) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == at)
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

// ── Raw TCP controller ──────────────────────────────────────────────

/// Bare HTTP/1.1 controller that closes the first `notifications/wait`
/// connection without answering, then reports `changes` on later waits.
///
/// Returns the base URL and the paths seen so far, in arrival order.
pub async fn dropping_controller(changes: serde_json::Value) -> (Url, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    tokio::spawn(async move {
        let mut waits = 0;
        while let Ok((mut socket, _)) = listener.accept().await {
            let at = read_request_path(&mut socket).await;
            log.lock().unwrap().push(at.clone());

            let body = match at.as_str() {
                LOGIN => json!({ "meta": { "rc": "ok" }, "data": { "cookie": "abc123" } }),
                WAIT => {
                    waits += 1;
                    if waits == 1 {
                        drop(socket);
                        continue;
                    }
                    json!({ "meta": { "rc": "ok" }, "data": { "changes": changes } })
                }
                _ => json!({ "meta": { "rc": "ok" } }),
            }
            .to_string();

            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (url, seen)
}

/// Read one request (head and body) and return its path.
async fn read_request_path(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return String::new();
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).into_owned();
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + length {
            return head.split_whitespace().nth(1).unwrap_or_default().to_owned();
        }
    }
}

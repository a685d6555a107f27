//! Scripted Vectra upstream used by the integration tests.
//!
//! The token endpoint hands out `token-1`, `token-2`, ... and every other
//! request is answered from a queue of scripted responses, falling back to a
//! 404 when the queue is empty.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use mcp_server_vectra::config::{Credential, VectraConfig};
use mcp_server_vectra::vectra::retry::RetryPolicy;
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct Scripted {
    pub status: u16,
    pub body: Value,
    pub headers: Vec<(String, String)>,
    pub delay: Option<Duration>,
}

impl Scripted {
    pub fn ok(body: Value) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            headers: Vec::new(),
            delay: None,
        }
    }

    /// Holds the response back, e.g. to outlast the client timeout.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct UpstreamState {
    token_calls: AtomicUsize,
    token_expires_in: AtomicU64,
    token_delay_ms: AtomicU64,
    token_script: Mutex<VecDeque<Scripted>>,
    token_requests: Mutex<Vec<Recorded>>,
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<Recorded>>,
}

pub struct Upstream {
    pub base_url: String,
    state: Arc<UpstreamState>,
}

impl Upstream {
    pub async fn start() -> Self {
        let state = Arc::new(UpstreamState::default());
        state.token_expires_in.store(3600, Ordering::SeqCst);

        let app = Router::new()
            .route("/oauth2/token", post(token))
            .fallback(api)
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", address),
            state,
        }
    }

    /// Queues responses for resource requests, consumed in order.
    pub fn script(&self, responses: impl IntoIterator<Item = Scripted>) {
        self.state.responses.lock().unwrap().extend(responses);
    }

    /// Queues token endpoint responses; once drained, tokens are issued normally.
    pub fn script_token(&self, responses: impl IntoIterator<Item = Scripted>) {
        self.state.token_script.lock().unwrap().extend(responses);
    }

    pub fn set_token_lifetime(&self, seconds: u64) {
        self.state.token_expires_in.store(seconds, Ordering::SeqCst);
    }

    pub fn set_token_delay(&self, delay: Duration) {
        self.state
            .token_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn token_calls(&self) -> usize {
        self.state.token_calls.load(Ordering::SeqCst)
    }

    pub fn token_requests(&self) -> Vec<Recorded> {
        self.state.token_requests.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

/// Client configuration pointing at `base_url` with millisecond backoff.
pub fn test_config(base_url: &str) -> VectraConfig {
    let mut config = VectraConfig::new(Credential::new(base_url, "test-api-key"));
    config.retry = RetryPolicy::new(5, Duration::from_millis(1), Duration::from_millis(5))
        .with_jitter(false);
    config.auth_retry = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5))
        .with_jitter(false);
    config.rate_limit_requests = 10_000;
    config.rate_limit_period = Duration::from_secs(1);
    config.page_size = 50;
    config.request_timeout = Duration::from_secs(5);
    config
}

pub fn arguments(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

fn record(method: &Method, uri: &Uri, headers: &HeaderMap, body: &Bytes) -> Recorded {
    let query = uri
        .query()
        .map(|q| {
            url_pairs(q)
                .into_iter()
                .collect::<HashMap<String, String>>()
        })
        .unwrap_or_default();
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
    };
    Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        query,
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    }
}

fn url_pairs(query: &str) -> Vec<(String, String)> {
    reqwest::Url::parse(&format!("http://placeholder/?{}", query))
        .map(|url| url.query_pairs().into_owned().collect())
        .unwrap_or_default()
}

fn respond(scripted: Scripted) -> Response {
    let status = StatusCode::from_u16(scripted.status).unwrap();
    let mut headers = HeaderMap::new();
    for (name, value) in &scripted.headers {
        headers.insert(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    (status, headers, Json(scripted.body)).into_response()
}

async fn token(
    State(state): State<Arc<UpstreamState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let call = state.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
    state
        .token_requests
        .lock()
        .unwrap()
        .push(record(&method, &uri, &headers, &body));

    let delay = state.token_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if let Some(scripted) = state.token_script.lock().unwrap().pop_front() {
        return respond(scripted);
    }
    let expires_in = state.token_expires_in.load(Ordering::SeqCst);
    Json(json!({
        "access_token": format!("token-{}", call),
        "token_type": "Bearer",
        "expires_in": expires_in,
    }))
    .into_response()
}

async fn api(
    State(state): State<Arc<UpstreamState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state
        .requests
        .lock()
        .unwrap()
        .push(record(&method, &uri, &headers, &body));

    let next = state.responses.lock().unwrap().pop_front();
    match next {
        Some(scripted) => {
            if let Some(delay) = scripted.delay {
                tokio::time::sleep(delay).await;
            }
            respond(scripted)
        }
        None => respond(Scripted::status(404, json!({"detail": "Not found."}))),
    }
}

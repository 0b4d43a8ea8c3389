//! End-to-end tests: router-level requests through `oneshot`, and a real
//! listener driven over HTTP with reqwest. Both read the event stream with
//! the same [`SseReader`].

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::response::Parts;
use axum::http::{Request, StatusCode, header};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde_json::{Value, json};
use tether_core::ToolCatalog;
use tether_server::config::ServerConfig;
use tether_server::rpc::ToolRpcHandler;
use tether_server::server::TetherServer;
use tether_tools::{ToolRegistry, register_builtins};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tower::ServiceExt;

const TIMEOUT: Duration = Duration::from_secs(5);

fn make_server(config: ServerConfig) -> TetherServer {
    let mut tools = ToolRegistry::new();
    register_builtins(&mut tools);
    let catalog: Arc<dyn ToolCatalog> = Arc::new(tools);
    let handler = Arc::new(ToolRpcHandler::new(
        Arc::clone(&catalog),
        "tether",
        "0.1.0",
    ));
    TetherServer::new(config, catalog, handler)
}

async fn boot_server(config: ServerConfig) -> (String, Arc<TetherServer>, JoinHandle<()>) {
    let server = Arc::new(make_server(config));
    let (addr, handle) = server.listen().await.unwrap();
    (format!("http://{addr}"), server, handle)
}

fn session_id_of(endpoint: &str) -> &str {
    endpoint.split("sessionId=").nth(1).unwrap()
}

/// Splits a byte stream into `(event, data)` pairs.
struct SseReader {
    body: BoxStream<'static, Result<Bytes, String>>,
    buf: String,
}

impl SseReader {
    fn new<S, E>(body: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Display,
    {
        Self {
            body: body.map(|chunk| chunk.map_err(|e| e.to_string())).boxed(),
            buf: String::new(),
        }
    }

    async fn connect(url: &str) -> Self {
        let resp = reqwest::get(url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let content_type = resp.headers()[reqwest::header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .to_owned();
        assert!(content_type.starts_with("text/event-stream"));
        Self::new(resp.bytes_stream())
    }

    /// Next `(event, data)` pair, or `None` once the server ends the stream.
    async fn next_event(&mut self) -> Option<(String, String)> {
        timeout(TIMEOUT, async {
            loop {
                if let Some(block) = self.take_block() {
                    return Some(block);
                }
                let chunk = self.body.next().await?.ok()?;
                self.buf.push_str(std::str::from_utf8(&chunk).ok()?);
            }
        })
        .await
        .expect("timed out waiting for SSE event")
    }

    /// Skip frames until one named `name` arrives.
    async fn next_named(&mut self, name: &str) -> Option<String> {
        loop {
            let (event, data) = self.next_event().await?;
            if event == name {
                return Some(data);
            }
        }
    }

    /// Whether nothing at all arrives within `window`.
    async fn stays_quiet(&mut self, window: Duration) -> bool {
        self.buf.is_empty() && timeout(window, self.body.next()).await.is_err()
    }

    fn take_block(&mut self) -> Option<(String, String)> {
        let end = self.buf.find("\n\n")?;
        let block: String = self.buf.drain(..end + 2).collect();
        let mut event = String::from("message");
        let mut data = String::new();
        for line in block.lines() {
            if let Some(v) = line.strip_prefix("event:") {
                event = v.trim().to_owned();
            } else if let Some(v) = line.strip_prefix("data:") {
                data.push_str(v.trim_start());
            }
        }
        Some((event, data))
    }
}

// ── Router-level, no socket ─────────────────────────────────────────────

async fn open_stream(app: &Router) -> (SseReader, String, Parts) {
    let resp = app
        .clone()
        .oneshot(Request::get("/stream").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let (parts, body) = resp.into_parts();
    let mut reader = SseReader::new(body.into_data_stream());
    let (event, endpoint) = reader.next_event().await.unwrap();
    assert_eq!(event, "endpoint");
    (reader, endpoint, parts)
}

async fn post(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_owned()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn delete(app: &Router, id: &str) -> StatusCode {
    app.clone()
        .oneshot(
            Request::delete(format!("/stream?sessionId={id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn stream_starts_with_endpoint_then_tools() {
    let server = make_server(ServerConfig::default());
    let app = server.router();
    let (mut reader, endpoint, head) = open_stream(&app).await;

    assert_eq!(head.status, StatusCode::OK);
    assert!(
        head.headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );
    assert_eq!(head.headers[header::CACHE_CONTROL], "no-cache");

    assert!(endpoint.starts_with("/messages?sessionId="));
    let id = session_id_of(&endpoint);
    assert!(uuid::Uuid::parse_str(id).is_ok(), "not a UUID: {id}");
    assert_eq!(server.transport().session_count(), 1);

    let (event, data) = reader.next_event().await.unwrap();
    assert_eq!(event, "tools");
    let tools: Value = serde_json::from_str(&data).unwrap();
    let names: Vec<&str> = tools
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["current_time", "echo"]);
}

#[tokio::test]
async fn missing_session_id_is_400_and_registry_untouched() {
    let server = make_server(ServerConfig::default());
    let app = server.router();
    let (_reader, _endpoint, _) = open_stream(&app).await;
    let before = server.transport().registry().ids();

    let (status, body) = post(&app, "/messages", "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "MISSING_SESSION_ID");
    assert_eq!(server.transport().registry().ids(), before);
}

#[tokio::test]
async fn unknown_session_is_404_and_registry_untouched() {
    let server = make_server(ServerConfig::default());
    let app = server.router();
    let (_reader, _endpoint, _) = open_stream(&app).await;
    let before = server.transport().registry().ids();

    let (status, body) = post(&app, "/messages?sessionId=bogus", "{}").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "UNKNOWN_SESSION");
    assert_eq!(server.transport().registry().ids(), before);
}

#[tokio::test]
async fn malformed_body_is_400() {
    let server = make_server(ServerConfig::default());
    let app = server.router();
    let (_reader, endpoint, _) = open_stream(&app).await;

    let (status, body) = post(&app, &endpoint, "{oops").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "MALFORMED_BODY");
    assert_eq!(server.transport().session_count(), 1);
}

#[tokio::test]
async fn ping_message_is_acked_and_channel_keeps_heartbeating() {
    let server = make_server(ServerConfig {
        heartbeat_interval_ms: 50,
        ..ServerConfig::default()
    });
    let app = server.router();
    let (mut reader, endpoint, _) = open_stream(&app).await;

    let (status, body) = post(&app, &endpoint, r#"{"type":"ping"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    assert!(reader.next_named("ping").await.is_some());
    assert_eq!(server.transport().session_count(), 1);
}

#[tokio::test]
async fn rpc_response_arrives_on_stream() {
    let server = make_server(ServerConfig::default());
    let app = server.router();
    let (mut reader, endpoint, _) = open_stream(&app).await;
    let _tools = reader.next_event().await.unwrap();

    let (status, body) = post(
        &app,
        &endpoint,
        r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"echo","arguments":{"text":"hey"}}}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    let (event, data) = reader.next_event().await.unwrap();
    assert_eq!(event, "message");
    let msg: Value = serde_json::from_str(&data).unwrap();
    assert_eq!(msg["id"], 1);
    assert_eq!(msg["result"]["content"][0]["text"], "hey");
}

#[tokio::test]
async fn client_response_is_acked_without_a_frame() {
    let server = make_server(ServerConfig::default());
    let app = server.router();
    let (mut reader, endpoint, _) = open_stream(&app).await;
    let _tools = reader.next_named("tools").await.unwrap();

    let (status, body) = post(
        &app,
        &endpoint,
        r#"{"jsonrpc":"2.0","id":9,"result":{}}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
    assert!(reader.stays_quiet(Duration::from_millis(200)).await);
}

#[tokio::test]
async fn dropping_stream_removes_session() {
    let server = make_server(ServerConfig::default());
    let app = server.router();
    let (reader, endpoint, _) = open_stream(&app).await;
    assert_eq!(server.transport().session_count(), 1);

    drop(reader);
    assert_eq!(server.transport().session_count(), 0);

    let (status, _) = post(&app, &endpoint, "{}").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_closes_session_and_ends_stream() {
    let server = make_server(ServerConfig::default());
    let app = server.router();
    let (mut reader, endpoint, _) = open_stream(&app).await;
    let id = session_id_of(&endpoint).to_owned();

    assert_eq!(delete(&app, &id).await, StatusCode::NO_CONTENT);
    assert_eq!(server.transport().session_count(), 0);

    let _tools = reader.next_event().await;
    assert!(reader.next_event().await.is_none());

    assert_eq!(delete(&app, &id).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_limit_returns_503() {
    let server = make_server(ServerConfig {
        max_sessions: 1,
        ..ServerConfig::default()
    });
    let app = server.router();
    let (_reader, _endpoint, _) = open_stream(&app).await;

    let resp = app
        .clone()
        .oneshot(Request::get("/stream").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = make_server(ServerConfig {
        max_message_bytes: 16,
        ..ServerConfig::default()
    });
    let app = server.router();
    let (_reader, endpoint, _) = open_stream(&app).await;

    let (status, _) = post(&app, &endpoint, &format!(r#"{{"pad":"{}"}}"#, "x".repeat(64))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(server.transport().session_count(), 1);
}

#[tokio::test]
async fn initiate_shutdown_closes_channels() {
    let server = make_server(ServerConfig::default());
    let app = server.router();
    let (mut reader, _endpoint, _) = open_stream(&app).await;

    assert_eq!(server.initiate_shutdown(), 1);
    assert!(server.shutdown().is_shutting_down());
    let _tools = reader.next_event().await;
    assert!(reader.next_event().await.is_none());

    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["status"], "draining");
    assert_eq!(parsed["connections"], 0);
}

// ── Real listener ───────────────────────────────────────────────────────

async fn connections(client: &reqwest::Client, base: &str) -> u64 {
    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    health["connections"].as_u64().unwrap()
}

#[tokio::test]
async fn full_session_round_trip() {
    let (base, server, _handle) = boot_server(ServerConfig::default()).await;
    let client = reqwest::Client::new();

    let mut stream = SseReader::connect(&format!("{base}/stream")).await;
    let (event, endpoint) = stream.next_event().await.unwrap();
    assert_eq!(event, "endpoint");
    assert!(endpoint.starts_with("/messages?sessionId="));
    let tools = stream.next_named("tools").await.unwrap();
    assert!(tools.contains("\"echo\""));
    assert_eq!(connections(&client, &base).await, 1);

    let resp = client
        .post(format!("{base}{endpoint}"))
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": {"name": "echo", "arguments": {"text": "over the wire"}}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let ack: Value = resp.json().await.unwrap();
    assert_eq!(ack, json!({"status": "ok"}));

    let data = stream.next_named("message").await.unwrap();
    let msg: Value = serde_json::from_str(&data).unwrap();
    assert_eq!(msg["jsonrpc"], "2.0");
    assert_eq!(msg["id"], 7);
    assert_eq!(msg["result"]["content"][0]["text"], "over the wire");

    assert_eq!(server.transport().session_count(), 1);
}

#[tokio::test]
async fn sessions_are_isolated() {
    let (base, _server, _handle) = boot_server(ServerConfig::default()).await;
    let client = reqwest::Client::new();

    let mut a = SseReader::connect(&format!("{base}/stream")).await;
    let mut b = SseReader::connect(&format!("{base}/stream")).await;
    let (_, endpoint_a) = a.next_event().await.unwrap();
    let (_, endpoint_b) = b.next_event().await.unwrap();
    assert_ne!(endpoint_a, endpoint_b);
    let _ = a.next_named("tools").await.unwrap();
    let _ = b.next_named("tools").await.unwrap();

    let status = client
        .post(format!("{base}{endpoint_b}"))
        .json(&json!({"jsonrpc": "2.0", "id": "only-b", "method": "ping"}))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::OK);

    let data = b.next_named("message").await.unwrap();
    let msg: Value = serde_json::from_str(&data).unwrap();
    assert_eq!(msg["id"], "only-b");

    // Default heartbeat is 30s, so `a` sees nothing in this window.
    assert!(a.stays_quiet(Duration::from_millis(200)).await);
}

#[tokio::test]
async fn delete_ends_stream_and_frees_session() {
    let (base, server, _handle) = boot_server(ServerConfig::default()).await;
    let client = reqwest::Client::new();

    let mut stream = SseReader::connect(&format!("{base}/stream")).await;
    let (_, endpoint) = stream.next_event().await.unwrap();
    let id = session_id_of(&endpoint).to_owned();

    let status = client
        .delete(format!("{base}/stream?sessionId={id}"))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::NO_CONTENT);
    assert_eq!(server.transport().session_count(), 0);

    assert!(stream.next_named("never").await.is_none());

    let resp = client
        .post(format!("{base}{endpoint}"))
        .json(&json!({"type": "ping"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "UNKNOWN_SESSION");
}

#[tokio::test]
async fn client_disconnect_removes_session() {
    let (base, server, _handle) = boot_server(ServerConfig::default()).await;

    let mut stream = SseReader::connect(&format!("{base}/stream")).await;
    let _ = stream.next_event().await.unwrap();
    assert_eq!(server.transport().session_count(), 1);
    drop(stream);

    timeout(TIMEOUT, async {
        while server.transport().session_count() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session was not removed after disconnect");
}

#[tokio::test]
async fn heartbeats_flow_on_idle_stream() {
    let (base, _server, _handle) = boot_server(ServerConfig {
        heartbeat_interval_ms: 50,
        ..ServerConfig::default()
    })
    .await;

    let mut stream = SseReader::connect(&format!("{base}/stream")).await;
    let first: i64 = stream.next_named("ping").await.unwrap().parse().unwrap();
    let second: i64 = stream.next_named("ping").await.unwrap().parse().unwrap();
    assert!(second >= first);
}

#[tokio::test]
async fn shutdown_closes_streams_and_stops_server() {
    let (base, server, handle) = boot_server(ServerConfig::default()).await;

    let mut stream = SseReader::connect(&format!("{base}/stream")).await;
    let _ = stream.next_event().await.unwrap();

    assert_eq!(server.initiate_shutdown(), 1);
    assert!(stream.next_named("never").await.is_none());

    timeout(TIMEOUT, handle)
        .await
        .expect("server task did not stop")
        .unwrap();
}

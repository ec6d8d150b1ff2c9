//! Shared utilities for integration testing: a mock upstream database server
//! speaking just enough Thrift-JSON over HTTP.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use serde_json::{json, Value};

/// Session token the mock issues at login; 32 word characters, like the real
/// server.
pub const MOCK_SESSION: &str = "abcdefabcdefabcdefabcdefabcdef12";

const THRIFT_JSON: &str = "application/vnd.apache.thrift.json; charset=utf-8";

/// Counters observed by tests.
#[derive(Clone, Default)]
pub struct UpstreamCounters {
    pub connects: Arc<AtomicU32>,
    pub sql_calls: Arc<AtomicU32>,
    pub last_sql_seq: Arc<AtomicI64>,
}

pub struct MockUpstream {
    pub addr: SocketAddr,
    pub counters: UpstreamCounters,
}

/// Start a mock upstream on an ephemeral port.
///
/// Any call carrying a session argument that is not [`MOCK_SESSION`] gets a
/// thrift exception back, which is how the tests prove the proxy rewrote the
/// payload.
pub async fn start_mock_upstream() -> MockUpstream {
    let counters = UpstreamCounters::default();
    let state = counters.clone();

    let root_state = state.clone();
    let app = Router::new()
        .route(
            "/{*path}",
            any(move |request: Request<Body>| handle(state.clone(), request)),
        )
        .route(
            "/",
            any(move |request: Request<Body>| handle(root_state.clone(), request)),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockUpstream { addr, counters }
}

async fn handle(counters: UpstreamCounters, request: Request<Body>) -> Response {
    let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .unwrap_or_else(|_| Bytes::new());
    let envelope: Value = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(_) => return (StatusCode::BAD_REQUEST, "not thrift json").into_response(),
    };
    let method = envelope[1].as_str().unwrap_or_default().to_string();
    let session = envelope[4]["1"]["str"].as_str().unwrap_or_default();
    let needs_session = matches!(
        method.as_str(),
        "get_server_status" | "get_tables" | "get_table_details" | "sql_execute"
    );
    if needs_session && session != MOCK_SESSION {
        let reply = exception_envelope(&method, "Session not valid");
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, THRIFT_JSON)],
            reply,
        )
            .into_response();
    }

    let reply = match method.as_str() {
        "connect" => {
            counters.connects.fetch_add(1, Ordering::SeqCst);
            reply_envelope(&method, json!({"0": {"str": MOCK_SESSION}}))
        }
        "disconnect" => reply_envelope(&method, json!({})),
        "get_server_status" => reply_envelope(
            &method,
            json!({"0": {"rec": {
                "1": {"tf": 0},
                "2": {"str": "4.1.0"},
                "3": {"i64": 1714000000},
            }}}),
        ),
        "get_tables" => reply_envelope(&method, json!({"0": {"lst": ["str", 2, "t1", "t2"]}})),
        "get_table_details" => reply_envelope(
            &method,
            json!({"0": {"rec": {"1": {"str": "table details"}}}}),
        ),
        "sql_execute" => {
            counters.sql_calls.fetch_add(1, Ordering::SeqCst);
            counters
                .last_sql_seq
                .store(envelope[3].as_i64().unwrap_or(-1), Ordering::SeqCst);
            let query = envelope[4]["2"]["str"].as_str().unwrap_or_default();
            let count = if query.contains("t1") {
                3
            } else if query.contains("t2") {
                0
            } else {
                7
            };
            reply_envelope(
                &method,
                json!({"0": {"rec": {"1": {"lst": ["rec", 1, {
                    "1": {"lst": ["i64", 1, count]},
                    "2": {"lst": ["tf", 1, 0]},
                }]}}}}),
            )
        }
        _ => reply_envelope(&method, json!({"0": {"str": "ok"}})),
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, THRIFT_JSON)],
        reply,
    )
        .into_response()
}

fn reply_envelope(method: &str, fields: Value) -> Vec<u8> {
    serde_json::to_vec(&json!([1, method, 2, 0, fields])).unwrap()
}

fn exception_envelope(method: &str, message: &str) -> Vec<u8> {
    serde_json::to_vec(&json!([1, method, 3, 0, {"1": {"str": message}}])).unwrap()
}

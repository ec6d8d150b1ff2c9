//! HTTP server setup and the main proxy handler.
//!
//! # Responsibilities
//! - Create the Axum router (healthcheck + catch-all proxy route)
//! - Buffer each request body and dispatch on its call kind
//! - Serve query cache hits directly, with the upstream's content type
//! - Forward everything else with the session token injected

use std::future::IntoFuture;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, request, HeaderValue, Request, Response, StatusCode, Uri},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::cache::{extract_query_text, CacheGateway, CacheStore};
use crate::config::ProxyConfig;
use crate::health::HealthReporter;
use crate::http::classify::{classify, CallKind};
use crate::http::forward::ForwardingTransport;
use crate::observability::metrics;
use crate::rewrite::PayloadRewriter;
use crate::session::SessionManager;
use crate::upstream::{UpstreamError, UpstreamResult};

/// Content type stamped on cache hits, matching what the upstream would send.
const RPC_CONTENT_TYPE: &str = "application/vnd.apache.thrift.json; charset=utf-8";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub rewriter: Arc<PayloadRewriter>,
    pub gateway: CacheGateway,
    pub transport: Arc<ForwardingTransport>,
    pub reporter: Arc<HealthReporter>,
}

/// HTTP server for the session proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Wire the handler state from an established session and cache store.
    pub fn new(
        config: &ProxyConfig,
        manager: Arc<SessionManager>,
        store: Arc<dyn CacheStore>,
    ) -> UpstreamResult<Self> {
        let upstream: Uri = config
            .upstream
            .url
            .parse()
            .map_err(|e| UpstreamError::Transport(format!("bad upstream URL: {e}")))?;
        let transport = Arc::new(ForwardingTransport::new(
            &upstream,
            config.upstream.buffer_size,
        )?);

        let state = AppState {
            rewriter: Arc::new(PayloadRewriter::new(manager.session().clone())),
            gateway: CacheGateway::new(store),
            transport,
            reporter: Arc::new(HealthReporter::new(manager)),
        };

        Ok(Self {
            router: Self::build_router(state),
        })
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/healthcheck", get(health_handler).post(health_handler))
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run until the shutdown signal fires. In-flight requests are dropped,
    /// not drained.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        tokio::select! {
            result = axum::serve(listener, self.router).into_future() => result?,
            _ = shutdown.recv() => {
                tracing::info!("HTTP server stopping");
            }
        }
        Ok(())
    }
}

/// `/healthcheck`: full diagnostic sequence against the upstream.
async fn health_handler(State(state): State<AppState>) -> Response<Body> {
    match state.reporter.snapshot().await {
        Ok(snapshot) => {
            metrics::record_request("healthcheck", 200);
            (StatusCode::OK, Json(snapshot)).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "healthcheck failed");
            metrics::record_request("healthcheck", 500);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Catch-all reverse proxy handler.
async fn proxy_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Response<Body> {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read request body");
            metrics::record_request("unreadable", 502);
            return plain_error(StatusCode::BAD_GATEWAY, "failed to read request body");
        }
    };

    let kind = classify(&bytes);
    tracing::debug!(
        method = %parts.method,
        path = %parts.uri.path(),
        kind = kind.as_str(),
        "proxying request"
    );

    let result = match kind {
        CallKind::QueryExecution => handle_query(&state, &parts, &bytes).await,
        CallKind::MetadataLookup => {
            let rewritten = state.rewriter.rewrite_metadata(&bytes);
            forward(&state, &parts, rewritten).await
        }
        CallKind::PassThrough => forward(&state, &parts, bytes.to_vec()).await,
    };

    let response = result.unwrap_or_else(|error_response| error_response);
    metrics::record_request(kind.as_str(), response.status().as_u16());
    response
}

/// Query-execution path: cache-aside around the upstream round trip.
async fn handle_query(
    state: &AppState,
    parts: &request::Parts,
    payload: &[u8],
) -> Result<Response<Body>, Response<Body>> {
    let key = extract_query_text(payload).map_err(|e| {
        tracing::warn!(error = %e, "query payload extraction failed");
        plain_error(StatusCode::BAD_GATEWAY, &e.to_string())
    })?;

    if let Some(cached) = state.gateway.get(&key).await {
        tracing::debug!(query = %key, "serving cached result");
        return Ok(cached_response(cached));
    }

    let rewritten = state.rewriter.rewrite_query(payload).map_err(|e| {
        tracing::warn!(error = %e, "query rewrite failed");
        plain_error(StatusCode::BAD_GATEWAY, &e.to_string())
    })?;

    let forwarded = state
        .transport
        .forward(parts, rewritten)
        .await
        .map_err(upstream_failure)?;

    // only a successful upstream reply is worth keeping
    if forwarded.status.is_success() {
        state.gateway.set(&key, &forwarded.body).await;
    }
    Ok(forwarded.into_response())
}

/// Non-cached path: straight round trip with the (possibly rewritten) body.
async fn forward(
    state: &AppState,
    parts: &request::Parts,
    body: Vec<u8>,
) -> Result<Response<Body>, Response<Body>> {
    state
        .transport
        .forward(parts, body)
        .await
        .map(|forwarded| forwarded.into_response())
        .map_err(upstream_failure)
}

fn upstream_failure(e: UpstreamError) -> Response<Body> {
    tracing::error!(error = %e, "upstream round trip failed");
    metrics::record_upstream_error("forward");
    plain_error(StatusCode::BAD_GATEWAY, "upstream request failed")
}

/// Serve cached bytes directly, bypassing the upstream.
fn cached_response(bytes: Vec<u8>) -> Response<Body> {
    let len = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(RPC_CONTENT_TYPE),
    );
    headers.insert(header::CONTENT_LENGTH, len.into());
    response
}

fn plain_error(status: StatusCode, message: &str) -> Response<Body> {
    (status, message.to_string()).into_response()
}

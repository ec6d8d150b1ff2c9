//! HTTP client for the upstream database's Thrift-JSON endpoint.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::{json, Value};

use crate::upstream::types::{ResultSet, ServerStatus, UpstreamError, UpstreamResult};
use crate::upstream::wire::{
    decode_result_set, decode_server_status, decode_table_list, Envelope,
};

/// Content type the upstream expects on every Thrift-JSON call.
pub const THRIFT_JSON_CONTENT_TYPE: &str = "application/vnd.apache.thrift.json; charset=utf-8";

/// RPC surface of the upstream database server.
///
/// Session and health logic depend on this trait so tests can substitute a
/// scripted stub for the real server.
#[async_trait]
pub trait DbClient: Send + Sync {
    /// Log in and obtain a session token.
    async fn connect(&self, user: &str, password: &str, db: &str) -> UpstreamResult<String>;

    /// Invalidate a session. Best-effort; the server may already be gone.
    async fn disconnect(&self, session: &str) -> UpstreamResult<()>;

    async fn get_server_status(&self, session: &str) -> UpstreamResult<ServerStatus>;

    async fn get_tables(&self, session: &str) -> UpstreamResult<Vec<String>>;

    async fn sql_execute(
        &self,
        session: &str,
        query: &str,
        column_format: bool,
        first_row: i64,
        max_rows: i64,
    ) -> UpstreamResult<ResultSet>;
}

/// `DbClient` over HTTP POST, one envelope per call.
pub struct HttpThriftClient {
    http: Client<HttpConnector, Body>,
    url: Uri,
    seq: AtomicI64,
}

impl HttpThriftClient {
    pub fn new(url: Uri) -> Self {
        let http = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            http,
            url,
            seq: AtomicI64::new(0),
        }
    }

    async fn call(&self, method: &str, fields: Value) -> UpstreamResult<Envelope> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let envelope = Envelope::call(method, seq, fields);
        let body = envelope.to_bytes();

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.url.clone())
            .header(header::CONTENT_TYPE, THRIFT_JSON_CONTENT_TYPE)
            .header(header::ACCEPT, THRIFT_JSON_CONTENT_TYPE)
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let response = self
            .http
            .request(request)
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let bytes = axum::body::to_bytes(Body::new(response.into_body()), usize::MAX)
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        Envelope::parse(&bytes)
    }
}

#[async_trait]
impl DbClient for HttpThriftClient {
    async fn connect(&self, user: &str, password: &str, db: &str) -> UpstreamResult<String> {
        let reply = self
            .call(
                "connect",
                json!({
                    "1": {"str": user},
                    "2": {"str": password},
                    "3": {"str": db},
                }),
            )
            .await?;
        let session = reply
            .reply_value()
            .map_err(|e| match e {
                // a rejected login comes back as a server exception
                UpstreamError::Exception(msg) => UpstreamError::Auth(msg),
                other => other,
            })?
            .get("str")
            .and_then(Value::as_str)
            .ok_or_else(|| UpstreamError::Protocol("connect reply missing session".into()))?
            .to_string();
        Ok(session)
    }

    async fn disconnect(&self, session: &str) -> UpstreamResult<()> {
        let reply = self
            .call("disconnect", json!({"1": {"str": session}}))
            .await?;
        // void reply carries no success field; only an exception is a failure
        if reply.message_type() == crate::upstream::wire::MSG_EXCEPTION {
            reply.reply_value().map(|_| ())
        } else {
            Ok(())
        }
    }

    async fn get_server_status(&self, session: &str) -> UpstreamResult<ServerStatus> {
        let reply = self
            .call("get_server_status", json!({"1": {"str": session}}))
            .await?;
        decode_server_status(reply.reply_value()?)
    }

    async fn get_tables(&self, session: &str) -> UpstreamResult<Vec<String>> {
        let reply = self
            .call("get_tables", json!({"1": {"str": session}}))
            .await?;
        decode_table_list(reply.reply_value()?)
    }

    async fn sql_execute(
        &self,
        session: &str,
        query: &str,
        column_format: bool,
        first_row: i64,
        max_rows: i64,
    ) -> UpstreamResult<ResultSet> {
        let reply = self
            .call(
                "sql_execute",
                json!({
                    "1": {"str": session},
                    "2": {"str": query},
                    "3": {"tf": if column_format { 1 } else { 0 }},
                    "4": {"i64": first_row},
                    "5": {"i64": max_rows},
                }),
            )
            .await?;
        decode_result_set(reply.reply_value()?)
    }
}

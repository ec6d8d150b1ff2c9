//! Upstream round trip with full response buffering.

use axum::body::{Body, Bytes};
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, request, HeaderMap, Response, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::upstream::{UpstreamError, UpstreamResult};

/// A fully buffered upstream response.
///
/// Buffering lets the cache gateway observe the bytes before they reach the
/// original caller, and guarantees the replayed Content-Length is accurate.
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ForwardedResponse {
    /// Replay the buffered response byte-for-byte to the original caller.
    pub fn into_response(mut self) -> Response<Body> {
        // the body was re-buffered, so the framing headers are ours to declare
        self.headers.remove(header::TRANSFER_ENCODING);
        self.headers
            .insert(header::CONTENT_LENGTH, self.body.len().into());
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Executes the HTTP round trip to the single upstream server.
pub struct ForwardingTransport {
    client: Client<HttpConnector, Body>,
    scheme: Scheme,
    authority: Authority,
}

impl ForwardingTransport {
    /// Build a transport for the upstream base URL.
    pub fn new(upstream: &Uri, buffer_size: usize) -> UpstreamResult<Self> {
        let scheme = upstream.scheme().cloned().unwrap_or(Scheme::HTTP);
        let authority = upstream
            .authority()
            .cloned()
            .ok_or_else(|| UpstreamError::Transport("upstream URL has no authority".into()))?;
        let client = Client::builder(TokioExecutor::new())
            .http1_max_buf_size(buffer_size.max(8192))
            .build(HttpConnector::new());
        Ok(Self {
            client,
            scheme,
            authority,
        })
    }

    /// Forward a request body (possibly rewritten) to the upstream, preserving
    /// the caller's method, path and headers, and buffer the whole response.
    ///
    /// No retries: any transport failure is the caller's to report.
    pub async fn forward(
        &self,
        parts: &request::Parts,
        body: Vec<u8>,
    ) -> UpstreamResult<ForwardedResponse> {
        let path_and_query = parts
            .uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        let uri = Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let mut builder = axum::http::Request::builder()
            .method(parts.method.clone())
            .uri(uri)
            .version(parts.version);
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in parts.headers.iter() {
                headers.insert(name.clone(), value.clone());
            }
            headers.remove(header::HOST);
            // the rewrite may have changed the serialized length; the declared
            // length must follow the buffer, not the other way around
            headers.insert(header::CONTENT_LENGTH, body.len().into());
        }
        let request = builder
            .body(Body::from(body))
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(Body::new(body), usize::MAX)
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(ForwardedResponse {
            status: parts.status,
            headers: parts.headers,
            body: bytes,
        })
    }
}

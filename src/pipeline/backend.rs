//! Backend gateway client.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the backend authority
//! - Propagate the request ID
//! - Bound the round trip with the backend timeout
//! - Buffer the reply body up to a size limit
//!
//! # Design Decisions
//! - One pooled hyper client shared by every request
//! - No retries: a failed call fails the request
//! - Dropping the returned future aborts the in-flight call

use std::str::FromStr;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::uri::{Authority, Scheme};
use axum::http::{header, HeaderValue, Method, Request, StatusCode, Uri};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time::timeout;

use crate::config::schema::{BackendConfig, TimeoutConfig};
use crate::config::validation::ValidationError;
use crate::http::X_REQUEST_ID;
use crate::pipeline::ProxyError;

/// A request ready to send to the backend.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub method: Method,
    /// Path plus optional query, already percent-encoded.
    pub path_and_query: String,
    /// JSON body, if any.
    pub body: Option<Bytes>,
    pub request_id: String,
}

/// A buffered backend reply.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// HTTP client bound to the backend gateway.
#[derive(Clone)]
pub struct BackendClient {
    client: Client<HttpConnector, Body>,
    authority: Authority,
    timeout: Duration,
    max_response_bytes: usize,
}

impl BackendClient {
    pub fn new(backend: &BackendConfig, timeouts: &TimeoutConfig) -> Result<Self, ValidationError> {
        let authority =
            Authority::from_str(&backend.address).map_err(|e| ValidationError::InvalidValue {
                field: "backend.address",
                reason: e.to_string(),
            })?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            client,
            authority,
            timeout: Duration::from_secs(timeouts.backend_secs),
            max_response_bytes: backend.max_response_bytes,
        })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Send a request and buffer the reply.
    ///
    /// Transport failures map to 502, an expired deadline to 504. Any HTTP
    /// status, including non-2xx, is returned as a response.
    pub async fn send(&self, request: BackendRequest) -> Result<BackendResponse, ProxyError> {
        let uri = Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(request.path_and_query.as_str())
            .build()
            .map_err(|e| ProxyError::Internal(format!("invalid backend URI: {}", e)))?;

        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(uri)
            .header(header::ACCEPT, "application/json");
        if let Ok(value) = HeaderValue::from_str(&request.request_id) {
            builder = builder.header(X_REQUEST_ID, value);
        }
        let body = match request.body {
            Some(bytes) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(bytes)
            }
            None => Body::empty(),
        };
        let outgoing = builder
            .body(body)
            .map_err(|e| ProxyError::Internal(format!("invalid backend request: {}", e)))?;

        let exchange = async {
            let response = self.client.request(outgoing).await.map_err(|e| {
                tracing::error!(request_id = %request.request_id, error = %e, "Upstream error");
                ProxyError::Upstream {
                    status: StatusCode::BAD_GATEWAY,
                    message: "backend unreachable".to_string(),
                }
            })?;
            let (parts, body): (_, Incoming) = response.into_parts();
            let body = axum::body::to_bytes(Body::new(body), self.max_response_bytes)
                .await
                .map_err(|e| ProxyError::Upstream {
                    status: StatusCode::BAD_GATEWAY,
                    message: format!("failed to read backend reply: {}", e),
                })?;
            Ok::<_, ProxyError>(BackendResponse {
                status: parts.status,
                body,
            })
        };

        match timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    request_id = %request.request_id,
                    timeout = ?self.timeout,
                    "Backend timed out"
                );
                Err(ProxyError::Timeout(self.timeout))
            }
        }
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("authority", &self.authority)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Pick a client-facing message out of a backend error body.
///
/// Gateways answer with `{"code": .., "message": ..}`; anything else falls
/// back to the status reason.
pub fn upstream_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| {
            format!(
                "backend returned {}",
                status.canonical_reason().unwrap_or("an error")
            )
        })
}

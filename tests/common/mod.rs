//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceExt;

use transcoding_proxy::codec::CodecRegistry;
use transcoding_proxy::config::ProxyConfig;
use transcoding_proxy::http::HttpServer;
use transcoding_proxy::lifecycle::assemble;
use transcoding_proxy::schema::EndpointFactory;

/// What the mock backend saw.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub path_and_query: String,
    pub body: Bytes,
    pub request_id: Option<String>,
}

impl Captured {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

type Reply = Arc<dyn Fn(&Captured) -> (u16, String) + Send + Sync>;

#[derive(Clone)]
struct MockState {
    captured: Arc<Mutex<Vec<Captured>>>,
    reply: Reply,
    delay: Duration,
}

/// A programmable gateway stand-in bound to an ephemeral port.
#[derive(Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    captured: Arc<Mutex<Vec<Captured>>>,
}

impl MockBackend {
    pub async fn start<F>(reply: F) -> Self
    where
        F: Fn(&Captured) -> (u16, String) + Send + Sync + 'static,
    {
        Self::start_delayed(Duration::ZERO, reply).await
    }

    /// Like [`MockBackend::start`], sleeping before every reply.
    pub async fn start_delayed<F>(delay: Duration, reply: F) -> Self
    where
        F: Fn(&Captured) -> (u16, String) + Send + Sync + 'static,
    {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            captured: captured.clone(),
            reply: Arc::new(reply),
            delay,
        };
        let app = Router::new().fallback(mock_handler).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, captured }
    }

    /// Always answer `status` with `body`.
    pub async fn fixed(status: u16, body: &str) -> Self {
        let body = body.to_string();
        Self::start(move |_| (status, body.clone())).await
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.captured.lock().unwrap().clone()
    }

    pub fn last(&self) -> Captured {
        self.requests().pop().expect("backend saw no request")
    }
}

async fn mock_handler(State(state): State<MockState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = body.collect().await.unwrap().to_bytes();
    let captured = Captured {
        method: parts.method,
        path_and_query: parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default(),
        body,
        request_id: parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    let (status, body) = (state.reply)(&captured);
    state.captured.lock().unwrap().push(captured);

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    (
        StatusCode::from_u16(status).unwrap(),
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

/// Defaults pointed at `backend`.
pub fn config_for(backend: &MockBackend) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.backend.address = backend.addr.to_string();
    config
}

/// The proxy's full router, middleware included.
pub fn proxy(config: ProxyConfig, factory: &dyn EndpointFactory) -> Router {
    let pipeline = assemble(&config, CodecRegistry::with_builtins(), &[factory]).unwrap();
    HttpServer::new(config, pipeline).router()
}

/// Send one request through `router` and decode the JSON reply.
pub async fn send(router: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let response = call(router, method, uri, body).await;
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

pub async fn call(router: &Router, method: Method, uri: &str, body: Option<&str>) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();
    router.clone().oneshot(request).await.unwrap()
}

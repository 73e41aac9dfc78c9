//! Full pipeline overrides.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use crate::pipeline::BackendClient;
use crate::routing::PathParams;
use crate::transform::TransformEngine;

/// Everything a custom handler may need besides the request itself.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub request_id: String,
    pub template: String,
    pub params: PathParams,
    /// Client for the same backend the pipeline forwards to.
    pub backend: BackendClient,
    /// The engine the pipeline uses, for handlers that reuse field codecs.
    pub engine: TransformEngine,
}

/// Owns the whole request lifecycle for one method of one endpoint.
///
/// Once routing selects a custom handler no pipeline stage runs; the
/// handler produces the final response, errors included.
#[async_trait]
pub trait CustomHandler: Send + Sync {
    async fn handle(&self, ctx: HandlerContext, request: Request<Body>) -> Response;
}

//! Error rendering.
//!
//! # Design Decisions
//! - Every failure leaves the proxy as a JSON body built from the
//!   endpoint's error shape
//! - Client errors log at warn, server and upstream errors at error

use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::observability::metrics;
use crate::pipeline::{ProxyError, Step};
use crate::schema::ErrorShape;

/// Log `error` and render it with `shape`.
pub fn error_response(
    shape: &ErrorShape,
    step: Step,
    error: &ProxyError,
    request_id: &str,
) -> Response {
    let status = error.status();
    let field_path = error.field_path().unwrap_or("");
    if status.is_server_error() {
        tracing::error!(
            request_id = %request_id,
            step = step.as_str(),
            status = status.as_u16(),
            field_path,
            error = %error,
            "Request failed"
        );
    } else {
        tracing::warn!(
            request_id = %request_id,
            step = step.as_str(),
            status = status.as_u16(),
            field_path,
            error = %error,
            "Request rejected"
        );
    }
    metrics::record_stage_error(step.as_str(), error.kind());

    (status, Json(shape.render(error, step))).into_response()
}

//! Per-request error taxonomy.

use std::time::Duration;

use axum::http::{Method, StatusCode};
use thiserror::Error;

use crate::codec::Direction;
use crate::hooks::HookError;
use crate::schema::ShapeError;
use crate::transform::EncodingError;

/// Everything that can fail while serving one request.
///
/// Configuration problems are not represented here; they stop the process
/// before traffic is accepted.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no endpoint matches path `{0}`")]
    NotFound(String),

    #[error("method {method} is not allowed on `{path}`")]
    MethodNotAllowed { method: Method, path: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("invalid request: {0}")]
    InvalidRequest(ShapeError),

    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("backend reply does not match its shape: {0}")]
    InvalidReply(ShapeError),

    #[error("request did not complete within {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Hook(#[from] HookError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// HTTP status reported to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::BadRequest(_) | ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Encoding(e) => match e.direction {
                Direction::Outbound => StatusCode::BAD_REQUEST,
                Direction::Inbound => StatusCode::BAD_GATEWAY,
            },
            ProxyError::Upstream { status, .. }
                if status.is_client_error() || status.is_server_error() =>
            {
                *status
            }
            ProxyError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::InvalidReply(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Hook(e) => e.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Offending field, when the failure concerns one.
    pub fn field_path(&self) -> Option<&str> {
        match self {
            ProxyError::Encoding(e) => Some(&e.field_path),
            ProxyError::InvalidRequest(e) | ProxyError::InvalidReply(e)
                if !e.field_path.is_empty() =>
            {
                Some(&e.field_path)
            }
            _ => None,
        }
    }

    /// Short machine-readable name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::NotFound(_) => "not_found",
            ProxyError::MethodNotAllowed { .. } => "method_not_allowed",
            ProxyError::BadRequest(_) | ProxyError::InvalidRequest(_) => "bad_request",
            ProxyError::PayloadTooLarge(_) => "payload_too_large",
            ProxyError::Encoding(_) => "encoding",
            ProxyError::Upstream { .. } | ProxyError::InvalidReply(_) => "upstream",
            ProxyError::Timeout(_) => "timeout",
            ProxyError::Hook(_) => "hook",
            ProxyError::Internal(_) => "internal",
        }
    }
}

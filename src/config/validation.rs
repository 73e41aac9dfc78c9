//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Name every configuration error the proxy can detect at startup
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A configuration bug. Always fatal at startup, never surfaced per request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("path template `{0}` is registered twice")]
    DuplicatePath(String),

    #[error("path templates `{0}` and `{1}` can match the same request path")]
    AmbiguousTemplate(String, String),

    #[error("invalid path template `{template}`: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("no codec registered for marker `{0}`")]
    UnknownMarker(String),

    #[error("codec marker `{0}` is registered twice")]
    DuplicateMarker(String),

    #[error("endpoint `{path}` binds a second {phase} hook to stage {stage}")]
    DuplicateHook {
        path: String,
        stage: &'static str,
        phase: &'static str,
    },

    #[error("endpoint `{path}`: literal parameter `{param}` is not part of the template")]
    UnknownLiteralParam { path: String, param: String },

    #[error("endpoint `{path}`: query parameter `{param}` targets {reason}")]
    InvalidQueryBinding {
        path: String,
        param: String,
        reason: String,
    },

    #[error("endpoint `{path}`: invalid HTTP method `{method}`")]
    InvalidMethod { path: String, method: String },

    #[error("endpoint `{path}` declares method {method} twice")]
    DuplicateMethod { path: String, method: String },

    #[error("unknown shape `{0}`")]
    UnknownShape(String),

    #[error("shape `{0}` refers to itself")]
    RecursiveShape(String),

    #[error("field `{shape}.{field}`: {reason}")]
    InvalidField {
        shape: String,
        field: String,
        reason: String,
    },

    #[error("{field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Validate the ambient sections of a configuration.
///
/// Endpoint and shape declarations are checked when the endpoint factory
/// builds them.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidValue {
            field: "listener.bind_address",
            reason: format!("`{}` is not a socket address", config.listener.bind_address),
        });
    }

    if config.backend.address.parse::<Authority>().is_err() {
        errors.push(ValidationError::InvalidValue {
            field: "backend.address",
            reason: format!("`{}` is not a host:port authority", config.backend.address),
        });
    }

    if config.backend.max_response_bytes == 0 {
        errors.push(ValidationError::InvalidValue {
            field: "backend.max_response_bytes",
            reason: "must be greater than zero".to_string(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::InvalidValue {
            field: "timeouts.request_secs",
            reason: "must be greater than zero".to_string(),
        });
    }

    if config.timeouts.backend_secs == 0 {
        errors.push(ValidationError::InvalidValue {
            field: "timeouts.backend_secs",
            reason: "must be greater than zero".to_string(),
        });
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::InvalidValue {
            field: "limits.max_body_bytes",
            reason: "must be greater than zero".to_string(),
        });
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidValue {
            field: "observability.metrics_address",
            reason: format!(
                "`{}` is not a socket address",
                config.observability.metrics_address
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

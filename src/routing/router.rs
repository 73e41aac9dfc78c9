//! Endpoint lookup and dispatch.
//!
//! # Responsibilities
//! - Store registered endpoints
//! - Resolve a request path to its endpoint and bound parameters
//! - Reject duplicate and ambiguous templates at registration
//! - Enumerate templates for introspection
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Templates bucketed by segment count; linear scan within a bucket
//! - Explicit NotFound rather than silent default
//! - At most one template can match any path, so order never matters

use std::collections::HashMap;
use std::sync::Arc;

use crate::codec::CodecRegistry;
use crate::config::validation::ValidationError;
use crate::pipeline::ProxyError;
use crate::routing::matcher::PathParams;
use crate::schema::{Endpoint, EndpointFactory};

/// Registry of endpoints keyed by path template.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    /// Templates in registration order.
    order: Vec<Arc<Endpoint>>,
    /// Segment count → endpoints with that many segments.
    buckets: HashMap<usize, Vec<Arc<Endpoint>>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from every endpoint a factory supplies.
    pub fn from_factory(factory: &dyn EndpointFactory) -> Result<Self, Vec<ValidationError>> {
        let mut registry = Self::new();
        registry.extend_from(factory)?;
        Ok(registry)
    }

    /// Register every endpoint a factory supplies, collecting all errors.
    pub fn extend_from(&mut self, factory: &dyn EndpointFactory) -> Result<(), Vec<ValidationError>> {
        let endpoints = factory.endpoints()?;
        let errors: Vec<ValidationError> = endpoints
            .into_iter()
            .filter_map(|endpoint| self.register(endpoint).err())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Add an endpoint.
    pub fn register(&mut self, endpoint: Endpoint) -> Result<(), ValidationError> {
        let template = endpoint.template();
        let bucket = self.buckets.entry(template.segment_count()).or_default();

        for existing in bucket.iter() {
            let other = existing.template();
            if other.as_str() == template.as_str() {
                return Err(ValidationError::DuplicatePath(template.to_string()));
            }
            if other.overlaps(template) {
                return Err(ValidationError::AmbiguousTemplate(
                    other.to_string(),
                    template.to_string(),
                ));
            }
        }

        tracing::debug!(path = %template, methods = ?endpoint.methods(), "Endpoint registered");
        let endpoint = Arc::new(endpoint);
        bucket.push(endpoint.clone());
        self.order.push(endpoint);
        Ok(())
    }

    /// Resolve a request path. Parameter values come back percent-encoded.
    pub fn resolve(&self, path: &str) -> Result<(Arc<Endpoint>, PathParams), ProxyError> {
        let candidates = self
            .buckets
            .get(&segment_count(path))
            .ok_or_else(|| ProxyError::NotFound(path.to_string()))?;

        candidates
            .iter()
            .find_map(|endpoint| {
                endpoint
                    .template()
                    .matches(path)
                    .map(|params| (endpoint.clone(), params))
            })
            .ok_or_else(|| ProxyError::NotFound(path.to_string()))
    }

    /// All registered templates, in registration order.
    pub fn paths(&self) -> Vec<&str> {
        self.order.iter().map(|e| e.template().as_str()).collect()
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Arc<Endpoint>> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Check that every field marker used by any endpoint has a codec.
    pub fn validate_markers(&self, codecs: &CodecRegistry) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        for endpoint in &self.order {
            for marker in endpoint.markers() {
                if let Err(e) = codecs.lookup(marker) {
                    if !errors.contains(&e) {
                        errors.push(e);
                    }
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn segment_count(path: &str) -> usize {
    match path.strip_prefix('/') {
        Some("") | None => 0,
        Some(rest) => rest.split('/').count(),
    }
}

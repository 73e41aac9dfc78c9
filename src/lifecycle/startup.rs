//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the endpoint registry from config and code factories
//! - Check every marker against the codec registry
//! - Start the metrics exporter, bind the listener, begin accepting traffic

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::codec::CodecRegistry;
use crate::config::{ConfigEndpointFactory, ProxyConfig, ValidationError};
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::shutdown_signal;
use crate::observability::metrics;
use crate::pipeline::{BackendClient, Pipeline, PipelineSettings};
use crate::routing::EndpointRegistry;
use crate::schema::EndpointFactory;

/// Build the pipeline from the config's declarative endpoints plus any
/// `factories` declared in code.
///
/// Every configuration error is returned, not just the first.
pub fn assemble(
    config: &ProxyConfig,
    codecs: CodecRegistry,
    factories: &[&dyn EndpointFactory],
) -> Result<Pipeline, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let declared = ConfigEndpointFactory::from_config(config);
    let mut registry = EndpointRegistry::new();
    for factory in std::iter::once(&declared as &dyn EndpointFactory).chain(factories.iter().copied()) {
        if let Err(mut e) = registry.extend_from(factory) {
            errors.append(&mut e);
        }
    }

    if let Err(mut e) = registry.validate_markers(&codecs) {
        errors.append(&mut e);
    }
    if let Some(marker) = config.backend.path_param_marker.as_deref() {
        if let Err(e) = codecs.lookup(marker) {
            if !errors.contains(&e) {
                errors.push(e);
            }
        }
    }

    let backend = match BackendClient::new(&config.backend, &config.timeouts) {
        Ok(backend) if errors.is_empty() => backend,
        Ok(_) => return Err(errors),
        Err(e) => {
            errors.push(e);
            return Err(errors);
        }
    };

    tracing::info!(
        endpoints = registry.len(),
        codecs = codecs.markers().len(),
        backend = %backend.authority(),
        "Endpoints registered"
    );

    Pipeline::new(
        registry,
        Arc::new(codecs),
        backend,
        PipelineSettings::from_config(config),
    )
}

/// Serve `pipeline` until Ctrl+C or SIGTERM, then drain and return.
pub async fn run(config: ProxyConfig, pipeline: Pipeline) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let signalled = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    HttpServer::new(config, pipeline).run(listener, signalled).await
}

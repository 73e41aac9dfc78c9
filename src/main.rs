//! Transcoding proxy
//!
//! An HTTP/JSON front end for a generated JSON-transcoding gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                  TRANSCODING PROXY                   │
//!                         │                                                      │
//!     Client Request      │  ┌─────────┐    ┌──────────┐    ┌───────────────┐    │
//!     ────────────────────┼─▶│  http   │───▶│ routing  │───▶│   pipeline    │    │
//!                         │  │ server  │    │ registry │    │ bind/decode   │    │
//!                         │  └─────────┘    └──────────┘    └───────┬───────┘    │
//!                         │                                         │ hooks      │
//!                         │                                         ▼            │
//!                         │                                 ┌───────────────┐    │
//!                         │                                 │  transform    │    │
//!                         │                                 │ engine+codecs │    │
//!                         │                                 └───────┬───────┘    │
//!                         │                                         ▼            │
//!     Client Response     │  ┌─────────┐                    ┌───────────────┐    │
//!     ◀───────────────────┼──│response │◀───────────────────│backend client │◀───┼── Gateway
//!                         │  └─────────┘                    └───────────────┘    │
//!                         │                                                      │
//!                         │   config · observability · lifecycle                 │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use transcoding_proxy::codec::CodecRegistry;
use transcoding_proxy::config::{load_config, ProxyConfig};
use transcoding_proxy::lifecycle;
use transcoding_proxy::observability::logging::init_logging;
use transcoding_proxy::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "transcoding-proxy")]
#[command(about = "HTTP/JSON proxy in front of a JSON-transcoding gateway", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve traffic (default)
    Serve,
    /// Print the registered endpoints and exit
    Routes,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    let _ = init_logging(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let pipeline = match lifecycle::assemble(&config, CodecRegistry::with_builtins(), &[]) {
        Ok(pipeline) => pipeline,
        Err(errors) => {
            for error in &errors {
                tracing::error!(error = %error, "Invalid configuration");
            }
            return Err(format!("{} configuration error(s)", errors.len()).into());
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Routes => print_routes(&pipeline),
        Commands::Serve => {
            lifecycle::run(config, pipeline).await?;
            tracing::info!("Shutdown complete");
        }
    }

    Ok(())
}

fn print_routes(pipeline: &Pipeline) {
    for endpoint in pipeline.registry().endpoints() {
        let methods: Vec<&str> = endpoint.methods().iter().map(|m| m.as_str()).collect();
        println!("{:<24} {}", methods.join(","), endpoint.template());
    }
}

//! Transcoding proxy library.
//!
//! Endpoints declared in code (with hooks and custom handlers) are passed
//! to [`lifecycle::assemble`] next to the config file's declarative ones.

pub mod codec;
pub mod config;
pub mod hooks;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod routing;
pub mod schema;
pub mod transform;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::Pipeline;

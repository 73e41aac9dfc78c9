//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks on ambient sections)
//!     → ProxyConfig (validated, immutable)
//!     → endpoints.rs (shapes and endpoints → EndpointFactory)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod endpoints;
pub mod loader;
pub mod schema;
pub mod validation;

pub use endpoints::{ConfigEndpointFactory, EndpointConfig, ShapeConfig};
pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{BackendConfig, ListenerConfig, ProxyConfig};
pub use validation::ValidationError;

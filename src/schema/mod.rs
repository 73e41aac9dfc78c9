//! Schema model subsystem.
//!
//! # Data Flow
//! ```text
//! EndpointFactory (code or config file)
//!     → endpoint.rs (EndpointBuilder::build, per-endpoint checks)
//!     → shape.rs (typed records carrying field markers)
//!     → error_shape.rs (failure rendering)
//!     → EndpointRegistry (routing)
//! ```
//!
//! # Design Decisions
//! - Shapes are plain data built once; shared via Arc
//! - Markers are per-field metadata, consumed only by the transform engine
//! - A method is either transcoded or fully custom, never both

pub mod endpoint;
pub mod error_shape;
pub mod shape;

pub use endpoint::{Endpoint, EndpointBuilder, MethodSpec, QueryParam};
pub use error_shape::{ErrorAttr, ErrorShape};
pub use shape::{Field, FieldKind, Shape, ShapeError, UnknownFields};

use crate::config::validation::ValidationError;

/// Supplies the endpoint set at startup.
pub trait EndpointFactory {
    fn endpoints(&self) -> Result<Vec<Endpoint>, Vec<ValidationError>>;
}

/// Endpoints declared in code, typically alongside their hooks.
impl<F> EndpointFactory for F
where
    F: Fn() -> Vec<EndpointBuilder>,
{
    fn endpoints(&self) -> Result<Vec<Endpoint>, Vec<ValidationError>> {
        let mut endpoints = Vec::new();
        let mut errors = Vec::new();
        for builder in self() {
            match builder.build() {
                Ok(endpoint) => endpoints.push(endpoint),
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            Ok(endpoints)
        } else {
            Err(errors)
        }
    }
}

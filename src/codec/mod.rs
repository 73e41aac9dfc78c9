//! Field codec subsystem.
//!
//! # Data Flow
//! ```text
//! startup:
//!     builtin.rs (base64 default, hex marker)
//!     → registry.rs (marker name → outbound/inbound pair)
//!     → frozen in Arc<CodecRegistry>, shared read-only
//!
//! per request:
//!     transform engine → lookup(marker) → Codec::apply(value, direction)
//! ```
//!
//! # Design Decisions
//! - Codecs are pure string → string functions; no per-request state
//! - Unknown markers are a startup failure, never a request failure
//! - Unmarked byte fields always use the backend's native base64

pub mod builtin;
pub mod registry;

pub use builtin::{BASE64_MARKER, HEX_MARKER};
pub use registry::{Codec, CodecError, CodecFn, CodecRegistry};

use std::fmt;

/// Which way a value travels through the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client representation → backend representation.
    Outbound,
    /// Backend representation → client representation.
    Inbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outbound => f.write_str("outbound"),
            Direction::Inbound => f.write_str("inbound"),
        }
    }
}

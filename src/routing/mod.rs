//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (bucket by segment count)
//!     → matcher.rs (literal equality, bind named segments)
//!     → Return: (Endpoint, PathParams) or NotFound
//!
//! Endpoint Registration (at startup):
//!     EndpointFactory
//!     → parse templates
//!     → reject duplicates and overlapping templates
//!     → Freeze as immutable registry
//! ```
//!
//! # Design Decisions
//! - Endpoints registered at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: at most one template matches a path

pub mod matcher;
pub mod router;

pub use matcher::{PathParams, PathTemplate};
pub use router::EndpointRegistry;

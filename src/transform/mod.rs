//! Field transformation subsystem.
//!
//! # Data Flow
//! ```text
//! decoded request  ──Outbound──▶ engine.rs ──▶ backend request
//! backend reply    ──Inbound───▶ engine.rs ──▶ client response
//!                                   │
//!                                   ▼
//!                            CodecRegistry::lookup(marker)
//! ```

pub mod engine;

pub use engine::{EncodingError, TransformEngine};

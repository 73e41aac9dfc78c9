//! Marker → codec registry.
//!
//! # Responsibilities
//! - Associate a marker name with an outbound/inbound function pair
//! - Reject duplicate registrations
//! - Provide the default base64 codec for unmarked byte fields
//!
//! # Design Decisions
//! - Built once at startup, then shared behind `Arc` without locking
//! - Lookup failures are configuration errors (`ValidationError`)

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::codec::builtin::{
    base64_canonical, base64_to_hex, hex_to_base64, BASE64_MARKER, HEX_MARKER,
};
use crate::codec::Direction;
use crate::config::validation::ValidationError;

/// A single direction of a codec.
pub type CodecFn = Arc<dyn Fn(&str) -> Result<String, CodecError> + Send + Sync>;

/// Errors raised when a value is not well-formed for a codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    #[error("expected a string value, found {0}")]
    NotAString(&'static str),

    #[error("expected a {expected}, found {found}")]
    ShapeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("no codec registered for marker `{0}`")]
    UnknownMarker(String),

    #[error("{0}")]
    Invalid(String),
}

/// A named pair of transformation functions.
#[derive(Clone)]
pub struct Codec {
    name: String,
    outbound: CodecFn,
    inbound: CodecFn,
}

impl Codec {
    pub fn new<O, I>(name: impl Into<String>, outbound: O, inbound: I) -> Self
    where
        O: Fn(&str) -> Result<String, CodecError> + Send + Sync + 'static,
        I: Fn(&str) -> Result<String, CodecError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            outbound: Arc::new(outbound),
            inbound: Arc::new(inbound),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the function matching `direction`.
    pub fn apply(&self, value: &str, direction: Direction) -> Result<String, CodecError> {
        match direction {
            Direction::Outbound => (self.outbound)(value),
            Direction::Inbound => (self.inbound)(value),
        }
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec").field("name", &self.name).finish()
    }
}

/// Immutable-after-startup table of field codecs.
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    codecs: HashMap<String, Codec>,
    default_bytes: Codec,
}

impl CodecRegistry {
    /// An empty registry holding only the default base64 codec.
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
            default_bytes: Codec::new(BASE64_MARKER, base64_canonical, base64_canonical),
        }
    }

    /// A registry with every built-in marker registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.codecs.insert(
            HEX_MARKER.to_string(),
            Codec::new(HEX_MARKER, hex_to_base64, base64_to_hex),
        );
        registry
    }

    /// Register a codec under `marker`.
    pub fn register<O, I>(
        &mut self,
        marker: &str,
        outbound: O,
        inbound: I,
    ) -> Result<(), ValidationError>
    where
        O: Fn(&str) -> Result<String, CodecError> + Send + Sync + 'static,
        I: Fn(&str) -> Result<String, CodecError> + Send + Sync + 'static,
    {
        if self.codecs.contains_key(marker) {
            return Err(ValidationError::DuplicateMarker(marker.to_string()));
        }
        self.codecs
            .insert(marker.to_string(), Codec::new(marker, outbound, inbound));
        Ok(())
    }

    /// Look up the codec for `marker`.
    pub fn lookup(&self, marker: &str) -> Result<&Codec, ValidationError> {
        self.codecs
            .get(marker)
            .ok_or_else(|| ValidationError::UnknownMarker(marker.to_string()))
    }

    /// Codec applied to byte fields without a marker.
    pub fn bytes_codec(&self) -> &Codec {
        &self.default_bytes
    }

    /// Registered marker names, sorted.
    pub fn markers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

//! Marker-driven field transformation.
//!
//! # Responsibilities
//! - Walk a JSON value against its shape, records and lists included
//! - Apply the marked codec, or base64 for unmarked byte fields
//! - Report failures with the full field path (`a.b[2].c`)
//!
//! # Design Decisions
//! - Works on a copy: a failed transform leaves the input untouched
//! - No depth limit; recursion follows the shape, which cannot be cyclic
//! - Members the shape does not mention pass through unchanged
//! - A value whose JSON type contradicts its shape is an error, not a skip

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::codec::{Codec, CodecError, CodecRegistry, Direction};
use crate::schema::{Field, FieldKind, Shape};

/// A codec failed on one field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot encode field `{field_path}` ({direction}): {source}")]
pub struct EncodingError {
    pub field_path: String,
    pub direction: Direction,
    #[source]
    pub source: CodecError,
}

/// Applies field codecs to decoded values.
#[derive(Debug, Clone)]
pub struct TransformEngine {
    codecs: Arc<CodecRegistry>,
}

impl TransformEngine {
    pub fn new(codecs: Arc<CodecRegistry>) -> Self {
        Self { codecs }
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Transform a record value described by `shape`.
    pub fn transform(
        &self,
        value: &Value,
        shape: &Shape,
        direction: Direction,
    ) -> Result<Value, EncodingError> {
        let mut out = value.clone();
        let mut path = Vec::new();
        self.walk_record(&mut out, shape, direction, &mut path)?;
        Ok(out)
    }

    /// Transform one scalar with `marker`, or the default byte codec.
    pub fn transform_scalar(
        &self,
        value: &str,
        marker: Option<&str>,
        direction: Direction,
        field_path: &str,
    ) -> Result<String, EncodingError> {
        let fail = |source| EncodingError {
            field_path: field_path.to_string(),
            direction,
            source,
        };
        let codec = self.codec_for(marker).map_err(fail)?;
        codec.apply(value, direction).map_err(fail)
    }

    fn codec_for(&self, marker: Option<&str>) -> Result<&Codec, CodecError> {
        match marker {
            Some(m) => self
                .codecs
                .lookup(m)
                .map_err(|_| CodecError::UnknownMarker(m.to_string())),
            None => Ok(self.codecs.bytes_codec()),
        }
    }

    fn walk_record(
        &self,
        value: &mut Value,
        shape: &Shape,
        direction: Direction,
        path: &mut Vec<PathPart>,
    ) -> Result<(), EncodingError> {
        let members = match value {
            Value::Object(members) => members,
            Value::Null => return Ok(()),
            other => return Err(mismatch(path, direction, "record", other)),
        };
        for field in shape.fields() {
            let Some(member) = members.get_mut(&field.name) else {
                continue;
            };
            path.push(PathPart::Field(field.name.clone()));
            let result = if field.repeated {
                self.walk_list(member, field, direction, path)
            } else {
                self.walk_value(member, field, direction, path)
            };
            path.pop();
            result?;
        }
        Ok(())
    }

    fn walk_list(
        &self,
        value: &mut Value,
        field: &Field,
        direction: Direction,
        path: &mut Vec<PathPart>,
    ) -> Result<(), EncodingError> {
        let items = match value {
            Value::Array(items) => items,
            Value::Null => return Ok(()),
            other => return Err(mismatch(path, direction, "list", other)),
        };
        for (i, item) in items.iter_mut().enumerate() {
            path.push(PathPart::Index(i));
            let result = self.walk_value(item, field, direction, path);
            path.pop();
            result?;
        }
        Ok(())
    }

    fn walk_value(
        &self,
        value: &mut Value,
        field: &Field,
        direction: Direction,
        path: &mut Vec<PathPart>,
    ) -> Result<(), EncodingError> {
        if let FieldKind::Record(nested) = &field.kind {
            return self.walk_record(value, nested, direction, path);
        }

        let marker = field.marker.as_deref();
        if marker.is_none() && field.kind != FieldKind::Bytes {
            return Ok(());
        }
        if value.is_null() {
            return Ok(());
        }

        let fail = |source| EncodingError {
            field_path: render_path(path),
            direction,
            source,
        };
        let Value::String(raw) = value else {
            return Err(fail(CodecError::NotAString(kind_name(value))));
        };
        let codec = self.codec_for(marker).map_err(fail)?;
        let encoded = codec.apply(raw, direction).map_err(fail)?;
        *value = Value::String(encoded);
        Ok(())
    }
}

enum PathPart {
    Field(String),
    Index(usize),
}

fn render_path(parts: &[PathPart]) -> String {
    let mut out = String::new();
    for part in parts {
        match part {
            PathPart::Field(name) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(name);
            }
            PathPart::Index(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
        }
    }
    out
}

fn mismatch(
    path: &[PathPart],
    direction: Direction,
    expected: &'static str,
    found: &Value,
) -> EncodingError {
    EncodingError {
        field_path: render_path(path),
        direction,
        source: CodecError::ShapeMismatch {
            expected,
            found: kind_name(found),
        },
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "record",
    }
}

//! Record shapes.
//!
//! A shape is the typed description of one JSON record: its fields, their
//! kinds, and the optional field marker selecting a non-default codec.
//! Shapes drive structural decoding and locate markers for the
//! transformation engine.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Number, Value};

/// The primitive or nested kind of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    /// A byte string; base64 on the backend side.
    Bytes,
    Number,
    /// A 64-bit integer, carried as a JSON number or a decimal string.
    Integer,
    Bool,
    Record(Arc<Shape>),
    /// Passed through without inspection.
    Any,
}

impl FieldKind {
    fn describe(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Bytes => "bytes",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Bool => "bool",
            FieldKind::Record(_) => "record",
            FieldKind::Any => "any",
        }
    }
}

/// One field of a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub repeated: bool,
    pub required: bool,
    pub marker: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            repeated: false,
            required: false,
            marker: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn bytes(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bytes)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    pub fn record(name: impl Into<String>, shape: impl Into<Arc<Shape>>) -> Self {
        Self::new(name, FieldKind::Record(shape.into()))
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Any)
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach a field marker naming a registered codec.
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    /// Type a single query-string value according to this field's kind.
    pub fn parse_query_value(&self, raw: &str) -> Result<Value, String> {
        match &self.kind {
            FieldKind::String | FieldKind::Bytes | FieldKind::Any => {
                Ok(Value::String(raw.to_string()))
            }
            FieldKind::Integer => raw
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| raw.parse::<u64>().map(Value::from))
                .map_err(|_| format!("`{}` is not an integer", raw)),
            FieldKind::Number => raw
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("`{}` is not a number", raw)),
            FieldKind::Bool => match raw {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("`{}` is not a boolean", raw)),
            },
            FieldKind::Record(_) => Err("records cannot be bound from a query string".to_string()),
        }
    }
}

/// Structural mismatch between a JSON value and a shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeError {
    pub field_path: String,
    pub reason: String,
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field_path.is_empty() {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "field `{}`: {}", self.field_path, self.reason)
        }
    }
}

impl std::error::Error for ShapeError {}

/// How to treat members the shape does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownFields {
    Reject,
    Drop,
}

/// An ordered record description.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Shape {
    name: String,
    fields: Vec<Field>,
}

impl Shape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// A record with no fields.
    pub fn empty() -> Self {
        Self::new("Empty")
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Every marker used by this shape or any nested shape.
    pub fn markers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_markers(&mut out);
        out
    }

    fn collect_markers<'a>(&'a self, out: &mut Vec<&'a str>) {
        for field in &self.fields {
            if let Some(marker) = field.marker.as_deref() {
                out.push(marker);
            }
            if let FieldKind::Record(nested) = &field.kind {
                nested.collect_markers(out);
            }
        }
    }

    /// Check `value` against this shape and return the projected record.
    ///
    /// `null` members count as absent. Unknown members are rejected or
    /// dropped according to `unknown`.
    pub fn decode(&self, value: Value, unknown: UnknownFields) -> Result<Value, ShapeError> {
        self.decode_at(value, unknown, "")
    }

    fn decode_at(
        &self,
        value: Value,
        unknown: UnknownFields,
        path: &str,
    ) -> Result<Value, ShapeError> {
        let mut members = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ShapeError {
                    field_path: path.to_string(),
                    reason: format!("expected a record, found {}", json_type(&other)),
                })
            }
        };

        let mut out = Map::new();
        for field in &self.fields {
            let field_path = join(path, &field.name);
            match members.remove(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(ShapeError {
                            field_path,
                            reason: "required field is missing".to_string(),
                        });
                    }
                }
                Some(v) => {
                    let decoded = decode_field(field, v, unknown, &field_path)?;
                    out.insert(field.name.clone(), decoded);
                }
            }
        }

        if unknown == UnknownFields::Reject {
            if let Some(name) = members.keys().next() {
                return Err(ShapeError {
                    field_path: join(path, name),
                    reason: format!("unknown field in `{}`", self.name),
                });
            }
        }

        Ok(Value::Object(out))
    }
}

fn decode_field(
    field: &Field,
    value: Value,
    unknown: UnknownFields,
    path: &str,
) -> Result<Value, ShapeError> {
    if !field.repeated {
        return decode_kind(&field.kind, value, unknown, path);
    }
    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| decode_kind(&field.kind, item, unknown, &format!("{}[{}]", path, i)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Err(ShapeError {
            field_path: path.to_string(),
            reason: format!("expected a list, found {}", json_type(&other)),
        }),
    }
}

fn decode_kind(
    kind: &FieldKind,
    value: Value,
    unknown: UnknownFields,
    path: &str,
) -> Result<Value, ShapeError> {
    if let FieldKind::Record(shape) = kind {
        if value.is_object() {
            return shape.decode_at(value, unknown, path);
        }
    }
    let ok = match (kind, &value) {
        (FieldKind::Any, _) => true,
        (FieldKind::String | FieldKind::Bytes, Value::String(_)) => true,
        (FieldKind::Number, Value::Number(_)) => true,
        (FieldKind::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
        (FieldKind::Integer, Value::String(s)) => {
            s.parse::<i64>().is_ok() || s.parse::<u64>().is_ok()
        }
        (FieldKind::Bool, Value::Bool(_)) => true,
        _ => false,
    };
    if ok {
        Ok(value)
    } else {
        Err(ShapeError {
            field_path: path.to_string(),
            reason: format!("expected {}, found {}", kind.describe(), json_type(&value)),
        })
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "record",
    }
}

//! Error body shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::pipeline::{ProxyError, Step};

/// What an error-body member carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAttr {
    /// Human-readable message.
    Message,
    /// Numeric HTTP status.
    Code,
    /// Canonical status reason (e.g. `Not Found`).
    Status,
    /// Pipeline step that failed.
    Stage,
    /// Offending field path; omitted when not applicable.
    FieldPath,
}

/// The record used to render a failure for an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorShape {
    fields: Vec<(String, ErrorAttr)>,
}

impl ErrorShape {
    /// A shape with no members; add them with [`ErrorShape::field`].
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn field(mut self, name: impl Into<String>, attr: ErrorAttr) -> Self {
        self.fields.push((name.into(), attr));
        self
    }

    pub fn render(&self, error: &ProxyError, step: Step) -> Value {
        let status = error.status();
        let mut body = Map::new();
        for (name, attr) in &self.fields {
            let value = match attr {
                ErrorAttr::Message => Value::from(error.to_string()),
                ErrorAttr::Code => Value::from(status.as_u16()),
                ErrorAttr::Status => {
                    Value::from(status.canonical_reason().unwrap_or("Unknown"))
                }
                ErrorAttr::Stage => Value::from(step.as_str()),
                ErrorAttr::FieldPath => match error.field_path() {
                    Some(path) => Value::from(path),
                    None => continue,
                },
            };
            body.insert(name.clone(), value);
        }
        Value::Object(body)
    }
}

/// `{message, code}`.
impl Default for ErrorShape {
    fn default() -> Self {
        Self::new()
            .field("message", ErrorAttr::Message)
            .field("code", ErrorAttr::Code)
    }
}

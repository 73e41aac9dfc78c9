//! Declarative endpoint and shape definitions.
//!
//! # Example
//! ```toml
//! [shapes.Object]
//! fields = [
//!     { name = "owner", type = "bytes", marker = "hex" },
//!     { name = "version", type = "integer" },
//! ]
//!
//! [[endpoints]]
//! path = "/v1/objects/{id}"
//! query_params = [{ name = "v", field = "version" }]
//! methods.GET = { response = "Object" }
//! ```
//!
//! Shapes may nest through `type = "record"` fields but never recursively.
//! Hooks and custom handlers cannot be declared here; they need code.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use axum::http::Method;
use serde::{Deserialize, Serialize};

use crate::config::schema::ProxyConfig;
use crate::config::validation::ValidationError;
use crate::schema::{
    Endpoint, EndpointFactory, ErrorAttr, ErrorShape, Field, FieldKind, Shape,
};

/// Value type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Bytes,
    Number,
    Integer,
    Bool,
    Record,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: FieldType,

    /// Nested shape name; required for records, rejected otherwise.
    #[serde(default)]
    pub shape: Option<String>,

    #[serde(default)]
    pub repeated: bool,

    #[serde(default)]
    pub required: bool,

    /// Codec marker for scalar fields.
    #[serde(default)]
    pub marker: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ShapeConfig {
    pub fields: Vec<FieldConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MethodConfig {
    /// Request shape; the empty record when omitted.
    #[serde(default)]
    pub request: Option<String>,

    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueryParamConfig {
    pub name: String,

    /// Target request field; the parameter name when omitted.
    #[serde(default)]
    pub field: Option<String>,

    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorFieldConfig {
    pub name: String,
    pub attr: ErrorAttr,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EndpointConfig {
    pub path: String,

    /// Method name (e.g. `GET`) to shapes.
    #[serde(default)]
    pub methods: BTreeMap<String, MethodConfig>,

    #[serde(default)]
    pub literal_params: Vec<String>,

    #[serde(default)]
    pub query_params: Vec<QueryParamConfig>,

    /// Error body members; `{message, code}` when omitted.
    #[serde(default)]
    pub error_shape: Option<Vec<ErrorFieldConfig>>,
}

/// [`EndpointFactory`] over the `shapes` and `endpoints` config tables.
#[derive(Debug, Clone, Default)]
pub struct ConfigEndpointFactory {
    shapes: BTreeMap<String, ShapeConfig>,
    endpoints: Vec<EndpointConfig>,
}

impl ConfigEndpointFactory {
    pub fn new(shapes: BTreeMap<String, ShapeConfig>, endpoints: Vec<EndpointConfig>) -> Self {
        Self { shapes, endpoints }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(config.shapes.clone(), config.endpoints.clone())
    }

    fn build_endpoint(
        &self,
        config: &EndpointConfig,
        resolver: &mut ShapeResolver<'_>,
    ) -> Result<Endpoint, ValidationError> {
        let mut builder = Endpoint::builder(config.path.as_str());

        for (name, method) in &config.methods {
            let parsed = Method::from_bytes(name.to_ascii_uppercase().as_bytes()).map_err(|_| {
                ValidationError::InvalidMethod {
                    path: config.path.clone(),
                    method: name.clone(),
                }
            })?;
            let request = match &method.request {
                Some(shape) => resolver.resolve(shape)?,
                None => Arc::new(Shape::empty()),
            };
            let response = resolver.resolve(&method.response)?;
            builder = builder.method(parsed, request, response);
        }

        for param in &config.literal_params {
            builder = builder.literal_param(param.as_str());
        }

        for query in &config.query_params {
            let field = query.field.as_deref().unwrap_or(&query.name);
            builder = match &query.default {
                Some(default) => {
                    builder.query_with_default(query.name.as_str(), field, default.as_str())
                }
                None => builder.query(query.name.as_str(), field),
            };
        }

        if let Some(members) = &config.error_shape {
            let shape = members
                .iter()
                .fold(ErrorShape::new(), |shape, m| shape.field(m.name.as_str(), m.attr));
            builder = builder.error_shape(shape);
        }

        builder.build()
    }
}

impl EndpointFactory for ConfigEndpointFactory {
    fn endpoints(&self) -> Result<Vec<Endpoint>, Vec<ValidationError>> {
        let mut resolver = ShapeResolver {
            configs: &self.shapes,
            resolved: HashMap::new(),
            visiting: Vec::new(),
        };

        let mut endpoints = Vec::new();
        let mut errors = Vec::new();
        for config in &self.endpoints {
            match self.build_endpoint(config, &mut resolver) {
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

/// Builds named shapes once and shares them between endpoints.
struct ShapeResolver<'a> {
    configs: &'a BTreeMap<String, ShapeConfig>,
    resolved: HashMap<String, Arc<Shape>>,
    visiting: Vec<String>,
}

impl ShapeResolver<'_> {
    fn resolve(&mut self, name: &str) -> Result<Arc<Shape>, ValidationError> {
        if let Some(shape) = self.resolved.get(name) {
            return Ok(shape.clone());
        }
        if self.visiting.iter().any(|n| n == name) {
            return Err(ValidationError::RecursiveShape(name.to_string()));
        }
        let config = self
            .configs
            .get(name)
            .ok_or_else(|| ValidationError::UnknownShape(name.to_string()))?;

        self.visiting.push(name.to_string());
        let built = self.build(name, config);
        self.visiting.pop();

        let shape = Arc::new(built?);
        self.resolved.insert(name.to_string(), shape.clone());
        Ok(shape)
    }

    fn build(&mut self, name: &str, config: &ShapeConfig) -> Result<Shape, ValidationError> {
        let invalid = |field: &FieldConfig, reason: &str| ValidationError::InvalidField {
            shape: name.to_string(),
            field: field.name.clone(),
            reason: reason.to_string(),
        };

        let mut seen = HashSet::new();
        let mut shape = Shape::new(name);
        for fc in &config.fields {
            if !seen.insert(fc.name.as_str()) {
                return Err(invalid(fc, "declared twice"));
            }
            let kind = match (fc.kind, fc.shape.as_deref()) {
                (FieldType::Record, Some(inner)) => FieldKind::Record(self.resolve(inner)?),
                (FieldType::Record, None) => {
                    return Err(invalid(fc, "record fields need a `shape`"))
                }
                (_, Some(_)) => return Err(invalid(fc, "`shape` is only valid on records")),
                (FieldType::String, None) => FieldKind::String,
                (FieldType::Bytes, None) => FieldKind::Bytes,
                (FieldType::Number, None) => FieldKind::Number,
                (FieldType::Integer, None) => FieldKind::Integer,
                (FieldType::Bool, None) => FieldKind::Bool,
                (FieldType::Any, None) => FieldKind::Any,
            };
            if fc.marker.is_some() && matches!(kind, FieldKind::Record(_)) {
                return Err(invalid(fc, "markers apply to scalar fields only"));
            }

            let mut field = Field::new(fc.name.as_str(), kind);
            if fc.repeated {
                field = field.repeated();
            }
            if fc.required {
                field = field.required();
            }
            if let Some(marker) = &fc.marker {
                field = field.marker(marker.as_str());
            }
            shape = shape.field(field);
        }
        Ok(shape)
    }
}

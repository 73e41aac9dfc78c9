//! Endpoint schema model.
//!
//! One `Endpoint` describes one path template: which methods it serves and
//! how, which path parameters are literal strings, how query parameters bind
//! to request fields, how failures are rendered, and which hooks run.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::config::validation::ValidationError;
use crate::hooks::{CustomHandler, Hook, Hooks, Phase, Stage};
use crate::routing::PathTemplate;
use crate::schema::error_shape::ErrorShape;
use crate::schema::shape::{FieldKind, Shape};

/// How one method is served on an endpoint.
#[derive(Clone)]
pub enum MethodSpec {
    /// The generic pipeline with these request/response shapes.
    Transcode {
        request: Arc<Shape>,
        response: Arc<Shape>,
    },
    /// A handler that owns the whole request lifecycle.
    Custom(Arc<dyn CustomHandler>),
}

impl fmt::Debug for MethodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodSpec::Transcode { request, response } => f
                .debug_struct("Transcode")
                .field("request", &request.name())
                .field("response", &response.name())
                .finish(),
            MethodSpec::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Binding of one query-string parameter to a backend request field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub name: String,
    pub field: String,
    pub default: Option<String>,
}

/// The schema model of a single path template.
pub struct Endpoint {
    template: PathTemplate,
    methods: HashMap<Method, MethodSpec>,
    literal_params: BTreeSet<String>,
    query_params: Vec<QueryParam>,
    error_shape: ErrorShape,
    hooks: Hooks,
}

impl Endpoint {
    pub fn builder(path: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder {
            path: path.into(),
            methods: Vec::new(),
            literal_params: BTreeSet::new(),
            query_params: Vec::new(),
            error_shape: ErrorShape::default(),
            hooks: Vec::new(),
        }
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// How `method` is served, or `None` when it is not.
    pub fn method(&self, method: &Method) -> Option<&MethodSpec> {
        self.methods.get(method)
    }

    /// Served methods, sorted by name.
    pub fn methods(&self) -> Vec<&Method> {
        let mut methods: Vec<&Method> = self.methods.keys().collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods
    }

    pub fn is_literal(&self, param: &str) -> bool {
        self.literal_params.contains(param)
    }

    pub fn query_params(&self) -> &[QueryParam] {
        &self.query_params
    }

    pub fn error_shape(&self) -> &ErrorShape {
        &self.error_shape
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Markers referenced by every transcoded shape of this endpoint.
    pub fn markers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for spec in self.methods.values() {
            if let MethodSpec::Transcode { request, response } = spec {
                out.extend(request.markers());
                out.extend(response.markers());
            }
        }
        out
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("template", &self.template.as_str())
            .field("methods", &self.methods())
            .field("literal_params", &self.literal_params)
            .field("query_params", &self.query_params)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Endpoint`]. All checks run in [`EndpointBuilder::build`].
pub struct EndpointBuilder {
    path: String,
    methods: Vec<(Method, MethodSpec)>,
    literal_params: BTreeSet<String>,
    query_params: Vec<QueryParam>,
    error_shape: ErrorShape,
    hooks: Vec<(Stage, Phase, Arc<dyn Hook>)>,
}

impl EndpointBuilder {
    /// Serve `method` through the pipeline.
    pub fn method(
        mut self,
        method: Method,
        request: impl Into<Arc<Shape>>,
        response: impl Into<Arc<Shape>>,
    ) -> Self {
        self.methods.push((
            method,
            MethodSpec::Transcode {
                request: request.into(),
                response: response.into(),
            },
        ));
        self
    }

    /// Serve GET with an empty request record (query bindings still apply).
    pub fn get(self, response: impl Into<Arc<Shape>>) -> Self {
        self.method(Method::GET, Shape::empty(), response)
    }

    pub fn post(self, request: impl Into<Arc<Shape>>, response: impl Into<Arc<Shape>>) -> Self {
        self.method(Method::POST, request, response)
    }

    pub fn delete(
        self,
        request: impl Into<Arc<Shape>>,
        response: impl Into<Arc<Shape>>,
    ) -> Self {
        self.method(Method::DELETE, request, response)
    }

    /// Serve `method` with a handler that bypasses the pipeline.
    pub fn custom(mut self, method: Method, handler: Arc<dyn CustomHandler>) -> Self {
        self.methods.push((method, MethodSpec::Custom(handler)));
        self
    }

    /// Exempt a path parameter from the path-parameter codec.
    pub fn literal_param(mut self, name: impl Into<String>) -> Self {
        self.literal_params.insert(name.into());
        self
    }

    /// Bind query parameter `name` to request field `field`.
    pub fn query(mut self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.query_params.push(QueryParam {
            name: name.into(),
            field: field.into(),
            default: None,
        });
        self
    }

    /// Bind a query parameter with a value used when it is absent.
    pub fn query_with_default(
        mut self,
        name: impl Into<String>,
        field: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        self.query_params.push(QueryParam {
            name: name.into(),
            field: field.into(),
            default: Some(default.into()),
        });
        self
    }

    pub fn error_shape(mut self, shape: ErrorShape) -> Self {
        self.error_shape = shape;
        self
    }

    pub fn hook(mut self, stage: Stage, phase: Phase, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push((stage, phase, hook));
        self
    }

    pub fn build(self) -> Result<Endpoint, ValidationError> {
        let template = PathTemplate::parse(&self.path)?;

        let mut methods = HashMap::new();
        for (method, spec) in self.methods {
            if methods.contains_key(&method) {
                return Err(ValidationError::DuplicateMethod {
                    path: self.path,
                    method: method.to_string(),
                });
            }
            methods.insert(method, spec);
        }

        if let Some(param) = self
            .literal_params
            .iter()
            .find(|p| !template.params().any(|name| name == p.as_str()))
        {
            return Err(ValidationError::UnknownLiteralParam {
                path: self.path.clone(),
                param: param.clone(),
            });
        }

        for binding in &self.query_params {
            for spec in methods.values() {
                let MethodSpec::Transcode { request, .. } = spec else {
                    continue;
                };
                // Fields the shape does not declare are bound as strings.
                let Some(field) = request.get(&binding.field) else {
                    continue;
                };
                if matches!(field.kind, FieldKind::Record(_)) {
                    return Err(ValidationError::InvalidQueryBinding {
                        path: self.path.clone(),
                        param: binding.name.clone(),
                        reason: format!("record field `{}`", field.name),
                    });
                }
                if let Some(default) = &binding.default {
                    if let Err(reason) = field.parse_query_value(default) {
                        return Err(ValidationError::InvalidQueryBinding {
                            path: self.path.clone(),
                            param: binding.name.clone(),
                            reason: format!("field `{}` with a bad default: {}", field.name, reason),
                        });
                    }
                }
            }
        }

        let mut hooks = Hooks::default();
        for (stage, phase, hook) in self.hooks {
            hooks.bind(stage, phase, hook).map_err(|(stage, phase)| {
                ValidationError::DuplicateHook {
                    path: self.path.clone(),
                    stage: stage.as_str(),
                    phase: phase.as_str(),
                }
            })?;
        }

        Ok(Endpoint {
            template,
            methods,
            literal_params: self.literal_params,
            query_params: self.query_params,
            error_shape: self.error_shape,
            hooks,
        })
    }
}

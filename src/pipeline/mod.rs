//! Request/response transcoding pipeline.
//!
//! # Data Flow
//! ```text
//! ROUTE ─▶ BIND_PARAMS ─▶ DESERIALIZE_REQUEST ─▶ ENCODE_FIELDS(outbound)
//!                                                         │
//!     ┌───────────────────────────────────────────────────┘
//!     ▼
//! FORWARD ─▶ DECODE_FIELDS(inbound) ─▶ SERIALIZE_RESPONSE ─▶ DONE
//!
//! any step ──error──▶ error shape of the endpoint (default when unrouted)
//! custom handler ──▶ owns everything after ROUTE
//! ```
//!
//! # Design Decisions
//! - Strictly sequential per request; requests share only immutable state
//! - Every failure short-circuits to error rendering; nothing is retried
//! - The whole request runs under one deadline; dropping the future
//!   (deadline or client disconnect) cancels the backend call
//! - Responses are fully buffered, so a cancelled request never writes a
//!   partial body

pub mod backend;
pub mod error;

pub use backend::{BackendClient, BackendRequest, BackendResponse};
pub use error::ProxyError;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};
use tokio::time::timeout;

use crate::codec::{CodecError, CodecRegistry, Direction};
use crate::config::schema::ProxyConfig;
use crate::config::validation::ValidationError;
use crate::hooks::{HandlerContext, HookContext, Payload, Phase, Stage};
use crate::http::request::request_id;
use crate::http::response::error_response;
use crate::observability::metrics;
use crate::pipeline::backend::upstream_message;
use crate::routing::{EndpointRegistry, PathParams};
use crate::schema::{Endpoint, ErrorShape, MethodSpec, Shape, UnknownFields};
use crate::transform::{EncodingError, TransformEngine};

/// Steps of the per-request state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Route,
    BindParams,
    DeserializeRequest,
    EncodeFields,
    Forward,
    DecodeFields,
    SerializeResponse,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Route => "route",
            Step::BindParams => "bind_params",
            Step::DeserializeRequest => "deserialize_request",
            Step::EncodeFields => "encode_fields",
            Step::Forward => "forward",
            Step::DecodeFields => "decode_fields",
            Step::SerializeResponse => "serialize_response",
        }
    }
}

/// Tunables the pipeline reads on every request.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Codec for non-literal path parameters; `None` means base64.
    pub path_param_marker: Option<String>,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            path_param_marker: config.backend.path_param_marker.clone(),
            max_body_bytes: config.limits.max_body_bytes,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&ProxyConfig::default())
    }
}

/// Per-request view shared by every step.
struct RequestCx<'a> {
    request_id: &'a str,
    method: &'a Method,
    endpoint: &'a Endpoint,
    params: &'a PathParams,
    query: Option<&'a str>,
}

/// The transcoding pipeline. Cheap to clone; all state is shared.
#[derive(Debug, Clone)]
pub struct Pipeline {
    registry: Arc<EndpointRegistry>,
    engine: TransformEngine,
    backend: BackendClient,
    settings: Arc<PipelineSettings>,
}

impl Pipeline {
    /// Assemble a pipeline, checking every marker against `codecs`.
    pub fn new(
        registry: EndpointRegistry,
        codecs: Arc<CodecRegistry>,
        backend: BackendClient,
        settings: PipelineSettings,
    ) -> Result<Self, Vec<ValidationError>> {
        let mut errors = registry.validate_markers(&codecs).err().unwrap_or_default();
        if let Some(marker) = settings.path_param_marker.as_deref() {
            if let Err(e) = codecs.lookup(marker) {
                if !errors.contains(&e) {
                    errors.push(e);
                }
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            registry: Arc::new(registry),
            engine: TransformEngine::new(codecs),
            backend,
            settings: Arc::new(settings),
        })
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// Serve one request end to end.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let request_id = request_id(&request);
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        tracing::debug!(request_id = %request_id, method = %method, path = %path, "Transcoding request");

        // ROUTE
        let (endpoint, raw_params) = match self.registry.resolve(&path) {
            Ok(found) => found,
            Err(error) => {
                let response = error_response(&ErrorShape::default(), Step::Route, &error, &request_id);
                metrics::record_request(method.as_str(), response.status().as_u16(), "none", start);
                return response;
            }
        };
        let template = endpoint.template().as_str();

        let spec = endpoint.method(&method).ok_or_else(|| ProxyError::MethodNotAllowed {
            method: method.clone(),
            path: template.to_string(),
        });
        let bound = spec.and_then(|spec| Ok((spec, decode_path_params(&raw_params)?)));

        let response = match bound {
            Err(error @ ProxyError::MethodNotAllowed { .. }) => {
                error_response(endpoint.error_shape(), Step::Route, &error, &request_id)
            }
            Err(error) => error_response(endpoint.error_shape(), Step::BindParams, &error, &request_id),
            Ok((MethodSpec::Custom(handler), params)) => {
                tracing::debug!(request_id = %request_id, path = %template, "Custom handler takes over");
                let ctx = HandlerContext {
                    request_id: request_id.clone(),
                    template: template.to_string(),
                    params,
                    backend: self.backend.clone(),
                    engine: self.engine.clone(),
                };
                handler.handle(ctx, request).await
            }
            Ok((
                MethodSpec::Transcode {
                    request: request_shape,
                    response: response_shape,
                },
                params,
            )) => {
                let query = request.uri().query().map(str::to_string);
                let cx = RequestCx {
                    request_id: &request_id,
                    method: &method,
                    endpoint: &endpoint,
                    params: &params,
                    query: query.as_deref(),
                };
                let mut step = Step::BindParams;
                let run = self.transcode(&cx, request_shape, response_shape, request, &mut step);
                let outcome = match timeout(self.settings.request_timeout, run).await {
                    Ok(result) => result,
                    Err(_) => Err(ProxyError::Timeout(self.settings.request_timeout)),
                };
                match outcome {
                    Ok(response) => response,
                    Err(error) => error_response(endpoint.error_shape(), step, &error, &request_id),
                }
            }
        };

        metrics::record_request(method.as_str(), response.status().as_u16(), template, start);
        tracing::debug!(
            request_id = %request_id,
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request complete"
        );
        response
    }

    async fn transcode(
        &self,
        cx: &RequestCx<'_>,
        request_shape: &Shape,
        response_shape: &Shape,
        request: Request<Body>,
        step: &mut Step,
    ) -> Result<Response, ProxyError> {
        *step = Step::BindParams;
        let bound = self.bind_query(cx, request_shape)?;
        let body = axum::body::to_bytes(request.into_body(), self.settings.max_body_bytes)
            .await
            .map_err(|_| ProxyError::PayloadTooLarge(self.settings.max_body_bytes))?;

        *step = Step::DeserializeRequest;
        let mut payload = Payload::Raw(body);
        if self.run_hook(cx, Stage::DeserializeRequest, Phase::Pre, &mut payload).await? {
            payload = Payload::Json(deserialize_request(payload, request_shape, bound)?);
        }
        self.run_hook(cx, Stage::DeserializeRequest, Phase::Post, &mut payload)
            .await?;
        let decoded = payload
            .into_json()
            .map_err(|e| ProxyError::BadRequest(format!("malformed JSON body: {}", e)))?;

        *step = Step::EncodeFields;
        let encoded = self
            .engine
            .transform(&decoded, request_shape, Direction::Outbound)?;
        let backend_path = self.encode_path(cx)?;

        *step = Step::Forward;
        let mut payload = Payload::Json(encoded);
        let mut status = StatusCode::OK;
        if self.run_hook(cx, Stage::Forward, Phase::Pre, &mut payload).await? {
            let outgoing = payload.into_json().map_err(hook_payload_error)?;
            let (reply_status, reply) = self.forward(cx, backend_path, outgoing).await?;
            status = reply_status;
            payload = Payload::Json(reply);
        }
        self.run_hook(cx, Stage::Forward, Phase::Post, &mut payload)
            .await?;
        // Hook-supplied replies are held to the same shape as backend ones.
        let reply = response_shape
            .decode(payload.into_json().map_err(hook_payload_error)?, UnknownFields::Drop)
            .map_err(ProxyError::InvalidReply)?;

        *step = Step::DecodeFields;
        let decoded = self
            .engine
            .transform(&reply, response_shape, Direction::Inbound)?;

        *step = Step::SerializeResponse;
        let mut payload = Payload::Json(decoded);
        let serialize = self
            .run_hook(cx, Stage::SerializeResponse, Phase::Pre, &mut payload)
            .await?;
        payload = match payload {
            Payload::Json(value) => {
                if !serialize {
                    tracing::debug!(
                        request_id = %cx.request_id,
                        "Serialization skipped without raw bytes, writing compact JSON"
                    );
                }
                Payload::Raw(serialize_response(&value)?)
            }
            raw @ Payload::Raw(_) => raw,
        };
        self.run_hook(cx, Stage::SerializeResponse, Phase::Post, &mut payload)
            .await?;
        let body = payload.into_bytes().map_err(hook_payload_error)?;

        Ok((status, [(header::CONTENT_TYPE, "application/json")], body).into_response())
    }

    /// Run the hook bound at (`stage`, `phase`), if any.
    ///
    /// Returns whether the stage's default step should run.
    async fn run_hook(
        &self,
        cx: &RequestCx<'_>,
        stage: Stage,
        phase: Phase,
        payload: &mut Payload,
    ) -> Result<bool, ProxyError> {
        let Some(hook) = cx.endpoint.hooks().get(stage, phase) else {
            return Ok(true);
        };

        let ctx = HookContext {
            request_id: cx.request_id,
            method: cx.method,
            template: cx.endpoint.template().as_str(),
            params: cx.params,
            stage,
            phase,
        };
        let output = hook.call(&ctx, payload).await.map_err(|e| {
            tracing::warn!(
                request_id = %cx.request_id,
                stage = stage.as_str(),
                phase = phase.as_str(),
                error = %e,
                "Hook aborted request"
            );
            ProxyError::Hook(e)
        })?;

        tracing::debug!(
            request_id = %cx.request_id,
            stage = stage.as_str(),
            phase = phase.as_str(),
            run_default = output.run_default,
            "Hook ran"
        );

        if output.run_default {
            if let Some(extra) = output.payload {
                tracing::debug!(
                    request_id = %cx.request_id,
                    bytes = extra.len(),
                    "Hook output ignored, default step runs"
                );
            }
            return Ok(true);
        }
        if let Some(replacement) = output.payload {
            *payload = Payload::Raw(replacement);
        }
        Ok(false)
    }

    /// Collect query-string values bound to request fields.
    fn bind_query(&self, cx: &RequestCx<'_>, shape: &Shape) -> Result<Map<String, Value>, ProxyError> {
        let pairs = match cx.query {
            Some(query) => parse_query(query)?,
            None => Vec::new(),
        };

        let mut bound = Map::new();
        for binding in cx.endpoint.query_params() {
            let mut raws: Vec<&str> = pairs
                .iter()
                .filter(|(k, _)| *k == binding.name)
                .map(|(_, v)| v.as_str())
                .collect();
            if raws.is_empty() {
                match binding.default.as_deref() {
                    Some(default) => raws.push(default),
                    None => continue,
                }
            }

            let value = match shape.get(&binding.field) {
                Some(field) => {
                    let parse = |raw: &str| {
                        field.parse_query_value(raw).map_err(|reason| {
                            ProxyError::BadRequest(format!(
                                "query parameter `{}`: {}",
                                binding.name, reason
                            ))
                        })
                    };
                    if field.repeated {
                        Value::Array(raws.into_iter().map(parse).collect::<Result<_, _>>()?)
                    } else {
                        // last occurrence wins
                        parse(raws[raws.len() - 1])?
                    }
                }
                None => Value::String(raws[raws.len() - 1].to_string()),
            };
            bound.insert(binding.field.clone(), value);
        }
        Ok(bound)
    }

    /// Render the backend path, encoding non-literal parameters.
    fn encode_path(&self, cx: &RequestCx<'_>) -> Result<String, ProxyError> {
        let mut encoded = PathParams::new();
        for (name, value) in cx.params {
            let out = if cx.endpoint.is_literal(name) {
                value.clone()
            } else {
                self.engine.transform_scalar(
                    value,
                    self.settings.path_param_marker.as_deref(),
                    Direction::Outbound,
                    &format!("pathParam.{}", name),
                )?
            };
            encoded.insert(name.clone(), out);
        }
        Ok(cx.endpoint.template().render(&encoded))
    }

    async fn forward(
        &self,
        cx: &RequestCx<'_>,
        path: String,
        outgoing: Value,
    ) -> Result<(StatusCode, Value), ProxyError> {
        let (path_and_query, body) = if carries_body(cx.method) {
            let body = serde_json::to_vec(&outgoing)
                .map_err(|e| ProxyError::Internal(format!("cannot serialize request: {}", e)))?;
            (path, Some(Bytes::from(body)))
        } else {
            let query = encode_query(&outgoing);
            if query.is_empty() {
                (path, None)
            } else {
                (format!("{}?{}", path, query), None)
            }
        };

        tracing::debug!(
            request_id = %cx.request_id,
            backend_path = %path_and_query,
            "Forwarding to backend"
        );

        let reply = self
            .backend
            .send(BackendRequest {
                method: cx.method.clone(),
                path_and_query,
                body,
                request_id: cx.request_id.to_string(),
            })
            .await?;

        if !reply.status.is_success() {
            return Err(ProxyError::Upstream {
                status: reply.status,
                message: upstream_message(reply.status, &reply.body),
            });
        }

        let value = Payload::Raw(reply.body)
            .into_json()
            .map_err(|e| ProxyError::Upstream {
                status: StatusCode::BAD_GATEWAY,
                message: format!("malformed JSON from backend: {}", e),
            })?;
        Ok((reply.status, value))
    }
}

fn deserialize_request(
    payload: Payload,
    shape: &Shape,
    bound: Map<String, Value>,
) -> Result<Value, ProxyError> {
    let mut value = payload
        .into_json()
        .map_err(|e| ProxyError::BadRequest(format!("malformed JSON body: {}", e)))?;
    if value.is_null() {
        value = Value::Object(Map::new());
    }

    // Bindings to undeclared fields bypass the shape and go out as strings.
    let (declared, undeclared): (Map<String, Value>, Map<String, Value>) =
        bound.into_iter().partition(|(name, _)| shape.get(name).is_some());
    if let Value::Object(members) = &mut value {
        members.extend(declared);
    }
    let mut decoded = shape
        .decode(value, UnknownFields::Reject)
        .map_err(ProxyError::InvalidRequest)?;
    if let Value::Object(members) = &mut decoded {
        members.extend(undeclared);
    }
    Ok(decoded)
}

fn serialize_response(value: &Value) -> Result<Bytes, ProxyError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| ProxyError::Internal(format!("cannot serialize response: {}", e)))
}

/// Percent-decode the values bound by the matched template.
fn decode_path_params(raw: &PathParams) -> Result<PathParams, ProxyError> {
    raw.iter()
        .map(|(name, value)| {
            let decoded = urlencoding::decode(value).map_err(|e| EncodingError {
                field_path: format!("pathParam.{}", name),
                direction: Direction::Outbound,
                source: CodecError::Invalid(format!("not UTF-8 once percent-decoded: {}", e)),
            })?;
            Ok((name.clone(), decoded.into_owned()))
        })
        .collect()
}

/// Split an `application/x-www-form-urlencoded` query, rejecting
/// components that do not decode to UTF-8.
fn parse_query(query: &str) -> Result<Vec<(String, String)>, ProxyError> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Ok((decode_query_component(key)?, decode_query_component(value)?))
        })
        .collect()
}

fn decode_query_component(raw: &str) -> Result<String, ProxyError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| {
            ProxyError::BadRequest(format!(
                "query component `{}` is not UTF-8 once percent-decoded",
                raw
            ))
        })
}

fn hook_payload_error(e: serde_json::Error) -> ProxyError {
    ProxyError::Internal(format!("hook produced invalid JSON: {}", e))
}

fn carries_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD)
}

/// Flatten a record into a query string; nested members use dotted names
/// and lists repeat the key.
fn encode_query(value: &Value) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    if let Value::Object(members) = value {
        for (key, member) in members {
            append_query(&mut serializer, key, member);
        }
    }
    serializer.finish()
}

fn append_query(
    serializer: &mut url::form_urlencoded::Serializer<'_, String>,
    key: &str,
    value: &Value,
) {
    match value {
        Value::Null => {}
        Value::String(s) => {
            serializer.append_pair(key, s);
        }
        Value::Array(items) => {
            for item in items {
                append_query(serializer, key, item);
            }
        }
        Value::Object(members) => {
            for (name, member) in members {
                append_query(serializer, &format!("{}.{}", key, name), member);
            }
        }
        other => {
            serializer.append_pair(key, &other.to_string());
        }
    }
}

//! Pipeline extension points.
//!
//! # Hook Protocol
//! ```text
//! pre(DeserializeRequest) → DESERIALIZE_REQUEST → post(DeserializeRequest)
//!     → ENCODE_FIELDS →
//! pre(Forward)            → FORWARD             → post(Forward)
//!     → DECODE_FIELDS →
//! pre(SerializeResponse)  → SERIALIZE_RESPONSE  → post(SerializeResponse)
//! ```
//!
//! Each hook sees the in-flight payload mutably and answers with
//! [`HookOutput`]:
//! - `run_default = true`: the stage's default step runs; a returned
//!   payload is only logged.
//! - `run_default = false` on `Pre`: the default step is skipped and the
//!   returned payload (or the mutated value when none) feeds the next stage.
//! - `run_default = false` on `Post`: the returned payload replaces the
//!   stage result.
//! - A skipped `SerializeResponse` still needs bytes for the client. A
//!   `Raw` payload is written as is; a `Json` value left in place is
//!   written as compact JSON.
//! - Whatever comes out of `Forward`, hook-supplied or not, must match the
//!   response shape before `DECODE_FIELDS` runs.
//! - `Err(HookError)`: the request aborts with the hook's status (500 when
//!   unset).
//!
//! The stage set is closed. Adding a stage is a breaking change.
//!
//! [`CustomHandler`] replaces the whole pipeline for one method.

pub mod handler;

pub use handler::{CustomHandler, HandlerContext};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::routing::PathParams;

/// Pipeline stages hooks can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    DeserializeRequest,
    Forward,
    SerializeResponse,
}

impl Stage {
    pub const ALL: [Stage; 3] = [
        Stage::DeserializeRequest,
        Stage::Forward,
        Stage::SerializeResponse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::DeserializeRequest => "deserialize_request",
            Stage::Forward => "forward",
            Stage::SerializeResponse => "serialize_response",
        }
    }
}

/// Whether a hook runs before or after its stage's default step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pre,
    Post,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Pre => "pre",
            Phase::Post => "post",
        }
    }
}

/// The in-flight value at a hook point.
///
/// `Raw` before request deserialization and after response serialization,
/// `Json` everywhere else.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Raw(Bytes),
    Json(Value),
}

impl Payload {
    /// Decode as JSON; an empty raw body is an empty record.
    pub fn into_json(self) -> Result<Value, serde_json::Error> {
        match self {
            Payload::Json(value) => Ok(value),
            Payload::Raw(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => {
                Ok(Value::Object(Default::default()))
            }
            Payload::Raw(bytes) => serde_json::from_slice(&bytes),
        }
    }

    pub fn into_bytes(self) -> Result<Bytes, serde_json::Error> {
        match self {
            Payload::Raw(bytes) => Ok(bytes),
            Payload::Json(value) => serde_json::to_vec(&value).map(Bytes::from),
        }
    }

    pub fn as_json_mut(&mut self) -> Option<&mut Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Raw(_) => None,
        }
    }
}

/// A hook's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOutput {
    pub run_default: bool,
    pub payload: Option<Bytes>,
}

impl HookOutput {
    /// Let the default step run.
    pub fn proceed() -> Self {
        Self {
            run_default: true,
            payload: None,
        }
    }

    /// Skip the default step and continue with the current value.
    pub fn skip() -> Self {
        Self {
            run_default: false,
            payload: None,
        }
    }

    /// Skip the default step and continue with `payload`.
    pub fn replace(payload: impl Into<Bytes>) -> Self {
        Self {
            run_default: false,
            payload: Some(payload.into()),
        }
    }
}

/// A hook aborted the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HookError {
    pub status: Option<StatusCode>,
    pub message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// What a hook knows about the request it runs for.
#[derive(Debug)]
pub struct HookContext<'a> {
    pub request_id: &'a str,
    pub method: &'a Method,
    pub template: &'a str,
    pub params: &'a PathParams,
    pub stage: Stage,
    pub phase: Phase,
}

/// Endpoint-specific logic run at a fixed pipeline stage.
///
/// Hooks may be invoked again for a retried HTTP request and must not rely
/// on running once.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(
        &self,
        ctx: &HookContext<'_>,
        value: &mut Payload,
    ) -> Result<HookOutput, HookError>;
}

/// Adapter turning a synchronous closure into a [`Hook`].
pub struct FnHook<F>(F);

#[async_trait]
impl<F> Hook for FnHook<F>
where
    F: Fn(&HookContext<'_>, &mut Payload) -> Result<HookOutput, HookError> + Send + Sync,
{
    async fn call(
        &self,
        ctx: &HookContext<'_>,
        value: &mut Payload,
    ) -> Result<HookOutput, HookError> {
        (self.0)(ctx, value)
    }
}

/// Wrap a closure as a shareable hook.
pub fn hook_fn<F>(f: F) -> Arc<dyn Hook>
where
    F: Fn(&HookContext<'_>, &mut Payload) -> Result<HookOutput, HookError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnHook(f))
}

/// Hooks bound to one endpoint, at most one per (stage, phase).
#[derive(Clone, Default)]
pub struct Hooks {
    bound: HashMap<(Stage, Phase), Arc<dyn Hook>>,
}

impl Hooks {
    /// Bind a hook; returns the slot back if it is already taken.
    pub fn bind(
        &mut self,
        stage: Stage,
        phase: Phase,
        hook: Arc<dyn Hook>,
    ) -> Result<(), (Stage, Phase)> {
        if self.bound.contains_key(&(stage, phase)) {
            return Err((stage, phase));
        }
        self.bound.insert((stage, phase), hook);
        Ok(())
    }

    pub fn get(&self, stage: Stage, phase: Phase) -> Option<&Arc<dyn Hook>> {
        self.bound.get(&(stage, phase))
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut slots: Vec<String> = self
            .bound
            .keys()
            .map(|(stage, phase)| format!("{}:{}", phase.as_str(), stage.as_str()))
            .collect();
        slots.sort();
        f.debug_list().entries(slots).finish()
    }
}

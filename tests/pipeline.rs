//! End-to-end pipeline tests against a mock gateway.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tower::ServiceExt;

use transcoding_proxy::hooks::{
    hook_fn, CustomHandler, HandlerContext, Hook, HookContext, HookError, HookOutput, Payload,
    Phase, Stage,
};
use transcoding_proxy::schema::{Endpoint, ErrorAttr, ErrorShape, Field, Shape};

mod common;
use common::{call, config_for, proxy, send, MockBackend};

fn item_shape() -> Shape {
    Shape::new("Item")
        .field(Field::bytes("a").marker("hex"))
        .field(Field::string("b"))
}

#[tokio::test]
async fn test_hex_path_param_and_response_field() {
    let backend = MockBackend::fixed(200, r#"{"a":"AQIDBA==","b":"345678"}"#).await;
    let endpoints = || vec![Endpoint::builder("/v1/item/{id}").get(item_shape())];
    let router = proxy(config_for(&backend), &endpoints);

    let (status, body) = send(&router, Method::GET, "/v1/item/0xabcd", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"a": "0x01020304", "b": "345678"}));
    let seen = backend.last();
    assert_eq!(seen.method, Method::GET);
    assert_eq!(seen.path_and_query, "/v1/item/q80%3D");
}

#[tokio::test]
async fn test_query_binding() {
    let backend = MockBackend::fixed(200, r#"{"a":"AQIDBA==","b":"x"}"#).await;
    let endpoints = || {
        vec![Endpoint::builder("/v1/item/{id}")
            .get(item_shape())
            .query("nonce", "nonce")]
    };
    let router = proxy(config_for(&backend), &endpoints);

    let (status, _) = send(&router, Method::GET, "/v1/item/0xabcd?nonce=123456", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(backend.last().path_and_query, "/v1/item/q80%3D?nonce=123456");

    let (status, _) = send(&router, Method::GET, "/v1/item/0xabcd", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(backend.last().path_and_query, "/v1/item/q80%3D");
}

#[tokio::test]
async fn test_typed_query_binding() {
    let backend = MockBackend::fixed(200, "{}").await;
    let endpoints = || {
        vec![Endpoint::builder("/v1/items")
            .method(
                Method::GET,
                Shape::new("ListItems").field(Field::integer("limit")),
                Shape::empty(),
            )
            .query_with_default("limit", "limit", "10")]
    };
    let router = proxy(config_for(&backend), &endpoints);

    let (status, _) = send(&router, Method::GET, "/v1/items?limit=25", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(backend.last().path_and_query, "/v1/items?limit=25");

    let (status, _) = send(&router, Method::GET, "/v1/items", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(backend.last().path_and_query, "/v1/items?limit=10");

    let (status, body) = send(&router, Method::GET, "/v1/items?limit=ten", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert_eq!(backend.requests().len(), 2);
}

#[tokio::test]
async fn test_unknown_path_uses_default_error_shape() {
    let backend = MockBackend::fixed(200, "{}").await;
    let endpoints = || vec![Endpoint::builder("/v1/item/{id}").get(item_shape())];
    let router = proxy(config_for(&backend), &endpoints);

    let (status, body) = send(&router, Method::GET, "/v1/unknown", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let members = body.as_object().unwrap();
    assert_eq!(members.len(), 2);
    assert!(members["message"].as_str().unwrap().contains("/v1/unknown"));
    assert_eq!(members["code"], 404);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_method_not_allowed() {
    let backend = MockBackend::fixed(200, "{}").await;
    let endpoints = || vec![Endpoint::builder("/v1/item/{id}").get(item_shape())];
    let router = proxy(config_for(&backend), &endpoints);

    let (status, body) = send(&router, Method::POST, "/v1/item/0xab", Some("{}")).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["code"], 405);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_pre_serialize_hook_truncates_field() {
    // 0x0102030405060708
    let backend = MockBackend::fixed(200, r#"{"a":"AQIDBAUGBwg=","b":"x"}"#).await;
    let endpoints = || {
        let truncate = hook_fn(|_, value| {
            if let Some(a) = value.as_json_mut().and_then(|v| v.get_mut("a")) {
                let first_four = a.as_str().map(|s| s.chars().take(10).collect::<String>());
                if let Some(cut) = first_four {
                    *a = json!(cut);
                }
            }
            Ok(HookOutput::proceed())
        });
        vec![Endpoint::builder("/v1/item/{id}")
            .get(item_shape())
            .hook(Stage::SerializeResponse, Phase::Pre, truncate)]
    };
    let router = proxy(config_for(&backend), &endpoints);

    let (status, body) = send(&router, Method::GET, "/v1/item/0xab", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"a": "0x01020304", "b": "x"}));
}

#[tokio::test]
async fn test_malformed_hex_path_param() {
    let backend = MockBackend::fixed(200, "{}").await;
    let endpoints = || {
        vec![Endpoint::builder("/v1/item/{id}")
            .get(item_shape())
            .error_shape(
                ErrorShape::new()
                    .field("error", ErrorAttr::Message)
                    .field("code", ErrorAttr::Code)
                    .field("fieldPath", ErrorAttr::FieldPath)
                    .field("stage", ErrorAttr::Stage),
            )]
    };
    let router = proxy(config_for(&backend), &endpoints);

    let (status, body) = send(&router, Method::GET, "/v1/item/0xzz", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fieldPath"], "pathParam.id");
    assert_eq!(body["stage"], "encode_fields");
    assert_eq!(body["code"], 400);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_literal_param_passes_through() {
    let backend = MockBackend::fixed(200, "{}").await;
    let endpoints = || {
        vec![Endpoint::builder("/v1/accounts/{name}/balance")
            .get(Shape::empty())
            .literal_param("name")]
    };
    let router = proxy(config_for(&backend), &endpoints);

    let (status, _) = send(&router, Method::GET, "/v1/accounts/alice/balance", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(backend.last().path_and_query, "/v1/accounts/alice/balance");
}

#[tokio::test]
async fn test_post_body_fields_encoded() {
    let backend = MockBackend::fixed(200, r#"{"digest":"q80=","unknown":true}"#).await;
    let endpoints = || {
        let request = Shape::new("Submit")
            .field(Field::bytes("payload").marker("hex").required())
            .field(Field::string("memo"));
        let response = Shape::new("Submitted").field(Field::bytes("digest").marker("hex"));
        vec![Endpoint::builder("/v1/submit").post(request, response)]
    };
    let router = proxy(config_for(&backend), &endpoints);

    let (status, body) = send(
        &router,
        Method::POST,
        "/v1/submit",
        Some(r#"{"payload":"0x01020304","memo":"hi"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    // unknown reply members are dropped
    assert_eq!(body, json!({"digest": "0xabcd"}));
    assert_eq!(backend.last().json(), json!({"payload": "AQIDBA==", "memo": "hi"}));

    let (status, body) = send(&router, Method::POST, "/v1/submit", Some(r#"{"memo":"hi"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("payload"));

    let (status, _) = send(
        &router,
        Method::POST,
        "/v1/submit",
        Some(r#"{"payload":"0x01","extra":1}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&router, Method::POST, "/v1/submit", Some("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn test_pre_deserialize_hook_short_circuits() {
    let backend = MockBackend::fixed(200, "{}").await;
    let endpoints = || {
        let replace = hook_fn(|_, _| Ok(HookOutput::replace(Bytes::from_static(br#"{"name":"hooked"}"#))));
        vec![Endpoint::builder("/v1/echo")
            .post(Shape::new("Echo").field(Field::string("name")), Shape::empty())
            .hook(Stage::DeserializeRequest, Phase::Pre, replace)]
    };
    let router = proxy(config_for(&backend), &endpoints);

    // the body would fail deserialization; the hook skips it
    let (status, _) = send(&router, Method::POST, "/v1/echo", Some("not json")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(backend.last().json(), json!({"name": "hooked"}));
}

#[tokio::test]
async fn test_forward_hook_answers_without_backend() {
    let backend = MockBackend::fixed(500, "{}").await;
    let endpoints = || {
        let cached = hook_fn(|_, _| Ok(HookOutput::replace(Bytes::from_static(br#"{"a":"AQIDBA=="}"#))));
        vec![Endpoint::builder("/v1/item/{id}")
            .get(item_shape())
            .hook(Stage::Forward, Phase::Pre, cached)]
    };
    let router = proxy(config_for(&backend), &endpoints);

    let (status, body) = send(&router, Method::GET, "/v1/item/0xab", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"a": "0x01020304"}));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_post_forward_hook_replaces_reply() {
    let backend = MockBackend::fixed(200, r#"{"a":"AQIDBA==","b":"x"}"#).await;
    let endpoints = || {
        let rewrite = hook_fn(|_, _| Ok(HookOutput::replace(Bytes::from_static(br#"{"b":"rewritten"}"#))));
        vec![Endpoint::builder("/v1/item/{id}")
            .get(item_shape())
            .hook(Stage::Forward, Phase::Post, rewrite)]
    };
    let router = proxy(config_for(&backend), &endpoints);

    let (status, body) = send(&router, Method::GET, "/v1/item/0xab", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"b": "rewritten"}));
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn test_hook_error_aborts_request() {
    let backend = MockBackend::fixed(200, "{}").await;
    let endpoints = || {
        let deny = hook_fn(|ctx, _| {
            if ctx.params.get("id").map(String::as_str) == Some("0x00") {
                Err(HookError::with_status(StatusCode::FORBIDDEN, "zero id is reserved"))
            } else {
                Err(HookError::new("hook failed"))
            }
        });
        vec![Endpoint::builder("/v1/item/{id}")
            .get(item_shape())
            .hook(Stage::Forward, Phase::Pre, deny)]
    };
    let router = proxy(config_for(&backend), &endpoints);

    let (status, body) = send(&router, Method::GET, "/v1/item/0x00", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "zero id is reserved");

    let (status, _) = send(&router, Method::GET, "/v1/item/0x01", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(backend.requests().is_empty());
}

struct Describe {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl CustomHandler for Describe {
    async fn handle(&self, ctx: HandlerContext, request: Request<Body>) -> Response {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Json(json!({
            "template": ctx.template,
            "id": ctx.params.get("id"),
            "method": request.method().as_str(),
        }))
        .into_response()
    }
}

#[tokio::test]
async fn test_custom_handler_owns_request() {
    let backend = MockBackend::fixed(200, r#"{"a":"AQIDBA=="}"#).await;
    let calls = Arc::new(AtomicU32::new(0));
    let handler_calls = calls.clone();
    let endpoints = move || {
        vec![Endpoint::builder("/v1/item/{id}")
            .get(item_shape())
            .custom(
                Method::PUT,
                Arc::new(Describe {
                    calls: handler_calls.clone(),
                }),
            )]
    };
    let router = proxy(config_for(&backend), &endpoints);

    let (status, body) = send(&router, Method::PUT, "/v1/item/0xzz", Some("{}")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"template": "/v1/item/{id}", "id": "0xzz", "method": "PUT"})
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(backend.requests().is_empty());

    // other methods still use the pipeline
    let (status, _) = send(&router, Method::GET, "/v1/item/0xab", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_upstream_error_passes_status_through() {
    let backend = MockBackend::fixed(404, r#"{"code":5,"message":"object 0xab not found"}"#).await;
    let endpoints = || vec![Endpoint::builder("/v1/item/{id}").get(item_shape())];
    let router = proxy(config_for(&backend), &endpoints);

    let (status, body) = send(&router, Method::GET, "/v1/item/0xab", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"message": "object 0xab not found", "code": 404}));
}

#[tokio::test]
async fn test_bad_backend_reply_is_bad_gateway() {
    let backend = MockBackend::fixed(200, r#"{"a":"%%%"}"#).await;
    let endpoints = || vec![Endpoint::builder("/v1/item/{id}").get(item_shape())];
    let router = proxy(config_for(&backend), &endpoints);

    let (status, _) = send(&router, Method::GET, "/v1/item/0xab", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let backend = MockBackend::fixed(200, "<html>").await;
    let router = proxy(config_for(&backend), &endpoints);
    let (status, _) = send(&router, Method::GET, "/v1/item/0xab", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_backend_timeout() {
    let backend = MockBackend::start_delayed(Duration::from_secs(3), |_| (200, "{}".into())).await;
    let endpoints = || vec![Endpoint::builder("/v1/slow").get(Shape::empty())];
    let mut config = config_for(&backend);
    config.timeouts.backend_secs = 1;
    let router = proxy(config, &endpoints);

    let (status, body) = send(&router, Method::GET, "/v1/slow", None).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], 504);
}

#[tokio::test]
async fn test_body_limit() {
    let backend = MockBackend::fixed(200, "{}").await;
    let endpoints = || {
        vec![Endpoint::builder("/v1/echo")
            .post(Shape::new("Echo").field(Field::string("name")), Shape::empty())]
    };
    let mut config = config_for(&backend);
    config.limits.max_body_bytes = 16;
    let router = proxy(config, &endpoints);

    let body = format!(r#"{{"name":"{}"}}"#, "x".repeat(64));
    let (status, _) = send(&router, Method::POST, "/v1/echo", Some(&body)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_request_id_propagation() {
    let backend = MockBackend::fixed(200, "{}").await;
    let endpoints = || vec![Endpoint::builder("/v1/status").get(Shape::empty())];
    let router = proxy(config_for(&backend), &endpoints);

    let request = Request::builder()
        .uri("/v1/status")
        .header("x-request-id", "trace-42")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-42");
    assert_eq!(backend.last().request_id.as_deref(), Some("trace-42"));

    // generated when absent
    let response = call(&router, Method::GET, "/v1/status", None).await;
    let generated = response.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&generated).is_ok());
    assert_eq!(backend.last().request_id, Some(generated));
}

fn diagnostic_errors() -> ErrorShape {
    ErrorShape::new()
        .field("error", ErrorAttr::Message)
        .field("code", ErrorAttr::Code)
        .field("fieldPath", ErrorAttr::FieldPath)
        .field("stage", ErrorAttr::Stage)
}

#[tokio::test]
async fn test_forward_hook_reply_held_to_response_shape() {
    let backend = MockBackend::fixed(200, r#"{"coins":["AQ=="]}"#).await;
    let endpoints = || {
        let coins = || Shape::new("Coins").field(Field::bytes("coins").marker("hex").repeated());
        let scalar = hook_fn(|_, _| Ok(HookOutput::replace(Bytes::from_static(br#"{"coins":"AQIDBA=="}"#))));
        let listed = hook_fn(|_, _| Ok(HookOutput::replace(Bytes::from_static(br#"{"coins":["AQIDBA=="]}"#))));
        vec![
            Endpoint::builder("/v1/coins/scalar")
                .get(coins())
                .error_shape(diagnostic_errors())
                .hook(Stage::Forward, Phase::Post, scalar),
            Endpoint::builder("/v1/coins/listed")
                .get(coins())
                .hook(Stage::Forward, Phase::Post, listed),
        ]
    };
    let router = proxy(config_for(&backend), &endpoints);

    let (status, body) = send(&router, Method::GET, "/v1/coins/scalar", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["fieldPath"], "coins");
    assert_eq!(body["stage"], "forward");

    let (status, body) = send(&router, Method::GET, "/v1/coins/listed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"coins": ["0x01020304"]}));
}

#[tokio::test]
async fn test_base64_path_params() {
    let backend = MockBackend::fixed(200, "{}").await;
    let endpoints = || {
        vec![Endpoint::builder("/v1/item/{id}")
            .get(Shape::empty())
            .error_shape(diagnostic_errors())]
    };
    let mut config = config_for(&backend);
    config.backend.path_param_marker = None;
    let router = proxy(config, &endpoints);

    let (status, _) = send(&router, Method::GET, "/v1/item/q80%3D", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(backend.last().path_and_query, "/v1/item/q80%3D");

    // hex is not base64
    let (status, body) = send(&router, Method::GET, "/v1/item/0xabcd", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fieldPath"], "pathParam.id");
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn test_undecodable_path_param_is_bad_request() {
    let backend = MockBackend::fixed(200, "{}").await;
    let endpoints = || {
        vec![Endpoint::builder("/v1/acct/{name}")
            .get(Shape::empty())
            .literal_param("name")
            .error_shape(diagnostic_errors())]
    };
    let router = proxy(config_for(&backend), &endpoints);

    let (status, body) = send(&router, Method::GET, "/v1/acct/%FF", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fieldPath"], "pathParam.name");
    assert_eq!(body["stage"], "bind_params");
    assert!(backend.requests().is_empty());

    let (status, _) = send(&router, Method::GET, "/v1/acct/al%20ice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(backend.last().path_and_query, "/v1/acct/al%20ice");
}

#[tokio::test]
async fn test_undecodable_query_value_is_bad_request() {
    let backend = MockBackend::fixed(200, "{}").await;
    let endpoints = || {
        vec![Endpoint::builder("/v1/item/{id}")
            .get(item_shape())
            .query("nonce", "nonce")]
    };
    let router = proxy(config_for(&backend), &endpoints);

    let (status, body) = send(&router, Method::GET, "/v1/item/0xab?nonce=%FF", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert!(backend.requests().is_empty());
}

struct Stall(Duration);

#[async_trait]
impl Hook for Stall {
    async fn call(
        &self,
        _ctx: &HookContext<'_>,
        _value: &mut Payload,
    ) -> Result<HookOutput, HookError> {
        tokio::time::sleep(self.0).await;
        Ok(HookOutput::proceed())
    }
}

#[tokio::test]
async fn test_request_deadline_covers_hooks() {
    let backend = MockBackend::fixed(200, "{}").await;
    let endpoints = || {
        vec![Endpoint::builder("/v1/slow")
            .get(Shape::empty())
            .error_shape(diagnostic_errors())
            .hook(Stage::Forward, Phase::Pre, Arc::new(Stall(Duration::from_secs(3))))]
    };
    let mut config = config_for(&backend);
    config.timeouts.request_secs = 1;
    let router = proxy(config, &endpoints);

    let (status, body) = send(&router, Method::GET, "/v1/slow", None).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["stage"], "forward");
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_pre_forward_skip_continues_with_mutated_value() {
    let backend = MockBackend::fixed(500, "{}").await;
    let endpoints = || {
        let answer = hook_fn(|_, value| {
            *value = Payload::Json(json!({"a": "AQIDBA==", "b": "local"}));
            Ok(HookOutput::skip())
        });
        vec![Endpoint::builder("/v1/item/{id}")
            .get(item_shape())
            .hook(Stage::Forward, Phase::Pre, answer)]
    };
    let router = proxy(config_for(&backend), &endpoints);

    let (status, body) = send(&router, Method::GET, "/v1/item/0xab", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"a": "0x01020304", "b": "local"}));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_post_deserialize_hook_replaces_request() {
    let backend = MockBackend::fixed(200, "{}").await;
    let endpoints = || {
        let pin = hook_fn(|_, _| Ok(HookOutput::replace(Bytes::from_static(br#"{"payload":"0x0a0b"}"#))));
        vec![Endpoint::builder("/v1/submit")
            .post(
                Shape::new("Submit").field(Field::bytes("payload").marker("hex")),
                Shape::empty(),
            )
            .hook(Stage::DeserializeRequest, Phase::Post, pin)]
    };
    let router = proxy(config_for(&backend), &endpoints);

    let (status, _) = send(
        &router,
        Method::POST,
        "/v1/submit",
        Some(r#"{"payload":"0x01"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(backend.last().json(), json!({"payload": "Cgs="}));
}

#[tokio::test]
async fn test_serialize_hooks() {
    let backend = MockBackend::fixed(200, r#"{"a":"AQIDBA==","b":"x"}"#).await;
    let endpoints = || {
        let patch = hook_fn(|_, value| {
            if let Some(v) = value.as_json_mut() {
                v["b"] = json!("patched");
            }
            Ok(HookOutput::skip())
        });
        let wrap = hook_fn(|_, _| Ok(HookOutput::replace(Bytes::from_static(br#"{"wrapped":true}"#))));
        vec![
            Endpoint::builder("/v1/item/{id}")
                .get(item_shape())
                .hook(Stage::SerializeResponse, Phase::Pre, patch),
            Endpoint::builder("/v1/wrapped/{id}")
                .get(item_shape())
                .hook(Stage::SerializeResponse, Phase::Post, wrap),
        ]
    };
    let router = proxy(config_for(&backend), &endpoints);

    // a skipped serialization still writes the mutated value
    let (status, body) = send(&router, Method::GET, "/v1/item/0xab", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"a": "0x01020304", "b": "patched"}));

    let (status, body) = send(&router, Method::GET, "/v1/wrapped/0xab", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"wrapped": true}));
}

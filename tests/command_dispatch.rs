//! End-to-end command dispatch through a live gateway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use command_gateway::admission::{InflightCounter, LoadSignal};
use command_gateway::command::{DispatchSettings, Dispatcher};
use command_gateway::config::GatewayConfig;
use command_gateway::GatewayError;
use serde_json::{json, Value};

mod common;

use common::{client, spawn_gateway, ScriptedEngine};

async fn gateway() -> (common::TestGateway, Arc<ScriptedEngine>) {
    let engine = ScriptedEngine::new();
    let gateway = spawn_gateway(GatewayConfig::default(), engine.clone()).await;
    (gateway, engine)
}

async fn error_body(res: reqwest::Response) -> Value {
    res.json().await.expect("error body is JSON")
}

#[tokio::test]
async fn test_verb_follows_descriptor() {
    let (gw, engine) = gateway().await;
    let client = client();

    let res = client.get(gw.url("/api/get")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "application/json");

    let res = client.post(gw.url("/api/get")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = error_body(res).await;
    assert_eq!(body["code"], 1);
    assert!(body["message"].as_str().unwrap().contains("GET"));

    let res = client.get(gw.url("/api/create")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client.put(gw.url("/api/set")).body(r#"{"a":1}"#).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("content-type").is_none());
    let call = engine.last_call();
    assert_eq!(call.command, "set");
    assert_eq!(call.input, br#"{"a":1}"#);
    assert_eq!(call.input_format, "json");
}

#[tokio::test]
async fn test_unknown_and_invalid_commands() {
    let (gw, engine) = gateway().await;
    let client = client();

    let res = client.get(gw.url("/api/nonexistent")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(error_body(res).await["message"].as_str().unwrap().contains("nonexistent"));

    let res = client.get(gw.url("/api/Bad-Name")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_parameter_precedence() {
    let (gw, _engine) = gateway().await;

    let res = client()
        .get(gw.url("/api/get?a=1&b=1"))
        .header("X-YT-Parameters", r#"{"b":2,"c":{"d":3}}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let params: Value = res.json().await.unwrap();
    assert_eq!(params, json!({"a": "1", "b": 2, "c": {"d": 3}}));
}

#[tokio::test]
async fn test_post_body_carries_parameters() {
    let (gw, engine) = gateway().await;

    let res = client()
        .post(gw.url("/api/create?path=//home&type=map_node"))
        .body(r#"{"path":"//tmp"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        engine.last_call().parameters,
        json!({"path": "//tmp", "type": "map_node"})
    );

    let res = client()
        .post(gw.url("/api/create"))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_parameters_header() {
    let (gw, _engine) = gateway().await;

    let res = client()
        .get(gw.url("/api/get"))
        .header("X-YT-Parameters", "[1, 2]")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = error_body(res).await;
    assert!(!body["inner_errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_output_format_from_accept() {
    let (gw, engine) = gateway().await;
    let client = client();

    let res = client
        .get(gw.url("/api/read"))
        .header("Accept", "text/tab-separated-values")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/tab-separated-values");
    assert_eq!(engine.last_call().output_format, "dsv");

    let res = client.get(gw.url("/api/read")).send().await.unwrap();
    assert_eq!(res.headers()["content-type"], "application/x-yt-yson-text");
    assert_eq!(engine.last_call().output_format, "yson");

    let res = client
        .get(gw.url("/api/read"))
        .header("Accept", "image/png")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_output_format_override() {
    let (gw, engine) = gateway().await;
    let client = client();

    let res = client
        .get(gw.url("/api/read"))
        .header("X-YT-Output-Format", r#"{"$value":"dsv","$attributes":{"enable_escaping":true}}"#)
        .header("Accept", "application/json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("content-type").is_none());
    assert_eq!(engine.last_call().output_format, "dsv");

    let res = client
        .get(gw.url("/api/read"))
        .header("X-YT-Output-Format", r#""uberzoldaten""#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(error_body(res).await["message"]
        .as_str()
        .unwrap()
        .contains("uberzoldaten"));
}

#[tokio::test]
async fn test_discovery_lists_descriptors() {
    let (gw, _engine) = gateway().await;
    let client = client();

    for path in ["/api", "/api/"] {
        let res = client.get(gw.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let list: Vec<Value> = res.json().await.unwrap();
        let read = list.iter().find(|d| d["name"] == "read").unwrap();
        assert_eq!(read["is_heavy"], true);
        assert_eq!(read["output_type"], "tabular");
    }

    let res = client.post(gw.url("/api")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_engine_errors_by_policy() {
    let (gw, _engine) = gateway().await;
    let client = client();

    // 4xx is not fatal by default: success with the error in a header.
    let res = client.get(gw.url("/api/fail?status=404")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let header: Value = serde_json::from_slice(res.headers()["x-yt-error"].as_bytes()).unwrap();
    assert_eq!(header["code"], 42);
    assert_eq!(header["message"], "resolution failed");

    let res = client.get(gw.url("/api/fail?status=503")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = error_body(res).await;
    assert_eq!(body["code"], 42);
    assert_eq!(body["message"], "resolution failed");
}

#[tokio::test]
async fn test_fail_on_4xx_policy() {
    let engine = ScriptedEngine::new();
    let mut config = GatewayConfig::default();
    config.failure_policy.fail_on_4xx = true;
    let gw = spawn_gateway(config, engine).await;

    let res = client().get(gw.url("/api/fail?status=409")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_engine_panic_is_internal_error() {
    let (gw, _engine) = gateway().await;

    let res = client().get(gw.url("/api/panic")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.headers().contains_key("x-request-id"));

    // The gateway keeps serving.
    let res = client().get(gw.url("/ping")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_failure_after_output_aborts_the_body() {
    let (gw, _engine) = gateway().await;

    let res = client().get(gw.url("/api/stream_fail")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.bytes().await.is_err());
}

#[tokio::test]
async fn test_streaming_put_echo() {
    let (gw, _engine) = gateway().await;

    let payload: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let res = client()
        .put(gw.url("/api/echo"))
        .body(payload.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "application/octet-stream");
    let echoed = res.bytes().await.unwrap();
    assert_eq!(echoed.len(), payload.len());
    assert!(echoed[..] == payload[..]);
}

#[tokio::test]
async fn test_large_output_is_delivered_in_order() {
    let (gw, _engine) = gateway().await;

    let body = client().get(gw.url("/api/big")).send().await.unwrap().bytes().await.unwrap();
    assert_eq!(body.len(), 64 * 64 * 1024);
    for (i, chunk) in body.chunks(64 * 1024).enumerate() {
        assert!(chunk.iter().all(|b| *b == i as u8), "chunk {i}");
    }
}

#[tokio::test]
async fn test_heavy_commands_rejected_while_choking() {
    let engine = ScriptedEngine::new();
    let mut config = GatewayConfig::default();
    config.load.low_watermark = 0;
    config.load.high_watermark = 0;
    config.load.sample_interval_ms = 10;
    let gw = spawn_gateway(config, engine.clone()).await;
    let client = client();

    let hold = tokio::spawn({
        let client = client.clone();
        let url = gw.url("/api/hold");
        async move { client.get(url).send().await.unwrap().status() }
    });

    let mut rejected = None;
    for _ in 0..100 {
        let res = client.get(gw.url("/api/read")).send().await.unwrap();
        if res.status() == StatusCode::SERVICE_UNAVAILABLE {
            rejected = Some(error_body(res).await);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let rejected = rejected.expect("heavy command was never rejected");
    assert!(rejected["message"].as_str().unwrap().contains("read"));

    // Light commands still pass.
    let res = client.get(gw.url("/api/get")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    engine.release();
    assert_eq!(hold.await.unwrap(), StatusCode::OK);
}

struct FixedLoad(AtomicBool);

impl LoadSignal for FixedLoad {
    fn is_choking(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn test_admission_uses_injected_signal() {
    let load = Arc::new(FixedLoad(AtomicBool::new(true)));
    let dispatcher = Dispatcher::new(
        ScriptedEngine::new(),
        load.clone(),
        InflightCounter::new(),
        DispatchSettings::from(&GatewayConfig::default()),
    );

    let request = || Request::get("/api/read").body(Body::empty()).unwrap();

    let err = dispatcher.dispatch("read", request()).await.unwrap_err();
    assert!(matches!(err, GatewayError::AdmissionRejected(_)));
    assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

    load.0.store(false, Ordering::SeqCst);
    let response = dispatcher.dispatch("read", request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_every_response_has_request_id() {
    let (gw, _engine) = gateway().await;
    let client = client();

    for path in ["/ping", "/api/get", "/api/nonexistent", "/nowhere"] {
        let res = client.get(gw.url(path)).send().await.unwrap();
        assert!(res.headers().contains_key("x-request-id"), "{path}");
    }
}

#[tokio::test]
async fn test_commands_outlive_the_request_timeout() {
    let engine = ScriptedEngine::new();
    let mut config = GatewayConfig::default();
    config.timeouts.request_secs = 1;
    let gw = spawn_gateway(config, engine.clone()).await;

    tokio::spawn({
        let engine = engine.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            engine.release();
        }
    });

    let res = client().get(gw.url("/api/hold")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "{}");
}

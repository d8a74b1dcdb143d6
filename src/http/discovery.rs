//! Neighbour discovery endpoints.
//!
//! `/hosts` lists the configured neighbours; `/versions` asks each of them
//! for `/__version__` concurrently and reports versions or errors by name.
//! `/_check_availability_time` serves the availability file maintained by
//! the host's checker.

use std::time::Duration;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures_util::future::join_all;
use serde_json::{json, Map, Value};

use super::client::OutboundRequest;
use super::server::AppState;
use crate::config::NeighbourConfig;
use crate::error::GatewayError;

pub async fn hosts(State(state): State<AppState>) -> Json<Vec<NeighbourConfig>> {
    Json(state.config.load().discovery.neighbours.clone())
}

pub async fn versions(State(state): State<AppState>) -> Json<Map<String, Value>> {
    let config = state.config.load_full();
    let timeout = Duration::from_millis(config.timeouts.outbound_ms);

    let probes = config.discovery.neighbours.iter().map(|neighbour| async move {
        (neighbour.name.clone(), probe_version(neighbour, timeout).await)
    });

    Json(join_all(probes).await.into_iter().collect())
}

async fn probe_version(neighbour: &NeighbourConfig, timeout: Duration) -> Value {
    let request = OutboundRequest::new(neighbour.host.clone())
        .with_port(neighbour.port)
        .with_path("/__version__")
        .with_timeout(timeout)
        .with_fail_on_4xx(true);

    match request.fire().await {
        Ok(body) => json!({ "version": String::from_utf8_lossy(&body).trim() }),
        Err(e) => {
            tracing::warn!(neighbour = %neighbour.name, error = %e, "Version probe failed");
            json!({ "error": GatewayError::from(e).to_body() })
        }
    }
}

/// Contents of the availability file, or `0` when it cannot be read.
pub async fn availability_time(State(state): State<AppState>) -> Response {
    let path = state.config.load().discovery.availability_file.clone();
    let body = match tokio::fs::read(&path).await {
        Ok(contents) => Bytes::from(contents),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Availability file unreadable");
            Bytes::from_static(b"0")
        }
    };
    ([(CONTENT_TYPE, HeaderValue::from_static("text/plain"))], body).into_response()
}

//! Per-request command dispatcher.

use std::sync::Arc;
use std::time::Instant;

use axum::body::{self, Body};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method, Request};
use axum::response::Response;
use tokio::task::JoinError;

use super::{expected_method, is_valid_command_name};
use crate::admission::{admit, Admission, InflightCounter, LoadSignal};
use crate::bridge::{pump_request_body, BridgeLimits, InboundAdapter, InputChannel, OutboundPipe, ResponseBody};
use crate::config::{FailurePolicy, GatewayConfig};
use crate::engine::{CommandDescriptor, Engine, EngineError, Invocation};
use crate::error::{ErrorBody, GatewayError};
use crate::negotiation::{negotiate, RequestView};
use crate::observability::metrics;

/// Header carrying a non-fatal engine error on an otherwise successful response.
pub const X_YT_ERROR: HeaderName = HeaderName::from_static("x-yt-error");

/// Dispatcher knobs taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub limits: BridgeLimits,
    pub failure_policy: FailurePolicy,
    pub max_body_size: usize,
}

impl From<&GatewayConfig> for DispatchSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            limits: config.bridge,
            failure_policy: config.failure_policy,
            max_body_size: config.security.max_body_size,
        }
    }
}

/// Routes command requests to the engine.
#[derive(Clone)]
pub struct Dispatcher {
    engine: Arc<dyn Engine>,
    load: Arc<dyn LoadSignal>,
    inflight: InflightCounter,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<dyn Engine>,
        load: Arc<dyn LoadSignal>,
        inflight: InflightCounter,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            engine,
            load,
            inflight,
            settings,
        }
    }

    /// Every command the engine offers, for the discovery endpoint.
    pub fn descriptors(&self) -> Vec<CommandDescriptor> {
        self.engine.list_command_descriptors()
    }

    /// Run one command request to the point where the response head is known.
    pub async fn dispatch(&self, name: &str, request: Request<Body>) -> Result<Response, GatewayError> {
        let started = Instant::now();
        let verb = request.method().clone();

        let resolved = self.resolve(name);
        let label = metric_label(name, &resolved);
        let result = match resolved {
            Ok(descriptor) => self.run(descriptor, request).await,
            Err(err) => Err(err),
        };

        let status = match &result {
            Ok(response) => response.status(),
            Err(err) => err.status(),
        };
        metrics::record_request(label, verb.as_str(), status.as_u16(), started);
        result
    }

    fn resolve(&self, name: &str) -> Result<CommandDescriptor, GatewayError> {
        if !is_valid_command_name(name) {
            return Err(GatewayError::client_input(format!("invalid command name {name:?}")));
        }
        self.engine
            .find_command_descriptor(name)
            .ok_or_else(|| GatewayError::NotFound(name.to_string()))
    }

    async fn run(&self, descriptor: CommandDescriptor, request: Request<Body>) -> Result<Response, GatewayError> {
        let name = descriptor.name.as_str();
        let expected = expected_method(&descriptor);
        if request.method() != expected {
            return Err(GatewayError::client_input(format!(
                "command {name:?} must be requested with {expected}, got {}",
                request.method()
            )));
        }

        if admit(&descriptor, self.load.as_ref()) == Admission::Reject {
            tracing::warn!(command = %name, "Rejecting heavy command under load");
            metrics::record_admission_rejected(name);
            return Err(GatewayError::AdmissionRejected(name.to_string()));
        }

        let (parts, body) = request.into_parts();

        // POST bodies carry parameters, PUT bodies are command input.
        let (parameter_body, input_body) = if expected == Method::POST {
            let bytes = body::to_bytes(body, self.settings.max_body_size)
                .await
                .map_err(|e| GatewayError::ClientInput {
                    message: "unable to read request body".to_string(),
                    source: Some(e.into()),
                })?;
            (Some(bytes), None)
        } else if expected == Method::PUT {
            (None, Some(body))
        } else {
            (None, None)
        };

        let negotiated = negotiate(
            &descriptor,
            RequestView {
                query: parts.uri.query(),
                headers: &parts.headers,
                body: parameter_body.as_deref(),
            },
            self.engine.as_ref(),
        )?;

        tracing::debug!(
            command = %name,
            input_format = %negotiated.input_format,
            output_format = %negotiated.output_format,
            parameters = negotiated.parameters.len(),
            "Dispatching command"
        );

        let input = match input_body {
            Some(body) => {
                let (adapter, input) = InboundAdapter::new(self.settings.limits.input_high_watermark);
                tokio::spawn(pump_request_body(body, adapter));
                input
            }
            None => InputChannel::empty(),
        };

        let OutboundPipe {
            adapter,
            channel,
            sink,
            body,
            mut first_chunk,
        } = OutboundPipe::open(self.settings.limits);

        let invocation = Invocation {
            command: name.to_string(),
            input,
            input_format: negotiated.input_format,
            output: channel.clone(),
            output_format: negotiated.output_format,
            parameters: negotiated.parameters,
        };

        let engine = self.engine.clone();
        let guard = self.inflight.enter();
        let mut execution = tokio::spawn(async move {
            let _guard = guard;
            engine.execute(invocation).await
        });

        let policy = self.settings.failure_policy;
        let mime = negotiated.output_mime;

        tokio::select! {
            biased;

            outcome = &mut execution => {
                channel.finish();
                match flatten(outcome) {
                    Err(err) if policy.is_fatal(err.status) => {
                        adapter.destroy();
                        Err(GatewayError::Engine(err))
                    }
                    Err(err) => {
                        tracing::debug!(command = %name, error = %err, "Command finished with non-fatal error");
                        adapter.end_soon();
                        Ok(respond(body, mime, Some(&err)))
                    }
                    Ok(()) => {
                        adapter.end_soon();
                        Ok(respond(body, mime, None))
                    }
                }
            }

            Ok(()) = &mut first_chunk => {
                let command = name.to_string();
                tokio::spawn(async move {
                    match flatten(execution.await) {
                        Err(err) if policy.is_fatal(err.status) => {
                            tracing::warn!(command = %command, error = %err, "Command failed after output was committed");
                            sink.abort(err.to_string());
                            adapter.destroy();
                        }
                        Err(err) => {
                            tracing::debug!(command = %command, error = %err, "Command finished with non-fatal error");
                            channel.finish();
                            adapter.end_soon();
                        }
                        Ok(()) => {
                            channel.finish();
                            adapter.end_soon();
                        }
                    }
                });
                Ok(respond(body, mime, None))
            }
        }
    }
}

/// Metric label for a requested command. Names that do not resolve to a
/// registered command share fixed buckets so arbitrary paths add no series.
fn metric_label<'a>(name: &'a str, resolved: &Result<CommandDescriptor, GatewayError>) -> &'a str {
    match resolved {
        Ok(_) => name,
        Err(GatewayError::NotFound(_)) => "unknown",
        Err(_) => "invalid",
    }
}

fn flatten(outcome: Result<Result<(), EngineError>, JoinError>) -> Result<(), EngineError> {
    match outcome {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "Engine execution panicked");
            Err(EngineError::new(500, "engine execution panicked"))
        }
    }
}

fn respond(body: ResponseBody, mime: Option<&'static str>, error: Option<&EngineError>) -> Response {
    let mut response = Response::new(body.into_body());

    let headers = response.headers_mut();
    if let Some(mime) = mime {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(mime));
    }
    if let Some(err) = error {
        let body = ErrorBody::new(err.code, err.message.clone());
        match serde_json::to_vec(&body).map(|bytes| HeaderValue::from_bytes(&bytes)) {
            Ok(Ok(value)) => {
                headers.insert(X_YT_ERROR, value);
            }
            _ => tracing::warn!(error = %err, "Unable to encode engine error header"),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::LoadWatcher;
    use crate::engine::EchoEngine;

    fn dispatcher() -> Dispatcher {
        let config = GatewayConfig::default();
        Dispatcher::new(
            Arc::new(EchoEngine::new()),
            Arc::new(LoadWatcher::new(&config.load)),
            InflightCounter::new(),
            DispatchSettings::from(&config),
        )
    }

    #[test]
    fn metric_labels_only_name_registered_commands() {
        let dispatcher = dispatcher();
        let label = |name: &str| metric_label(name, &dispatcher.resolve(name)).to_string();

        assert_eq!(label("get"), "get");
        assert_eq!(label("read"), "read");
        assert_eq!(label("no_such_command"), "unknown");
        assert_eq!(label("another_missing_one"), "unknown");
        assert_eq!(label("Bad-Name"), "invalid");
        assert_eq!(label("../../etc"), "invalid");
    }
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the command API and utility endpoints
//! - Wire up middleware (request ID, tracing, panic capture)
//! - Bound utility endpoints by the request timeout
//! - Run the load monitor and apply configuration updates
//! - Serve until the shutdown signal, then drain connections

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderValue, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::admission::{InflightCounter, LoadMonitor, LoadWatcher};
use crate::command::{DispatchSettings, Dispatcher};
use crate::config::GatewayConfig;
use crate::engine::{CommandDescriptor, Engine};
use crate::error::GatewayError;
use crate::http::{discovery, request, response};
use crate::lifecycle::Shutdown;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    /// Effective configuration, swapped on reload.
    pub config: Arc<ArcSwap<GatewayConfig>>,
}

/// HTTP server for the command gateway.
pub struct HttpServer {
    router: Router,
    config: Arc<ArcSwap<GatewayConfig>>,
    load: Arc<LoadWatcher>,
    inflight: InflightCounter,
}

impl HttpServer {
    /// Create a new HTTP server fronting `engine`.
    pub fn new(config: GatewayConfig, engine: Arc<dyn Engine>) -> Self {
        let load = Arc::new(LoadWatcher::new(&config.load));
        let inflight = InflightCounter::new();
        let dispatcher = Dispatcher::new(
            engine,
            load.clone(),
            inflight.clone(),
            DispatchSettings::from(&config),
        );

        let request_timeout = Duration::from_secs(config.timeouts.request_secs);
        let config = Arc::new(ArcSwap::from_pointee(config));
        let state = AppState {
            dispatcher,
            config: config.clone(),
        };

        let router = Self::build_router(request_timeout, state);
        Self {
            router,
            config,
            load,
            inflight,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The request timeout wraps the utility routes only; command requests
    /// run until the engine finishes.
    fn build_router(request_timeout: Duration, state: AppState) -> Router {
        let commands = Router::new()
            .route("/api", any(discovery_handler))
            .route("/api/", any(discovery_handler))
            .route("/api/{command}", any(command_handler));

        let utility = Router::new()
            .route("/ping", get(ping))
            .route("/hosts", get(discovery::hosts))
            .route("/versions", get(discovery::versions))
            .route("/_check_availability_time", get(discovery::availability_time))
            .route("/__version__", get(version))
            .route("/__config__", get(effective_config))
            .route("/ui", get(ui_redirect))
            .route("/ui/", get(ui_redirect))
            .route("/", get(root_redirect))
            .fallback(invalid_uri)
            .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout));

        commands
            .merge(utility)
            .with_state(state)
            .layer(CatchPanicLayer::custom(response::panic_response))
            .layer(request::propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(request::make_span::<Body>))
            .layer(request::set_request_id_layer())
    }

    /// The router, for serving on a custom transport or driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Load watcher feeding admission control.
    pub fn load_watcher(&self) -> Arc<LoadWatcher> {
        self.load.clone()
    }

    /// Run the server until `shutdown` fires, then drain open connections.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let background = Shutdown::new();

        let sample_interval = Duration::from_millis(self.config.load().load.sample_interval_ms);
        let monitor = LoadMonitor::new(self.load.clone(), self.inflight.clone(), sample_interval);
        tokio::spawn(monitor.run(background.subscribe()));

        let config = self.config.clone();
        let load = self.load.clone();
        let mut reload_shutdown = background.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(new_config) => {
                            load.reconfigure(&new_config.load);
                            config.store(Arc::new(new_config));
                        }
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP listener closing");
            })
            .await?;

        background.trigger();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn command_handler(
    State(state): State<AppState>,
    Path(command): Path<String>,
    request: Request<Body>,
) -> Result<Response, GatewayError> {
    tracing::debug!(request_id = %request::request_id(&request), command = %command, "Command request");
    state.dispatcher.dispatch(&command, request).await
}

async fn discovery_handler(
    State(state): State<AppState>,
    method: Method,
) -> Result<Json<Vec<CommandDescriptor>>, GatewayError> {
    if method != Method::GET && method != Method::HEAD {
        return Err(GatewayError::client_input(format!(
            "command discovery must be requested with GET, got {method}"
        )));
    }
    Ok(Json(state.dispatcher.descriptors()))
}

async fn ping() -> impl IntoResponse {
    (StatusCode::OK, [(CONTENT_LENGTH, HeaderValue::from_static("0"))])
}

async fn version() -> Response {
    response::public_text(env!("CARGO_PKG_VERSION"))
}

async fn effective_config(State(state): State<AppState>) -> Json<GatewayConfig> {
    Json(GatewayConfig::clone(&state.config.load()))
}

async fn ui_redirect(State(state): State<AppState>) -> Response {
    response::redirect(StatusCode::FOUND, &state.config.load().ui.location)
}

async fn root_redirect(State(state): State<AppState>) -> Response {
    response::redirect(StatusCode::SEE_OTHER, &state.config.load().ui.location)
}

async fn invalid_uri(uri: Uri) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, format!("Invalid URI {:?}", uri.to_string()))
}

//! `TetherServer`: Axum HTTP server exposing the transport.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use futures::StreamExt;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tether_core::ToolCatalog;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::errors::TransportError;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::transport::{
    Acknowledgment, CloseReason, Frame, MessageHandler, Transport, TransportConfig,
};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The session transport.
    pub transport: Arc<Transport>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The tether HTTP server.
pub struct TetherServer {
    config: Arc<ServerConfig>,
    transport: Arc<Transport>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl TetherServer {
    /// Create a new server.
    pub fn new(
        config: ServerConfig,
        catalog: Arc<dyn ToolCatalog>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        let transport = Transport::new(TransportConfig::from(&config), catalog, handler);
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            transport: Arc::clone(&self.transport),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::clone(&self.config),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route(
                &self.config.stream_path,
                get(stream_handler).delete(close_handler),
            )
            .route(&self.config.message_path, post(message_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/", get(root_handler))
            .layer(DefaultBodyLimit::max(self.config.max_message_bytes))
            .layer(cors_layer(&self.config.allowed_origins))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind and serve in a background task until shutdown.
    ///
    /// Returns the bound address and the server task handle.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(%addr, stream_path = %self.config.stream_path, "tether server listening");
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
        });
        Ok((addr, handle))
    }

    /// Stop accepting connections and close every open channel.
    ///
    /// Returns how many channels were closed.
    pub fn initiate_shutdown(&self) -> usize {
        let _ = self.shutdown.begin();
        let closed = self.transport.close_all(CloseReason::Shutdown);
        info!(closed, "closed open channels for shutdown");
        closed
    }

    /// Get the transport.
    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if allowed_origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        cors.allow_origin(origins)
    }
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// GET <stream path>
async fn stream_handler(State(state): State<AppState>) -> Result<Response, TransportError> {
    let (channel, frames) = state.transport.open_channel().await?;
    if state.shutdown.is_shutting_down() {
        let _ = channel.close(CloseReason::Shutdown);
    }
    let events = frames.map(Frame::into_event);
    Ok((
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(events),
    )
        .into_response())
}

/// DELETE <stream path>?sessionId=
async fn close_handler(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<StatusCode, TransportError> {
    state.transport.close_session(query.session_id.as_deref())?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST <message path>?sessionId=
async fn message_handler(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Result<Acknowledgment, TransportError> {
    state
        .transport
        .dispatch(query.session_id.as_deref(), &body)
        .await
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        &state.config,
        state.transport.session_count(),
        state.shutdown.is_shutting_down(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /
async fn root_handler() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/health")])
}

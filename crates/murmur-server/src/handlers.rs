//! HTTP and WebSocket handlers for the murmur server.
//!
//! Unary operations are JSON POST endpoints. Listening for messages upgrades
//! to a WebSocket that carries one codec-encoded frame per binary message.

use crate::config::Config;
use crate::metrics::{self, ListenerMetricsGuard};
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::{
        rejection::QueryRejection,
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use murmur_core::{
    AuthFailure, ChatError, DeliveryLoop, FrameSink, MessageRouter, PresenceCoordinator,
    SinkError, UserStore,
};
use murmur_protocol::{
    codec, Ack, Credentials, ErrorBody, ErrorCode, Frame, ListUsersResponse, LoginRequest,
    PrivateMessageRequest, PublicMessageRequest,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// How often router totals are copied into the metrics registry.
const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Shared server state.
pub struct AppState {
    pub presence: PresenceCoordinator,
    pub delivery: DeliveryLoop,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state with an empty user store.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let router = MessageRouter::new(Arc::new(UserStore::new()));
        let presence =
            PresenceCoordinator::with_mailbox_capacity(router, config.limits.mailbox_capacity);
        let delivery =
            DeliveryLoop::with_heartbeat_interval(presence.clone(), config.heartbeat.interval());

        Self {
            presence,
            delivery,
            config,
        }
    }

    #[must_use]
    pub fn router(&self) -> &MessageRouter {
        self.presence.router()
    }
}

/// Failure of an API call, rendered as a status code and [`ErrorBody`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("message text exceeds {max} bytes")]
    TextTooLong { max: usize },

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Chat(e) => e.kind(),
            ApiError::TextTooLong { .. } => "text_too_long",
            ApiError::InvalidQuery(_) => "invalid_query",
        }
    }

    fn status(&self) -> (StatusCode, ErrorCode) {
        match self {
            ApiError::Chat(ChatError::Authentication(_)) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::Authentication)
            }
            ApiError::Chat(ChatError::NotFound(_)) => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
            ApiError::Chat(ChatError::InvalidNickname(_))
            | ApiError::TextTooLong { .. }
            | ApiError::InvalidQuery(_) => {
                (StatusCode::BAD_REQUEST, ErrorCode::InvalidArgument)
            }
            ApiError::Chat(ChatError::Internal(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal)
            }
        }
    }
}

impl From<AuthFailure> for ApiError {
    fn from(failure: AuthFailure) -> Self {
        ApiError::Chat(failure.into())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidQuery(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        metrics::record_api_error(self.kind());

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            debug!(error = %self, "Request rejected");
        }

        (status, Json(ErrorBody::new(code, self.to_string()))).into_response()
    }
}

/// Build the HTTP router.
pub fn app(state: Arc<AppState>) -> Router {
    let listen_path = state.config.transport.listen_path.clone();

    Router::new()
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/users", post(list_users_handler))
        .route("/messages/public", post(public_message_handler))
        .route("/messages/private", post(private_message_handler))
        .route(&listen_path, get(listen_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Run the HTTP/WebSocket server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        match metrics::start_metrics_server(config.metrics.port) {
            Ok(()) => {
                spawn_stats_reporter(state.router().clone());
            }
            Err(e) => error!("Failed to start metrics server: {}", e),
        }
    }

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("murmur server listening on {}", addr);
    info!(
        "Listen endpoint: ws://{}{}?nickname=<nickname>",
        addr, config.transport.listen_path
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

fn spawn_stats_reporter(router: MessageRouter) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STATS_INTERVAL);
        loop {
            ticker.tick().await;
            metrics::record_router_stats(&router.stats());
        }
    })
}

fn check_text(config: &Config, text: &str) -> Result<(), ApiError> {
    let max = config.limits.max_text_len;
    if text.len() > max {
        return Err(ApiError::TextTooLong { max });
    }
    Ok(())
}

async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Credentials>, ApiError> {
    let credentials = state.presence.login(&request.nickname)?;
    metrics::record_login();
    Ok(Json(credentials))
}

async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<Ack>, ApiError> {
    state.presence.logout(&credentials)?;
    metrics::record_logout();
    Ok(Json(Ack {}))
}

async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<ListUsersResponse>, ApiError> {
    let users = state.presence.list_users(&credentials)?;
    Ok(Json(ListUsersResponse { users }))
}

async fn public_message_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PublicMessageRequest>,
) -> Result<Json<Ack>, ApiError> {
    check_text(&state.config, &request.text)?;
    state
        .router()
        .send_public(&request.credentials, &request.text)?;
    metrics::record_message("public");
    Ok(Json(Ack {}))
}

async fn private_message_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PrivateMessageRequest>,
) -> Result<Json<Ack>, ApiError> {
    check_text(&state.config, &request.text)?;
    let delivery = state
        .router()
        .send_private(&request.credentials, &request.to, &request.text)?;
    metrics::record_message("private");
    trace!(to = %request.to, ?delivery, "Private message accepted");
    Ok(Json(Ack {}))
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.router().stats();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "users": state.router().store().len(),
        "listeners": stats.listeners,
    }))
}

#[derive(Debug, Deserialize)]
struct ListenParams {
    nickname: String,
}

/// WebSocket upgrade handler.
///
/// Credentials are checked before upgrading so refusals are plain HTTP errors
/// with an [`ErrorBody`]. A request that is not an upgrade gets axum's own
/// rejection once the credentials pass.
async fn listen_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListenParams>, QueryRejection>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let credentials = Credentials::new(params.nickname);
    state.router().store().check_credentials(&credentials)?;
    if state.router().registry().contains(&credentials.nickname) {
        return Err(AuthFailure::AlreadyListening.into());
    }

    match ws {
        Ok(ws) => Ok(ws.on_upgrade(move |socket| handle_listen(socket, state, credentials))),
        Err(rejection) => Ok(rejection.into_response()),
    }
}

/// Stream a user's frames over an upgraded WebSocket.
async fn handle_listen(socket: WebSocket, state: Arc<AppState>, credentials: Credentials) {
    let _metrics_guard = ListenerMetricsGuard::new();
    let (sender, mut receiver) = socket.split();

    // Client messages carry nothing; reading keeps control frames flowing
    // and notices a close before the next write would.
    let mut reader = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "WebSocket read error");
                    break;
                }
            }
        }
    });

    let sink = WsSink { sender };
    tokio::select! {
        result = state.delivery.run(&credentials, sink) => match result {
            Ok(summary) => debug!(
                nickname = %summary.nickname,
                frames = summary.frames,
                "Listen stream ended"
            ),
            Err(e) => {
                metrics::record_api_error(e.kind());
                warn!(nickname = %credentials.nickname, error = %e, "Listen stream refused");
            }
        },
        _ = &mut reader => {
            debug!(nickname = %credentials.nickname, "Client closed listen stream");
        }
    }

    reader.abort();
}

/// Sending half of a listen WebSocket.
struct WsSink {
    sender: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: Arc<Frame>) -> Result<(), SinkError> {
        let data = codec::encode(&frame)?;
        self.sender
            .send(Message::Binary(data.to_vec()))
            .await
            .map_err(|e| SinkError::SendFailed(e.to_string()))
    }
}

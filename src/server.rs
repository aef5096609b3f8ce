//! HTTP control surface for the session supervisor

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use log::info;
use serde_json::json;

use crate::grid::{GridConfig, GridError, GridExchange, SessionStatus, SessionSupervisor};

/// A grid error rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub GridError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            e if e.is_config() => StatusCode::BAD_REQUEST,
            GridError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            GridError::AlreadyRunning(_) | GridError::NotRunning(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GridError> for ApiError {
    fn from(err: GridError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

type Supervisor<E> = Arc<SessionSupervisor<E>>;

pub fn router<E: GridExchange + 'static>(supervisor: Supervisor<E>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/sessions", get(list_handler::<E>).post(start_handler::<E>))
        .route(
            "/sessions/:symbol",
            get(status_handler::<E>).delete(stop_handler::<E>),
        )
        .with_state(supervisor)
}

/// Serve the control API until the process exits
pub async fn start_server<E: GridExchange + 'static>(
    supervisor: Supervisor<E>,
    host: &str,
    port: u16,
) -> std::io::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Control server running on http://{}", addr);
    axum::serve(listener, router(supervisor)).await
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_handler<E: GridExchange + 'static>(
    State(supervisor): State<Supervisor<E>>,
) -> Json<Vec<SessionStatus>> {
    Json(supervisor.list().await)
}

async fn start_handler<E: GridExchange + 'static>(
    State(supervisor): State<Supervisor<E>>,
    Json(config): Json<GridConfig>,
) -> Result<(StatusCode, Json<SessionStatus>), ApiError> {
    let status = supervisor.start(config).await?;
    Ok((StatusCode::CREATED, Json(status)))
}

async fn status_handler<E: GridExchange + 'static>(
    State(supervisor): State<Supervisor<E>>,
    Path(symbol): Path<String>,
) -> Result<Json<SessionStatus>, ApiError> {
    Ok(Json(supervisor.status(&symbol).await?))
}

async fn stop_handler<E: GridExchange + 'static>(
    State(supervisor): State<Supervisor<E>>,
    Path(symbol): Path<String>,
) -> Result<Json<SessionStatus>, ApiError> {
    Ok(Json(supervisor.stop(&symbol).await?))
}

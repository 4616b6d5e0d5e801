//! HTTP boundary: one lookup route plus a health check.
//!
//! Every response, success or failure, is JSON. Errors always carry a
//! top-level `error` string:
//!
//! | outcome              | status |
//! |----------------------|--------|
//! | found                | 200    |
//! | invalid / missing ip | 400    |
//! | not found            | 404    |
//! | handler panic        | 500    |

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::address::ParseError;
use crate::database::GeoRecord;
use crate::service::{LookupResult, LookupService};

pub const LOCATION_NOT_FOUND: &str = "Location not found for the given IP";

/// Body of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResponse {
    pub country: String,
    pub country_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl From<&GeoRecord> for LocationResponse {
    fn from(record: &GeoRecord) -> Self {
        Self {
            country: record.country.clone(),
            country_code: record.country_code.clone(),
            region: record.region.clone(),
            city: record.city.clone(),
        }
    }
}

/// Body of every 4xx/5xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub ranges: usize,
    pub uptime_seconds: i64,
    pub timestamp: DateTime<Utc>,
}

/// Failures surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    InvalidInput(#[from] ParseError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(%status, "request failed");
        } else {
            debug!(%status, error = %self, "request rejected");
        }

        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    service: Arc<LookupService>,
    started_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct LocationQuery {
    ip: Option<String>,
}

/// Build the application router around a shared lookup service.
pub fn router(service: Arc<LookupService>) -> Router {
    let state = AppState {
        service,
        started_at: Utc::now(),
    };

    let routes = Router::new()
        .route("/ip/location", get(get_location))
        .route("/health", get(health));

    with_middleware(routes).with_state(state)
}

/// JSON fallbacks, panic recovery and request tracing shared by all routes.
fn with_middleware<S>(routes: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    routes
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

/// Serve `service` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, service: Arc<LookupService>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }
    info!("routes: GET /ip/location?ip=<address>, GET /health");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn get_location(
    State(state): State<AppState>,
    query: Result<Query<LocationQuery>, QueryRejection>,
) -> Result<Json<LocationResponse>, ApiError> {
    let Query(query) = query.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let ip = query.ip.unwrap_or_default();

    match state.service.lookup(&ip) {
        LookupResult::Found(record) => Ok(Json(LocationResponse::from(record.as_ref()))),
        LookupResult::NotFound => Err(ApiError::NotFound(LOCATION_NOT_FOUND.to_string())),
        LookupResult::Invalid(err) => Err(err.into()),
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let now = Utc::now();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ranges: state.service.snapshot().len(),
        uptime_seconds: (now - state.started_at).num_seconds(),
        timestamp: now,
    })
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!(panic = %detail, "request handler panicked");

    ApiError::Internal.into_response()
}

//! HTTP surface.
//!
//! | Route | Method | Body |
//! |-------|--------|------|
//! | `/api/pdf/anonymize` | POST | JSON request, see [`AnonymizationRequest::from_json`] |
//! | `/health` | GET | none |
//!
//! Requests are independent: each one is validated on the executor and then
//! processed on the blocking pool with collaborators built by the
//! [`ServiceFactory`].

use crate::anonymize::{anonymize_async, ServiceFactory};
use crate::config::AnonymizerConfig;
use crate::error::AnonymizeError;
use crate::request::AnonymizationRequest;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

/// Shared, read-only state of the HTTP surface.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AnonymizerConfig>,
    pub factory: ServiceFactory,
}

impl AppState {
    pub fn new(config: AnonymizerConfig, factory: ServiceFactory) -> Self {
        Self {
            config: Arc::new(config),
            factory,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/pdf/anonymize", post(anonymize_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
}

async fn anonymize_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let (status, body) = handle_request(&state, &body).await;
    (status, Json(body))
}

async fn health_handler() -> impl IntoResponse {
    Json(health())
}

/// Body of `GET /health`.
pub fn health() -> Value {
    json!({
        "status": "ok",
        "service": "pdf-anonymizer",
        "version": env!("CARGO_PKG_VERSION"),
    })
}

/// Answer one `POST /api/pdf/anonymize` body.
pub async fn handle_request(state: &AppState, body: &[u8]) -> (StatusCode, Value) {
    // An unparsable body is treated like a missing one.
    let parsed: Value = serde_json::from_slice(body).unwrap_or(Value::Null);

    let request = match AnonymizationRequest::from_json(&parsed) {
        Ok(request) => request,
        Err(e) => return error_response(&AnonymizeError::from(e)),
    };

    match anonymize_async(request, state.config.clone(), state.factory.clone()).await {
        Ok(response) => (StatusCode::OK, response.to_json()),
        Err(e) => {
            if e.http_status() == 500 {
                error!(error = %e, "Request failed unexpectedly");
            }
            error_response(&e)
        }
    }
}

fn error_response(err: &AnonymizeError) -> (StatusCode, Value) {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, json!({ "error": err.to_string() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_names_the_service() {
        let body = health();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "pdf-anonymizer");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn error_body_carries_message_and_status() {
        let (status, body) = error_response(&AnonymizeError::StorageNotConfigured);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("not configured"));
    }
}

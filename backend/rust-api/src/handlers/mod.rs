use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::metrics;
use crate::repositories::StoreResult;
use crate::services::AppState;

pub mod assessment;
pub mod auth;
pub mod lessons;
pub mod progress;
pub mod users;

const STORE_PING_TIMEOUT: Duration = Duration::from_secs(1);
const LOCKS_PING_TIMEOUT: Duration = Duration::from_millis(500);

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut dependencies = serde_json::Map::new();

    let store_health = check_dependency(
        state.store.backend(),
        STORE_PING_TIMEOUT,
        state.store.ping(),
    )
    .await;
    let locks_health = check_dependency(
        state.locks.backend(),
        LOCKS_PING_TIMEOUT,
        state.locks.ping(),
    )
    .await;

    let all_healthy = [&store_health, &locks_health]
        .iter()
        .all(|health| health.get("status").and_then(|v| v.as_str()) == Some("healthy"));

    dependencies.insert("store".to_string(), json!(store_health));
    dependencies.insert("locks".to_string(), json!(locks_health));

    let (status_code, status) = if all_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": "techsteps-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": dependencies
        })),
    )
}

async fn check_dependency(
    backend: &'static str,
    timeout: Duration,
    ping: impl Future<Output = StoreResult<()>>,
) -> serde_json::Map<String, serde_json::Value> {
    let mut result = serde_json::Map::new();
    result.insert("backend".to_string(), json!(backend));

    match tokio::time::timeout(timeout, ping).await {
        Ok(Ok(())) => {
            result.insert("status".to_string(), json!("healthy"));
        }
        Ok(Err(e)) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!(e.to_string()));
        }
        Err(_) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert(
                "error".to_string(),
                json!(format!("{} timeout after {}ms", backend, timeout.as_millis())),
            );
        }
    }

    result
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Protects /metrics with HTTP Basic auth against `metrics_auth` (`user:password`).
pub async fn metrics_auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let decoded = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    if credentials != state.config.metrics_auth {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

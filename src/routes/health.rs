//! Health check endpoints for probes and monitoring.

use axum::{Json, extract::State, response::IntoResponse};
use http::StatusCode;
use serde::Serialize;

use crate::AppState;

/// Detailed health status response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Overall status: "healthy" or "unhealthy"
    pub status: &'static str,
    pub version: &'static str,
    /// Database status, absent when no database is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<ComponentStatus>,
}

/// Status of a single component.
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Latency of the check in milliseconds
    pub latency_ms: u64,
}

/// Full health check including the database.
#[tracing::instrument(name = "health.check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.db {
        Some(db) => {
            let start = std::time::Instant::now();
            let result = db.health_check().await;
            let latency_ms = start.elapsed().as_millis() as u64;
            if let Err(e) = &result {
                tracing::warn!(error = %e, "Database health check failed");
            }
            Some(ComponentStatus {
                healthy: result.is_ok(),
                message: result
                    .err()
                    .map(|_| "Database connection failed".to_string()),
                latency_ms,
            })
        }
        None => None,
    };

    let healthy = database.as_ref().is_none_or(|db| db.healthy);
    let health = HealthStatus {
        status: if healthy { "healthy" } else { "unhealthy" },
        version: env!("CARGO_PKG_VERSION"),
        database,
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health))
}

/// Liveness probe. Succeeds while the process can serve requests.
#[tracing::instrument(name = "health.liveness")]
pub async fn liveness() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe. Fails while the database is unreachable.
#[tracing::instrument(name = "health.readiness", skip(state))]
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(db) = &state.db
        && db.health_check().await.is_err()
    {
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    StatusCode::OK
}

#[cfg(all(test, feature = "database-sqlite"))]
mod tests {
    use axum::{Router, body::Body};
    use http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    async fn test_app(config_str: &str) -> Router {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let config =
            crate::config::AppConfig::from_str(config_str).expect("Failed to parse test config");
        let state = crate::AppState::new(config.clone())
            .await
            .expect("Failed to create AppState");
        crate::build_app(&config, state)
    }

    async fn test_app_with_db() -> Router {
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let db_id = COUNTER.fetch_add(1, Ordering::SeqCst);

        test_app(&format!(
            r#"
[database]
type = "sqlite"
path = "file:test_health_db_{}?mode=memory&cache=shared"
wal_mode = false
"#,
            db_id
        ))
        .await
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health_check_with_db() {
        let app = test_app_with_db().await;

        let (status, body) = get(&app, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(body["version"].as_str().unwrap().contains('.'));
        assert_eq!(body["database"]["healthy"], true);
        assert!(body["database"]["latency_ms"].is_number());
    }

    #[tokio::test]
    async fn test_health_check_without_db() {
        let app = test_app("").await;

        let (status, body) = get(&app, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(body.get("database").is_none());
    }

    #[tokio::test]
    async fn test_probes() {
        let app = test_app_with_db().await;
        assert_eq!(get(&app, "/health/live").await.0, StatusCode::OK);
        assert_eq!(get(&app, "/health/ready").await.0, StatusCode::OK);

        let app = test_app("").await;
        assert_eq!(get(&app, "/health/ready").await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_without_db_is_unavailable() {
        let app = test_app("").await;

        let (status, body) = get(&app, "/api/v1/metrics").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "not_configured");
    }
}

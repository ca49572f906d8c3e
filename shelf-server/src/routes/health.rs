use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::AppState;

const DB_PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Returns 200 when the database answers, 503 otherwise.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let outcome = tokio::time::timeout(DB_PING_TIMEOUT, state.store.ping()).await;
    let error = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(format!("query failed: {e}")),
        Err(_) => Some(format!("query timeout (>{}s)", DB_PING_TIMEOUT.as_secs())),
    };

    match error {
        None => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                database: "ok",
                error: None,
            }),
        ),
        Some(error) => {
            tracing::warn!(%error, "health.database.unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    database: "error",
                    error: Some(error),
                }),
            )
        }
    }
}

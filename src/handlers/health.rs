use axum::{extract::State, http::StatusCode};
use std::sync::Arc;

use crate::AppState;

pub async fn health_check() -> &'static str {
    "OK"
}

/// Ready once the database answers
pub async fn ready_check(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => (StatusCode::OK, "READY"),
        Err(e) => {
            tracing::error!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        },
    }
}

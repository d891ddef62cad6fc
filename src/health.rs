use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::AppState;

pub async fn health_check_handler(State(state): State<AppState>) -> Response {
    tracing::trace!("health_check started");

    let result = match state.store.ping().await {
        Ok(()) => state.store.count().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(count) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "message": "Article store reachable",
                "articles": count
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("health_check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "fail",
                    "message": "Article store unreachable"
                })),
            )
                .into_response()
        }
    }
}

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let knowledge_chunks = state.knowledge.count(None).await?;
    Ok(Json(json!({
        "status": "ok",
        "chatbots": state.chatbots.len(),
        "knowledge_chunks": knowledge_chunks,
        "default_model": state.config.generation.default_model
    })))
}

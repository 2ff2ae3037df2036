use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f32>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Path(chatbot_id): Path<String>,
    Json(payload): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = validate_message(&payload.message)?;

    let result = state
        .pipeline
        .run_turn(&chatbot_id, payload.conversation_id.as_deref(), message)
        .await?;

    Ok(Json(result))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(chatbot_id): Path<String>,
    Json(payload): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = validate_search(&payload)?;

    let results = state
        .pipeline
        .search(&chatbot_id, query, payload.limit, payload.threshold)
        .await?;

    Ok(Json(json!({ "results": results })))
}

fn validate_search(payload: &SearchRequest) -> Result<&str, ApiError> {
    let query = payload.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Query is required".to_string()));
    }
    if payload.limit == Some(0) {
        return Err(ApiError::BadRequest("Limit must be at least 1".to_string()));
    }
    if let Some(threshold) = payload.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ApiError::BadRequest(
                "Threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
    }
    Ok(query)
}

fn validate_message(raw: &str) -> Result<&str, ApiError> {
    let message = raw.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message is required".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(message)
}

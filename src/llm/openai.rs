use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::{Embedder, TextGenerator};
use super::types::GenerationRequest;
use crate::core::config::defaults::LlmConfig;
use crate::core::errors::ApiError;

/// Client for any OpenAI-compatible `/v1` endpoint (OpenAI, LM Studio, vLLM, ...).
#[derive(Clone)]
pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: Option<String>,
    embedding_model: String,
    client: Client,
}

impl OpenAiCompatProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            embedding_model: LlmConfig::default().embedding_model,
            client: Client::new(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(config.base_url.clone(), config.api_key.clone())
            .with_embedding_model(config.embedding_model.clone())
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.post(url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: GenerationRequest, model: &str) -> Result<String, ApiError> {
        let mut body = json!({
            "model": model,
            "messages": request.messages,
            "stream": false,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature { obj.insert("temperature".to_string(), json!(t)); }
            if let Some(t) = request.max_tokens { obj.insert("max_tokens".to_string(), json!(t)); }
        }

        let res = self
            .post("/v1/chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "Chat completion failed ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ApiError::Internal("Chat completion returned no content".to_string()))?
            .to_string();

        Ok(content)
    }
}

#[async_trait]
impl Embedder for OpenAiCompatProvider {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let body = json!({
            "model": self.embedding_model,
            "input": inputs,
        });

        let res = self
            .post("/v1/embeddings")
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!("Embedding request failed: {}", text)));
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;

        let mut embeddings = Vec::new();
        if let Some(data) = payload["data"].as_array() {
            for item in data {
                if let Some(vals) = item["embedding"].as_array() {
                    let vec: Vec<f32> = vals.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect();
                    embeddings.push(vec);
                }
            }
        }

        if embeddings.len() != inputs.len() {
            return Err(ApiError::Internal(format!(
                "Embedding count mismatch: {} != {}",
                embeddings.len(),
                inputs.len()
            )));
        }

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ChatMessage;
    use axum::routing::post;
    use axum::{Json, Router};

    async fn spawn_mock(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn generate_sends_settings_and_reads_first_choice() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "test-model");
                assert_eq!(body["max_tokens"], 42);
                assert_eq!(body["messages"][0]["role"], "user");
                Json(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "Hi there" } }]
                }))
            }),
        );
        let base_url = spawn_mock(router).await;
        let provider = OpenAiCompatProvider::new(base_url, Some("sk-test".into()));

        let request = GenerationRequest::new(vec![ChatMessage::user("Hello")])
            .with_max_tokens(42)
            .with_temperature(0.2);
        let reply = provider.generate(request, "test-model").await.unwrap();

        assert_eq!(reply, "Hi there");
    }

    #[tokio::test]
    async fn generate_surfaces_http_errors() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
        );
        let base_url = spawn_mock(router).await;
        let provider = OpenAiCompatProvider::new(base_url, None);

        let err = provider
            .generate(GenerationRequest::from_prompt("Hello"), "m")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("overloaded"));
    }

    #[tokio::test]
    async fn embed_returns_one_vector_per_input() {
        let router = Router::new().route(
            "/v1/embeddings",
            post(|| async {
                Json(json!({
                    "data": [
                        { "embedding": [0.1, 0.2] },
                        { "embedding": [0.3, 0.4] }
                    ]
                }))
            }),
        );
        let base_url = spawn_mock(router).await;
        let provider = OpenAiCompatProvider::new(base_url, None);

        let vectors = provider
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors.len(), 2);
        assert!((vectors[1][0] - 0.3).abs() < 1e-6);
    }
}

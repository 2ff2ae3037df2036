use std::sync::Arc;
use std::time::Duration;

use super::prompt::ComposedPrompt;
use crate::chatbot::ModelSettings;
use crate::core::config::defaults::GenerationConfig;
use crate::core::errors::PipelineError;
use crate::llm::{GenerationRequest, TextGenerator};

/// Single answering call with per-chatbot overrides and a hard timeout.
pub struct AnswerGenerator {
    backend: Arc<dyn TextGenerator>,
    config: GenerationConfig,
}

impl AnswerGenerator {
    pub fn new(backend: Arc<dyn TextGenerator>, config: GenerationConfig) -> Self {
        Self { backend, config }
    }

    /// Model name a chatbot resolves to.
    pub fn model_for(&self, settings: &ModelSettings) -> String {
        settings
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.config.default_model)
            .to_string()
    }

    pub async fn generate(
        &self,
        prompt: ComposedPrompt,
        settings: &ModelSettings,
    ) -> Result<String, PipelineError> {
        let model = self.model_for(settings);
        let request = GenerationRequest::new(prompt.into_messages())
            .with_temperature(settings.temperature.unwrap_or(self.config.temperature))
            .with_max_tokens(settings.max_tokens.unwrap_or(self.config.max_tokens));
        let timeout = Duration::from_secs(self.config.timeout_secs);

        tracing::debug!(provider = self.backend.name(), model = %model, "Generating answer");

        let text = match tokio::time::timeout(timeout, self.backend.generate(request, &model)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(PipelineError::generation(e)),
            Err(_) => return Err(PipelineError::GenerationTimeout(timeout)),
        };

        if text.trim().is_empty() {
            return Err(PipelineError::Generation(
                "backend returned an empty answer".to_string(),
            ));
        }
        Ok(text)
    }
}

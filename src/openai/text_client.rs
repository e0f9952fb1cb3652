use crate::{
    error::{ProviderError, Result},
    models::{ModelCategory, ModelInfo, TextGenerationRequest, TextGenerationResponse},
    openai::ChatTransport,
    traits::TextProvider,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct TextClient {
    transport: Arc<ChatTransport>,
    model: String,
}

impl TextClient {
    pub fn new(transport: Arc<ChatTransport>, model: impl Into<String>) -> Self {
        Self {
            transport,
            model: model.into(),
        }
    }

    pub async fn generate(&self, request: TextGenerationRequest) -> Result<TextGenerationResponse> {
        if request.prompt.is_empty() {
            return Err(ProviderError::RequestError("prompt must not be empty".into()));
        }
        let model = request.model_id.as_deref().unwrap_or(&self.model);
        if request.thinking_budget.is_some() {
            log::debug!("thinking_budget is not supported by this transport, ignoring");
        }

        let body = json!({
            "model": model,
            "messages": [
                {"role": "user", "content": request.prompt}
            ]
        });

        log::info!("Generating text with model: {}", model);
        let raw = self.transport.chat_completion(&body).await?;
        let text = extract_text(&raw)?;

        Ok(TextGenerationResponse {
            text,
            model: model.to_string(),
        })
    }

    pub fn supported_models() -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "gemini-3-flash-preview".to_string(),
                name: "Gemini 3 Flash Preview".to_string(),
                provider: "Google (via OpenAI-compatible proxy)".to_string(),
                category: ModelCategory::Text,
                description: "Fast text generation".to_string(),
            },
            ModelInfo {
                id: "gpt-4o-mini".to_string(),
                name: "GPT-4o mini".to_string(),
                provider: "OpenAI".to_string(),
                category: ModelCategory::Text,
                description: "General-purpose text generation".to_string(),
            },
        ]
    }
}

/// Pull the generated string out of whichever response shape came back:
/// standard choices, nested Gemini REST, or flattened top-level candidates.
pub(crate) fn extract_text(raw: &Value) -> Result<String> {
    if let Some(choices) = raw.get("choices").and_then(Value::as_array) {
        if let Some(text) = choices
            .first()
            .and_then(|choice| choice["message"]["content"].as_str())
        {
            return Ok(text.to_string());
        }
    }

    // Gemini REST shape forwarded by some proxies.
    if let Some(text) = raw["response"]["candidates"][0]["content"]["parts"][0]["text"].as_str() {
        return Ok(text.to_string());
    }

    // Same shape without the outer "response" wrapper.
    if let Some(text) = raw["candidates"][0]["content"]["parts"][0]["text"].as_str() {
        return Ok(text.to_string());
    }

    log::error!("Unknown response format: {}", raw);
    Err(ProviderError::ResponseError(format!(
        "unable to parse response format: {}",
        raw
    )))
}

#[async_trait]
impl TextProvider for TextClient {
    async fn generate_text(&self, request: TextGenerationRequest) -> Result<TextGenerationResponse> {
        self.generate(request).await
    }
}

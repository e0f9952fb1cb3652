use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct TextGenerationRequest {
    pub prompt: String,
    /// Advisory only; the OpenAI-compatible transport has no thinking-budget
    /// parameter, kept for interface compatibility with other transports.
    pub thinking_budget: Option<u32>,
    pub model_id: Option<String>,
}

impl TextGenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            thinking_budget: None,
            model_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TextGenerationResponse {
    pub text: String,
    pub model: String,
}

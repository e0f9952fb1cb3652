pub mod codec;
pub mod extract;
pub mod image_client;
pub mod text_client;

use crate::{
    config::OpenAiConfig,
    error::{ProviderError, Result},
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub use extract::ImageExtractor;
pub use image_client::ImageClient;
pub use text_client::TextClient;

/// One chat-completion POST per call, with bounded retries on transport-level
/// failures (connect, timeout). HTTP error statuses and malformed bodies are
/// never retried; extraction problems are the caller's to surface.
#[derive(Debug)]
pub struct ChatTransport {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_retries: u32,
}

impl ChatTransport {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::ConfigError("no API key configured".into()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs()))
            .build()
            .map_err(|e| ProviderError::ClientError(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.endpoint_base()),
            api_key,
            max_retries: config.max_retries(),
        })
    }

    /// Send a chat-completion body and return the raw JSON payload. The
    /// payload shape is not trusted beyond being JSON; callers run their own
    /// extraction over it.
    pub async fn chat_completion(&self, body: &Value) -> Result<Value> {
        let mut attempt = 0;
        loop {
            match self
                .http
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        let detail = response.text().await.unwrap_or_default();
                        return Err(ProviderError::HttpError(format!(
                            "chat completion request failed with status {}: {}",
                            status, detail
                        )));
                    }
                    return response.json::<Value>().await.map_err(|e| {
                        ProviderError::ResponseError(format!(
                            "invalid JSON in chat completion response: {}",
                            e
                        ))
                    });
                }
                Err(e) if attempt < self.max_retries && (e.is_timeout() || e.is_connect()) => {
                    attempt += 1;
                    log::warn!(
                        "Chat completion attempt {}/{} failed, retrying: {}",
                        attempt,
                        self.max_retries,
                        e
                    );
                }
                Err(e) => return Err(ProviderError::HttpError(e.to_string())),
            }
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Facade owning both generation clients, sharing one HTTP transport.
/// Everything inside is immutable after construction, so cloning and sharing
/// across tasks is safe.
#[derive(Clone)]
pub struct OpenAiClient {
    text_client: TextClient,
    image_client: ImageClient,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let transport = Arc::new(ChatTransport::new(&config)?);

        Ok(Self {
            text_client: TextClient::new(transport.clone(), config.text_model()),
            image_client: ImageClient::new(transport, config.image_model())?,
        })
    }

    pub fn text(&self) -> &TextClient {
        &self.text_client
    }

    pub fn image(&self) -> &ImageClient {
        &self.image_client
    }
}

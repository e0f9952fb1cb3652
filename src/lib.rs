//! genbridge: text and image generation clients for OpenAI-compatible
//! chat-completion endpoints.
//!
//! The interesting part lives in [`openai::extract`]: upstream proxies are not
//! contractually guaranteed to return one response shape, so the image client
//! runs an ordered chain of shape-specific parsers (Gemini REST candidates,
//! custom multi-modal fields, content-part lists, Markdown/base64/URL text)
//! until one yields a decodable image, and fails loudly with full diagnostics
//! when none does.

pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod openai;
pub mod traits;

pub use config::OpenAiConfig;
pub use error::{ProviderError, Result};
pub use models::{
    ImageGenerationRequest, ImageGenerationResponse, ModelCategory, ModelInfo,
    TextGenerationRequest, TextGenerationResponse,
};
pub use openai::{ImageClient, OpenAiClient, TextClient};
pub use traits::{ImageProvider, TextProvider};

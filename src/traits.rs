use crate::{
    error::Result,
    models::{
        ImageGenerationRequest, ImageGenerationResponse, TextGenerationRequest,
        TextGenerationResponse,
    },
};
use async_trait::async_trait;

#[async_trait]
pub trait TextProvider: Send + Sync {
    async fn generate_text(&self, request: TextGenerationRequest) -> Result<TextGenerationResponse>;
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate_image(
        &self,
        request: ImageGenerationRequest,
    ) -> Result<ImageGenerationResponse>;
}

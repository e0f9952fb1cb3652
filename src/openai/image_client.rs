use crate::{
    error::{ProviderError, Result},
    models::{ImageGenerationRequest, ImageGenerationResponse, ModelCategory, ModelInfo},
    openai::{codec, ChatTransport, ImageExtractor},
    traits::ImageProvider,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct ImageClient {
    transport: Arc<ChatTransport>,
    extractor: ImageExtractor,
    model: String,
}

impl ImageClient {
    pub fn new(transport: Arc<ChatTransport>, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            transport,
            extractor: ImageExtractor::new()?,
            model: model.into(),
        })
    }

    /// Generate an image from a prompt plus optional reference images.
    ///
    /// The OpenAI-compatible transport has no resolution knob, so
    /// `request.resolution` is accepted and ignored; the aspect ratio travels
    /// as a system instruction. Any failure along the way comes back as a
    /// single `GenerationError` naming the model and the underlying cause.
    pub async fn generate(
        &self,
        request: ImageGenerationRequest,
    ) -> Result<ImageGenerationResponse> {
        let model = request
            .model_id
            .clone()
            .unwrap_or_else(|| self.model.clone());

        match self.generate_inner(&request, &model).await {
            Ok(image) => {
                let response = ImageGenerationResponse::new(image, &model);
                log::info!(
                    "Image generation succeeded: {}x{}, {:?}",
                    response.width,
                    response.height,
                    response.color
                );
                Ok(response)
            }
            Err(e) => {
                let detail = format!("Error generating image with model {}: {}", model, e);
                log::error!("{}", detail);
                Err(ProviderError::GenerationError(detail))
            }
        }
    }

    async fn generate_inner(
        &self,
        request: &ImageGenerationRequest,
        model: &str,
    ) -> Result<image::DynamicImage> {
        if request.prompt.is_empty() {
            return Err(ProviderError::RequestError("prompt must not be empty".into()));
        }
        let body = build_request_body(request, model)?;

        log::info!(
            "Generating image with model: {} ({} reference images, aspect_ratio: {})",
            model,
            request.ref_images.len(),
            request.aspect_ratio.as_deref().unwrap_or("default"),
        );
        if request.resolution.is_some() {
            log::debug!("resolution is not supported by this transport, ignoring");
        }

        let raw = self.transport.chat_completion(&body).await?;
        self.extractor.extract(&raw).await
    }

    pub fn supported_models() -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "gemini-3-pro-image-preview".to_string(),
            name: "Gemini 3 Pro Image Preview".to_string(),
            provider: "Google (via OpenAI-compatible proxy)".to_string(),
            category: ModelCategory::Image,
            description: "Multimodal image generation with reference image support".to_string(),
        }]
    }
}

/// Reference images first, prompt last; aspect ratio as a system instruction;
/// modalities asking for both text and image back.
fn build_request_body(request: &ImageGenerationRequest, model: &str) -> Result<Value> {
    let mut content = Vec::with_capacity(request.ref_images.len() + 1);
    for ref_image in &request.ref_images {
        content.push(json!({
            "type": "image_url",
            "image_url": {"url": codec::reference_data_uri(ref_image)?}
        }));
    }
    content.push(json!({"type": "text", "text": request.prompt}));

    let aspect_ratio = request.aspect_ratio.as_deref().unwrap_or("16:9");
    Ok(json!({
        "model": model,
        "messages": [
            {"role": "system", "content": format!("aspect_ratio={}", aspect_ratio)},
            {"role": "user", "content": content},
        ],
        "modalities": ["text", "image"]
    }))
}

#[async_trait]
impl ImageProvider for ImageClient {
    async fn generate_image(
        &self,
        request: ImageGenerationRequest,
    ) -> Result<ImageGenerationResponse> {
        self.generate(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenAiConfig;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use serde_json::json;
    use std::io::Cursor;

    fn red_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([255, 0, 0])))
    }

    fn png_base64(image: &DynamicImage) -> String {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        BASE64.encode(buffer.into_inner())
    }

    fn client_for(server: &mockito::Server) -> ImageClient {
        let config = OpenAiConfig::new()
            .with_api_key("sk-test")
            .with_api_base(server.url());
        let transport = Arc::new(ChatTransport::new(&config).unwrap());
        ImageClient::new(transport, "gemini-3-pro-image-preview").unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let request = ImageGenerationRequest::new("a red circle")
            .with_ref_images(vec![red_image()])
            .with_aspect_ratio("1:1")
            .with_resolution("2K");
        let body = build_request_body(&request, "gemini-3-pro-image-preview").unwrap();

        assert_eq!(body["model"], "gemini-3-pro-image-preview");
        assert_eq!(body["modalities"], json!(["text", "image"]));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "aspect_ratio=1:1");
        // Resolution never appears in the wire body.
        assert!(body.get("resolution").is_none());

        let content = body["messages"][1]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "image_url");
        assert!(content[0]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
        assert_eq!(content[1], json!({"type": "text", "text": "a red circle"}));
    }

    #[test]
    fn test_request_body_preserves_reference_order() {
        let refs = vec![
            DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]))),
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 255, 0, 255]))),
            DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([0, 0, 255]))),
        ];
        let request = ImageGenerationRequest::new("blend these").with_ref_images(refs);
        let body = build_request_body(&request, "m").unwrap();

        let content = body["messages"][1]["content"].as_array().unwrap();
        assert_eq!(content.len(), 4);
        for part in &content[..3] {
            assert_eq!(part["type"], "image_url");
        }
        assert_eq!(content[3]["type"], "text");
    }

    #[tokio::test]
    async fn test_generate_end_to_end_with_data_uri_content() {
        let mut server = mockito::Server::new_async().await;
        let payload = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": [{
                        "type": "image_url",
                        "image_url": {"url": format!("data:image/jpeg;base64,{}", png_base64(&red_image()))}
                    }]
                }
            }]
        });
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(payload.to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let request = ImageGenerationRequest::new("a red circle").with_aspect_ratio("1:1");
        let response = client.generate(request).await.unwrap();

        assert_eq!(response.width, 2);
        assert_eq!(response.height, 2);
        assert_eq!(response.image.to_rgb8(), red_image().to_rgb8());
        assert_eq!(response.model, "gemini-3-pro-image-preview");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_wraps_failures_with_model_context() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"choices": []}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .generate(ImageGenerationRequest::new("a red circle"))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("gemini-3-pro-image-preview"), "got: {}", message);
        assert!(message.contains("no choices"), "got: {}", message);
        assert!(matches!(err, ProviderError::GenerationError(_)));
    }

    #[tokio::test]
    async fn test_generate_round_trips_reference_image() {
        // Encode a reference, echo it back as message content, decode it again.
        let reference = red_image();
        let data_uri = codec::reference_data_uri(&reference).unwrap();

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{
                        "message": {"role": "assistant", "content": format!("![echo]({})", data_uri)}
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let response = client
            .generate(ImageGenerationRequest::new("echo").with_ref_images(vec![reference.clone()]))
            .await
            .unwrap();

        // JPEG round trip is lossy; dimensions and near-solid color survive.
        assert_eq!(response.width, reference.width());
        assert_eq!(response.height, reference.height());
        let pixel = response.image.to_rgb8().get_pixel(0, 0).0;
        assert!(pixel[0] > 200 && pixel[1] < 60 && pixel[2] < 60, "got: {:?}", pixel);
    }
}

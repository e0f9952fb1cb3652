use image::{ColorType, DynamicImage};

#[derive(Debug, Clone)]
pub struct ImageGenerationRequest {
    pub prompt: String,
    /// Reference images, in order. Each one is re-encoded as a JPEG data URI
    /// and placed before the text prompt in the outgoing message.
    pub ref_images: Vec<DynamicImage>,
    /// e.g. "16:9", sent to the endpoint as a system instruction.
    pub aspect_ratio: Option<String>,
    /// Accepted for interface compatibility; the OpenAI-compatible transport
    /// has no resolution knob, so this is ignored (known capability
    /// limitation, not an error).
    pub resolution: Option<String>,
    pub model_id: Option<String>,
}

impl ImageGenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ref_images: Vec::new(),
            aspect_ratio: None,
            resolution: None,
            model_id: None,
        }
    }

    pub fn with_ref_images(mut self, ref_images: Vec<DynamicImage>) -> Self {
        self.ref_images = ref_images;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(aspect_ratio.into());
        self
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }
}

/// A decoded image returned to the caller. Nothing is retained by the client.
#[derive(Debug)]
pub struct ImageGenerationResponse {
    pub image: DynamicImage,
    pub width: u32,
    pub height: u32,
    pub color: ColorType,
    pub model: String,
}

impl ImageGenerationResponse {
    pub fn new(image: DynamicImage, model: impl Into<String>) -> Self {
        let width = image.width();
        let height = image.height();
        let color = image.color();
        Self {
            image,
            width,
            height,
            color,
            model: model.into(),
        }
    }
}

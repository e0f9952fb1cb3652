use genbridge::{ImageClient, ImageGenerationRequest, OpenAiClient, OpenAiConfig, TextClient};
use image::ImageFormat;
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file first
    match dotenv::dotenv() {
        Ok(_) => log::info!("✅ .env file loaded successfully"),
        Err(_) => log::warn!("⚠️  No .env file found, using system environment variables"),
    }

    genbridge::logger::init_with_config(
        genbridge::logger::LoggerConfig::development()
            .with_level(genbridge::logger::LogLevel::Debug),
    )?;

    log::info!("🔍 Checking endpoint environment...");

    match env::var("OPENAI_API_KEY") {
        Ok(key) => {
            log::info!("✅ API key found in environment");
            log::debug!("API key starts with: {}...", &key[..5.min(key.len())]);
        }
        Err(_) => {
            log::error!("❌ OPENAI_API_KEY is not set, requests will fail");
        }
    }

    if let Ok(base) = env::var("OPENAI_API_BASE") {
        log::info!("OPENAI_API_BASE: {}", base);
    } else {
        log::warn!("No OPENAI_API_BASE set, using the default OpenAI endpoint");
    }

    let config = OpenAiConfig::from_env();
    genbridge::logger::log_config_info(&config);

    log::info!("🔄 Creating client...");
    let client = match OpenAiClient::new(config) {
        Ok(client) => {
            log::info!("✅ Client initialized successfully");
            client
        }
        Err(e) => {
            log::error!("❌ Failed to initialize client: {}", e);
            return Err(e.into());
        }
    };

    log::info!("📚 Available text generation models:");
    for model in TextClient::supported_models() {
        log::info!("  {} - {} ({})", model.id, model.name, model.provider);
    }

    log::info!("🖼️  Available image generation models:");
    for model in ImageClient::supported_models() {
        log::info!("  {} - {} ({})", model.id, model.name, model.provider);
    }

    // Test 1: Text generation
    log::info!("🔄 Testing text generation...");

    let text_request = genbridge::TextGenerationRequest::new("Write a haiku about technology");
    match client.text().generate(text_request).await {
        Ok(response) => {
            log::info!("✅ Text generation successful!");
            log::info!("📝 Generated text: {}", response.text);
            log::info!("🤖 Model used: {}", response.model);
        }
        Err(e) => {
            log::error!("❌ Text generation failed: {}", e);
            log::warn!("💡 Check your API key, endpoint, and model availability");
        }
    }

    log::info!("---");

    // Test 2: Image generation
    log::info!("🎨 Testing image generation...");

    let image_request = ImageGenerationRequest::new(
        "A serene landscape with mountains and a lake at sunset, digital art style",
    )
    .with_aspect_ratio("16:9");

    match client.image().generate(image_request).await {
        Ok(response) => {
            log::info!("✅ Image generation successful!");
            log::info!("🤖 Model used: {}", response.model);
            log::info!(
                "📏 Image: {}x{}, color: {:?}",
                response.width,
                response.height,
                response.color
            );

            let filename = format!("generated_image_{}.png", chrono::Utc::now().timestamp());
            match response.image.save_with_format(&filename, ImageFormat::Png) {
                Ok(_) => log::info!("💾 Image saved to: {}", filename),
                Err(e) => log::error!("❌ Failed to save image: {}", e),
            }
        }
        Err(e) => {
            log::error!("❌ Image generation failed: {}", e);
            log::warn!("💡 This model might not be available through your endpoint");
        }
    }

    log::info!("🎉 All tests completed!");
    Ok(())
}

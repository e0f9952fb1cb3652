use crate::error::{ProviderError, Result};
use crate::openai::codec;
use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::time::Duration;

/// Timeout for secondary GETs that recover images referenced by URL.
const URL_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Markdown image whose target is an inline base64 data URI.
static MARKDOWN_DATA_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[.*?\]\((data:image/[^;]+;base64,[A-Za-z0-9+/=]+)\)").unwrap()
});

/// Markdown image whose target is an http(s) URL.
static MARKDOWN_HTTP_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[.*?\]\((https?://[^\s)]+)\)").unwrap());

/// Bare URL ending in a known image extension, optional query string.
static PLAIN_IMAGE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(https?://[^\s)\]]+\.(?:png|jpg|jpeg|gif|webp|bmp)(?:\?[^\s)\]]*)?)").unwrap()
});

/// Bare base64 data URI anywhere in a string.
static BARE_DATA_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"data:image/[^;]+;base64,([A-Za-z0-9+/=]+)").unwrap());

/// Pulls a decoded image out of whichever response shape the upstream proxy
/// happened to emit.
///
/// Different backend models and proxy versions have been observed returning
/// Gemini REST payloads, a custom `multi_mod_content` field, standard OpenAI
/// content-part lists, or plain text with the image smuggled in as Markdown,
/// base64, or a URL. The shapes are tried in a fixed priority order, preferring
/// structured binary sources over text scraping; the first hit wins and a miss
/// on one shape never aborts the chain.
#[derive(Debug, Clone)]
pub struct ImageExtractor {
    http: reqwest::Client,
}

impl ImageExtractor {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(URL_FETCH_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::ClientError(e.to_string()))?;
        Ok(Self { http })
    }

    pub async fn extract(&self, raw: &Value) -> Result<DynamicImage> {
        // 1. Gemini REST shape forwarded verbatim by some proxies.
        if let Some(image) = rest_candidates_image(raw)? {
            return Ok(image);
        }

        // 2. Past this point only choice-based shapes remain, so an empty
        //    choices list is already fatal.
        let message = match raw
            .get("choices")
            .and_then(Value::as_array)
            .filter(|choices| !choices.is_empty())
        {
            Some(choices) => &choices[0]["message"],
            None => {
                log::error!("No choices in response. Raw response: {}", raw);
                return Err(ProviderError::ResponseError(format!(
                    "API returned no choices. Raw response: {}",
                    raw
                )));
            }
        };

        // 3. Custom multi-modal field emitted by some proxies.
        if let Some(image) = multi_mod_content_image(message)? {
            return Ok(image);
        }

        // 4/5. Standard message content, list-valued or string-valued.
        match message.get("content") {
            Some(Value::Array(parts)) => {
                if let Some(image) = content_parts_image(parts)? {
                    return Ok(image);
                }
            }
            Some(Value::String(text)) => {
                if let Some(image) = self.scrape_text_content(text).await? {
                    return Ok(image);
                }
            }
            _ => {}
        }

        let content = message.get("content");
        log::error!(
            "Unable to extract image. Message content type: {}, content: {}, raw response: {}",
            content.map(json_type_name).unwrap_or("absent"),
            content.unwrap_or(&Value::Null),
            raw
        );
        Err(ProviderError::ResponseError(
            "No valid multimodal response received from the API".to_string(),
        ))
    }

    /// String-content sub-chain: Markdown data URI, Markdown http URL, bare
    /// image URL, bare data URI. Fetch and decode failures here are warnings,
    /// not errors; a later sub-stage may still produce the image.
    async fn scrape_text_content(&self, text: &str) -> Result<Option<DynamicImage>> {
        if let Some(captures) = MARKDOWN_DATA_URI.captures(text) {
            let data_uri = &captures[1];
            log::debug!("Found Markdown data URI, length: {}", data_uri.len());
            match codec::decode_data_uri(data_uri) {
                Ok(image) => return Ok(Some(image)),
                Err(e) => log::warn!("Failed to decode Markdown data URI: {}", e),
            }
        }

        if let Some(captures) = MARKDOWN_HTTP_URL.captures(text) {
            let url = &captures[1];
            log::debug!("Found Markdown image URL: {}", url);
            match self.fetch_image(url).await {
                Ok(image) => return Ok(Some(image)),
                Err(e) => log::warn!("Failed to download image from Markdown URL: {}", e),
            }
        }

        if let Some(captures) = PLAIN_IMAGE_URL.captures(text) {
            let url = &captures[1];
            log::debug!("Found plain image URL: {}", url);
            match self.fetch_image(url).await {
                Ok(image) => return Ok(Some(image)),
                Err(e) => log::warn!("Failed to download image from plain URL: {}", e),
            }
        }

        if let Some(captures) = BARE_DATA_URI.captures(text) {
            log::debug!("Found bare base64 image data in string");
            match codec::decode_base64_image(&captures[1]) {
                Ok(image) => return Ok(Some(image)),
                Err(e) => log::warn!("Failed to decode base64 image from string: {}", e),
            }
        }

        Ok(None)
    }

    async fn fetch_image(&self, url: &str) -> Result<DynamicImage> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::HttpError(format!(
                "GET {} returned status {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;
        codec::decode_image_bytes(&bytes)
    }
}

/// Stage 1: `{"response": {"candidates": [{"content": {"parts": [...]}}]}}`.
///
/// Parts carry either `inline_data` (base64 image bytes) or `text` that may
/// itself wrap a Markdown data URI. Malformed inline data inside a matched
/// shape is an error; a Markdown decode miss just moves on.
fn rest_candidates_image(raw: &Value) -> Result<Option<DynamicImage>> {
    let parts = match raw["response"]["candidates"][0]["content"]["parts"].as_array() {
        Some(parts) => parts,
        None => return Ok(None),
    };

    for part in parts {
        if let Some(data) = part["inline_data"]["data"].as_str() {
            let image = codec::decode_base64_image(data)?;
            log::info!(
                "Extracted image from candidates inline_data: {}x{}, {:?}",
                image.width(),
                image.height(),
                image.color()
            );
            return Ok(Some(image));
        }
        if let Some(text) = part["text"].as_str() {
            log::debug!("Candidates response text: {}", truncate(text, 100));
            if let Some(captures) = MARKDOWN_DATA_URI.captures(text) {
                match codec::decode_data_uri(&captures[1]) {
                    Ok(image) => {
                        log::info!(
                            "Extracted image from candidates Markdown: {}x{}, {:?}",
                            image.width(),
                            image.height(),
                            image.color()
                        );
                        return Ok(Some(image));
                    }
                    Err(e) => {
                        log::warn!("Failed to decode Markdown data URI in candidates text: {}", e)
                    }
                }
            }
        }
    }
    Ok(None)
}

/// Stage 3: non-standard `multi_mod_content` list on the message.
fn multi_mod_content_image(message: &Value) -> Result<Option<DynamicImage>> {
    let parts = match message["multi_mod_content"].as_array() {
        Some(parts) => parts,
        None => return Ok(None),
    };

    for part in parts {
        if let Some(text) = part["text"].as_str() {
            log::debug!("Multi-modal response text: {}", truncate(text, 100));
        }
        if let Some(data) = part["inline_data"]["data"].as_str() {
            let image = codec::decode_base64_image(data)?;
            log::debug!(
                "Extracted image from multi_mod_content: {}x{}, {:?}",
                image.width(),
                image.height(),
                image.color()
            );
            return Ok(Some(image));
        }
    }
    Ok(None)
}

/// Stage 4: standard list-valued content with typed parts. The `image_url`
/// value may be an object with a `url` field or the URL string directly.
fn content_parts_image(parts: &[Value]) -> Result<Option<DynamicImage>> {
    for part in parts {
        match part["type"].as_str() {
            Some("image_url") => {
                let url = part["image_url"]["url"]
                    .as_str()
                    .or_else(|| part["image_url"].as_str())
                    .unwrap_or("");
                if url.starts_with("data:image") {
                    let image = codec::decode_data_uri(url)?;
                    log::debug!(
                        "Extracted image from content part: {}x{}, {:?}",
                        image.width(),
                        image.height(),
                        image.color()
                    );
                    return Ok(Some(image));
                }
            }
            Some("text") => {
                if let Some(text) = part["text"].as_str() {
                    log::debug!("Content part text: {}", truncate(text, 100));
                }
            }
            _ => {}
        }
    }
    Ok(None)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use image::{ImageFormat, Rgb, RgbImage};
    use serde_json::json;
    use std::io::Cursor;

    fn solid_image(pixel: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb(pixel)))
    }

    fn png_base64(pixel: [u8; 3]) -> String {
        let mut buffer = Cursor::new(Vec::new());
        solid_image(pixel)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        BASE64.encode(buffer.into_inner())
    }

    fn png_bytes(pixel: [u8; 3]) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        solid_image(pixel)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    fn data_uri(pixel: [u8; 3]) -> String {
        format!("data:image/png;base64,{}", png_base64(pixel))
    }

    fn assert_pixel(image: &DynamicImage, pixel: [u8; 3]) {
        assert_eq!(image.to_rgb8().get_pixel(0, 0).0, pixel);
    }

    fn extractor() -> ImageExtractor {
        ImageExtractor::new().unwrap()
    }

    const RED: [u8; 3] = [255, 0, 0];
    const BLUE: [u8; 3] = [0, 0, 255];

    #[tokio::test]
    async fn test_stage1_rest_candidates_inline_data() {
        let raw = json!({
            "response": {
                "candidates": [{
                    "content": {
                        "parts": [
                            {"text": "here you go"},
                            {"inline_data": {"mime_type": "image/png", "data": png_base64(RED)}}
                        ]
                    }
                }]
            }
        });
        let image = extractor().extract(&raw).await.unwrap();
        assert_pixel(&image, RED);
    }

    #[tokio::test]
    async fn test_stage1_rest_candidates_markdown_text() {
        let raw = json!({
            "response": {
                "candidates": [{
                    "content": {
                        "parts": [{"text": format!("![generated]({})", data_uri(RED))}]
                    }
                }]
            }
        });
        let image = extractor().extract(&raw).await.unwrap();
        assert_pixel(&image, RED);
    }

    #[tokio::test]
    async fn test_stage1_wins_over_choice_content() {
        // Both shapes present: the structured candidates image must win.
        let raw = json!({
            "response": {
                "candidates": [{
                    "content": {
                        "parts": [{"inline_data": {"data": png_base64(RED)}}]
                    }
                }]
            },
            "choices": [{
                "message": {"role": "assistant", "content": data_uri(BLUE)}
            }]
        });
        let image = extractor().extract(&raw).await.unwrap();
        assert_pixel(&image, RED);
    }

    #[tokio::test]
    async fn test_stage2_empty_choices_is_fatal() {
        let raw = json!({"choices": []});
        let err = extractor().extract(&raw).await.unwrap_err();
        assert!(err.to_string().contains("no choices"), "got: {}", err);
    }

    #[tokio::test]
    async fn test_stage2_missing_choices_is_fatal() {
        let raw = json!({"id": "resp-1"});
        let err = extractor().extract(&raw).await.unwrap_err();
        assert!(err.to_string().contains("no choices"), "got: {}", err);
    }

    #[tokio::test]
    async fn test_stage3_multi_mod_content() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "multi_mod_content": [
                        {"text": "rendered"},
                        {"inline_data": {"data": png_base64(RED)}}
                    ]
                }
            }]
        });
        let image = extractor().extract(&raw).await.unwrap();
        assert_pixel(&image, RED);
    }

    #[tokio::test]
    async fn test_stage3_wins_over_string_content() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": data_uri(BLUE),
                    "multi_mod_content": [{"inline_data": {"data": png_base64(RED)}}]
                }
            }]
        });
        let image = extractor().extract(&raw).await.unwrap();
        assert_pixel(&image, RED);
    }

    #[tokio::test]
    async fn test_stage4_content_parts_object_url() {
        // The worked example: image_url part wrapping a data URI.
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": [
                        {"type": "text", "text": "a red circle"},
                        {"type": "image_url", "image_url": {"url": data_uri(RED)}}
                    ]
                }
            }]
        });
        let image = extractor().extract(&raw).await.unwrap();
        assert_pixel(&image, RED);
        // Lossless payload, so the decoded bytes re-encode to the same pixels.
        assert_eq!(image.to_rgb8(), solid_image(RED).to_rgb8());
    }

    #[tokio::test]
    async fn test_stage4_content_parts_string_url() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": [{"type": "image_url", "image_url": data_uri(RED)}]
                }
            }]
        });
        let image = extractor().extract(&raw).await.unwrap();
        assert_pixel(&image, RED);
    }

    #[tokio::test]
    async fn test_stage5a_markdown_data_uri() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": format!("Here is your image: ![img]({})", data_uri(RED))
                }
            }]
        });
        let image = extractor().extract(&raw).await.unwrap();
        assert_pixel(&image, RED);
    }

    #[tokio::test]
    async fn test_stage5b_markdown_http_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/out.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(png_bytes(RED))
            .create_async()
            .await;

        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": format!("![generated]({}/out.png)", server.url())
                }
            }]
        });
        let image = extractor().extract(&raw).await.unwrap();
        assert_pixel(&image, RED);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stage5c_plain_url_with_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/images/out.PNG")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(png_bytes(RED))
            .create_async()
            .await;

        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": format!("your image is at {}/images/out.PNG?v=2 enjoy", server.url())
                }
            }]
        });
        let image = extractor().extract(&raw).await.unwrap();
        assert_pixel(&image, RED);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stage5d_bare_data_uri() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": format!("payload follows {} end", data_uri(RED))
                }
            }]
        });
        let image = extractor().extract(&raw).await.unwrap();
        assert_pixel(&image, RED);
    }

    #[tokio::test]
    async fn test_failed_fetch_falls_through_to_bare_data_uri() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/gone.png")
            .with_status(404)
            .create_async()
            .await;

        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": format!(
                        "![broken]({}/gone.png) but also {}",
                        server.url(),
                        data_uri(RED)
                    )
                }
            }]
        });
        let image = extractor().extract(&raw).await.unwrap();
        assert_pixel(&image, RED);
    }

    #[tokio::test]
    async fn test_failed_fetch_as_last_stage_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/gone.png")
            .with_status(404)
            .create_async()
            .await;

        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": format!("![broken]({}/gone.png)", server.url())
                }
            }]
        });
        let err = extractor().extract(&raw).await.unwrap_err();
        assert!(
            err.to_string().contains("No valid multimodal response"),
            "got: {}",
            err
        );
    }

    #[tokio::test]
    async fn test_plain_text_content_is_no_match() {
        let raw = json!({
            "choices": [{
                "message": {"role": "assistant", "content": "I cannot draw that."}
            }]
        });
        let err = extractor().extract(&raw).await.unwrap_err();
        assert!(err.to_string().contains("No valid multimodal response"));
    }

    #[tokio::test]
    async fn test_unknown_part_types_are_skipped() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": [
                        {"type": "refusal", "refusal": "no"},
                        {"type": "image_url", "image_url": {"url": data_uri(RED)}}
                    ]
                }
            }]
        });
        let image = extractor().extract(&raw).await.unwrap();
        assert_pixel(&image, RED);
    }

    #[test]
    fn test_plain_url_regex_extensions() {
        for url in [
            "https://cdn.example.com/a.png",
            "http://cdn.example.com/b.JPEG",
            "https://cdn.example.com/c.webp?sig=abc",
        ] {
            assert!(PLAIN_IMAGE_URL.is_match(url), "should match: {}", url);
        }
        assert!(!PLAIN_IMAGE_URL.is_match("https://example.com/page.html"));
        assert!(!PLAIN_IMAGE_URL.is_match("see attachment.png locally"));
    }
}

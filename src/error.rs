use std::fmt;

#[derive(Debug)]
pub enum ProviderError {
    ConfigError(String),
    ClientError(String),
    RequestError(String),
    ResponseError(String),
    SerializationError(String),
    ImageError(String),
    HttpError(String),
    GenerationError(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            ProviderError::ClientError(msg) => write!(f, "Client error: {}", msg),
            ProviderError::RequestError(msg) => write!(f, "Request error: {}", msg),
            ProviderError::ResponseError(msg) => write!(f, "Response error: {}", msg),
            ProviderError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            ProviderError::ImageError(msg) => write!(f, "Image error: {}", msg),
            ProviderError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            ProviderError::GenerationError(msg) => write!(f, "Generation error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

pub type Result<T> = std::result::Result<T, ProviderError>;

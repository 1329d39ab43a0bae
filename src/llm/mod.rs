pub mod models;
pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use models::GenerationRequest;
use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
        }
    }
}

impl Error for LlmError {}

/// A single text-in/text-out model call. Every pipeline stage goes through
/// this seam, so tests can swap the hosted model for a scripted one.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError>;
}

pub struct LlmManager {
    generator: Box<dyn TextGenerator + Send + Sync>,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let generator: Box<dyn TextGenerator + Send + Sync> = match config.backend.as_str() {
            "vertex" => Box::new(providers::vertex::VertexProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self { generator })
    }

    /// Wraps an already-built generator. Lets tests drive the pipeline with a
    /// scripted model.
    pub fn from_generator(generator: Box<dyn TextGenerator + Send + Sync>) -> Self {
        Self { generator }
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        self.generator.generate(request).await
    }
}

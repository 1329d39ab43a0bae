use crate::config::LlmConfig;
use crate::llm::models::GenerationRequest;
use crate::llm::{LlmError, TextGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
}

#[derive(Serialize, Debug)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    options: OllamaOptions,
    stream: bool,
}

#[derive(Serialize, Debug)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
    num_predict: usize,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434/api/generate".to_string());

        let client = reqwest::Client::new();

        Ok(Self {
            client,
            api_url,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let wire_request = OllamaRequest {
            model: self.model.clone(),
            prompt: request.prompt.clone(),
            system: request.system_instruction.clone(),
            format: request.config.json_output.then(|| "json".to_string()),
            options: OllamaOptions {
                temperature: request.config.temperature,
                top_p: request.config.top_p,
                seed: request.config.seed,
                num_predict: request.config.max_output_tokens,
            },
            stream: false, // Explicitly disable streaming
        };

        debug!("Sending request to Ollama with model: {}", self.model);

        let response = self
            .client
            .post(&self.api_url)
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = match response.text().await {
                Ok(body) => format!(" - Response body: {}", body),
                Err(_) => String::new(),
            };

            return Err(LlmError::ResponseError(format!(
                "Ollama API responded with status code: {}{}",
                status, error_body
            )));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        if ollama_response.response.trim().is_empty() {
            return Err(LlmError::ResponseError("Model returned empty text".to_string()));
        }

        Ok(ollama_response.response)
    }
}

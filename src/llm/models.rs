use serde::{Deserialize, Serialize};

/// Sampling knobs for one model call. Stages that parse the output
/// deterministically pin temperature to zero and fix the seed; the freer
/// stages (SQL, insight) run slightly warmer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub seed: Option<i64>,
    pub max_output_tokens: usize,
    /// Constrain the model to emit valid JSON.
    pub json_output: bool,
}

impl GenerationConfig {
    /// Deterministic profile used by the structured stages
    /// (simplify, verify, chart selection).
    pub fn deterministic(max_output_tokens: usize) -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            seed: Some(0),
            max_output_tokens,
            json_output: false,
        }
    }

    pub fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_p: 1.0,
            seed: None,
            max_output_tokens: 8000,
            json_output: false,
        }
    }
}

/// One prompt plus its sampling configuration.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_instruction: Option<String>,
    pub prompt: String,
    pub config: GenerationConfig,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, config: GenerationConfig) -> Self {
        Self {
            system_instruction: None,
            prompt: prompt.into(),
            config,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }
}

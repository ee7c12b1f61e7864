use serde::{Deserialize, Serialize};

use crate::types::Turn;

/// Body of a `POST chat/completions` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// The model identifier, e.g. `deepseek-chat`.
    pub model: String,

    /// The full ordered conversation, system turn first.
    pub messages: Vec<Turn>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Whether the response should be delivered incrementally as SSE.
    #[serde(default)]
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// Create a non-streaming request.
    pub fn new(model: impl Into<String>, messages: Vec<Turn>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            stream: false,
        }
    }

    /// Create a request asking for incremental delivery.
    pub fn streaming(model: impl Into<String>, messages: Vec<Turn>) -> Self {
        Self {
            stream: true,
            ..Self::new(model, messages)
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

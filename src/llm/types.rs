//! Request/response types shared by all LLM backends.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token accounting for one or more generations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt: u64,
    pub completion: u64,
    pub total: u64,
}

impl Usage {
    pub fn add(&mut self, other: Usage) {
        self.prompt += other.prompt;
        self.completion += other.completion;
        self.total += other.total;
    }
}

/// A single chat-completion request. Defaults mirror a deterministic
/// single-candidate call; stages override what they need.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub model: String,
    pub n: u32,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop: Vec<String>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            n: 1,
            temperature: 0.0,
            max_tokens: 2048,
            stop: Vec::new(),
        }
    }

    pub fn n(mut self, n: u32) -> Self {
        self.n = n;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }
}

/// One backend response: the candidate completions plus token usage.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    pub candidates: Vec<String>,
    pub usage: Usage,
}

impl Generation {
    /// First candidate, if the backend returned any
    pub fn first(&self) -> Option<&str> {
        self.candidates.first().map(String::as_str)
    }
}

/// Backend failure modes.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("no api keys available")]
    NoKeys,

    #[error("all {attempts} attempts failed, last error: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("every backend in the chain failed: {0}")]
    ChainExhausted(String),
}

impl LlmError {
    /// Whether rotating to another key and retrying could help.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Api { status, .. } => {
                matches!(status, 401 | 403 | 429) || *status >= 500
            }
            LlmError::Network(_) => true,
            _ => false,
        }
    }
}

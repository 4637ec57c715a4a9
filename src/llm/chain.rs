//! Ordered fallback over multiple backends.

use std::sync::Arc;

use async_trait::async_trait;
use log::warn;

use super::LlmBackend;
use super::types::{GenerateRequest, Generation, LlmError};

/// Tries each backend in order and returns the first usable generation. A
/// generation with no non-empty first candidate counts as a failure and the
/// chain falls through to the next backend.
pub struct FallbackChain {
    backends: Vec<Arc<dyn LlmBackend>>,
}

impl FallbackChain {
    pub fn new(backends: Vec<Arc<dyn LlmBackend>>) -> Self {
        Self { backends }
    }
}

#[async_trait]
impl LlmBackend for FallbackChain {
    fn name(&self) -> &'static str {
        "mix"
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<Generation, LlmError> {
        let mut failures = Vec::new();
        for backend in &self.backends {
            match backend.generate(req).await {
                Ok(generation) if generation.first().is_some_and(|c| !c.is_empty()) => {
                    return Ok(generation);
                }
                Ok(_) => {
                    warn!("backend {} returned an empty generation", backend.name());
                    failures.push(format!("{}: empty generation", backend.name()));
                }
                Err(e) => {
                    warn!("backend {} failed: {e}", backend.name());
                    failures.push(format!("{}: {e}", backend.name()));
                }
            }
        }
        Err(LlmError::ChainExhausted(failures.join("; ")))
    }
}

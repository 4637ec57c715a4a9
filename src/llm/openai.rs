//! OpenAI chat-completions backend with key rotation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde_json::{Value, json};

use super::LlmBackend;
use super::types::{GenerateRequest, Generation, LlmError, Usage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible backend. Holds a pool of API keys and rotates to the
/// next one whenever a request fails retryably, sleeping between attempts.
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    keys: Vec<String>,
    key_index: AtomicUsize,
    max_attempts: u32,
    retry_delay: Duration,
}

impl OpenAiBackend {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            keys,
            key_index: AtomicUsize::new(0),
            max_attempts: 10,
            retry_delay: Duration::from_secs(5),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn current_key(&self) -> Result<&str, LlmError> {
        if self.keys.is_empty() {
            return Err(LlmError::NoKeys);
        }
        let idx = self.key_index.load(Ordering::Relaxed) % self.keys.len();
        Ok(&self.keys[idx])
    }

    fn rotate_key(&self) {
        self.key_index.fetch_add(1, Ordering::Relaxed);
    }

    async fn attempt(&self, req: &GenerateRequest) -> Result<Generation, LlmError> {
        let key = self.current_key()?;
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&chat_body(req))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await?;
        parse_chat_response(&body)
    }
}

/// Build the chat-completions request body.
pub(super) fn chat_body(req: &GenerateRequest) -> Value {
    let mut body = json!({
        "model": req.model,
        "n": req.n,
        "messages": [
            {"role": "system", "content": "You are a helpful assistant."},
            {"role": "user", "content": req.prompt},
        ],
        "temperature": req.temperature,
        "max_tokens": req.max_tokens,
        "top_p": 0.95,
        "frequency_penalty": 0,
        "presence_penalty": 0,
    });
    if !req.stop.is_empty() {
        body["stop"] = json!(req.stop);
    }
    body
}

/// Pull candidates and usage out of a chat-completions response body.
pub(super) fn parse_chat_response(body: &Value) -> Result<Generation, LlmError> {
    let choices = body["choices"]
        .as_array()
        .ok_or_else(|| LlmError::InvalidResponse("missing choices array".to_string()))?;
    let candidates = choices
        .iter()
        .map(|c| {
            c["message"]["content"]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| LlmError::InvalidResponse("choice without content".to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let usage = Usage {
        prompt: body["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
        completion: body["usage"]["completion_tokens"].as_u64().unwrap_or(0),
        total: body["usage"]["total_tokens"].as_u64().unwrap_or(0),
    };
    Ok(Generation { candidates, usage })
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<Generation, LlmError> {
        let mut last = String::new();
        for attempt in 1..=self.max_attempts {
            match self.attempt(req).await {
                Ok(generation) => return Ok(generation),
                Err(e) if e.is_retryable() => {
                    warn!(
                        "openai attempt {attempt}/{} failed, rotating key: {e}",
                        self.max_attempts
                    );
                    last = e.to_string();
                    self.rotate_key();
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(LlmError::Exhausted {
            attempts: self.max_attempts,
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_body_shape() {
        let req = GenerateRequest::new("write a domain", "gpt-4-0125-preview")
            .n(3)
            .temperature(0.5);
        let body = chat_body(&req);
        assert_eq!(body["model"], "gpt-4-0125-preview");
        assert_eq!(body["n"], 3);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "write a domain");
        assert_eq!(body["top_p"], 0.95);
        assert!(body.get("stop").is_none());
    }

    #[test]
    fn test_chat_body_with_stop() {
        let req = GenerateRequest::new("p", "m").stop(vec!["##".to_string()]);
        let body = chat_body(&req);
        assert_eq!(body["stop"][0], "##");
    }

    #[test]
    fn test_parse_chat_response() {
        let body = json!({
            "choices": [
                {"message": {"content": "first"}},
                {"message": {"content": "second"}},
            ],
            "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30},
        });
        let generation = parse_chat_response(&body).unwrap();
        assert_eq!(generation.candidates, vec!["first", "second"]);
        assert_eq!(generation.usage.total, 30);
    }

    #[test]
    fn test_parse_chat_response_missing_choices() {
        let err = parse_chat_response(&json!({"error": "oops"})).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[test]
    fn test_no_keys() {
        let backend = OpenAiBackend::new(vec![]);
        assert!(matches!(backend.current_key(), Err(LlmError::NoKeys)));
    }

    #[test]
    fn test_key_rotation_wraps() {
        let backend = OpenAiBackend::new(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(backend.current_key().unwrap(), "a");
        backend.rotate_key();
        assert_eq!(backend.current_key().unwrap(), "b");
        backend.rotate_key();
        assert_eq!(backend.current_key().unwrap(), "a");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_exhausts() {
        let backend = OpenAiBackend::new(vec!["k".to_string()])
            .base_url("http://127.0.0.1:1")
            .max_attempts(2)
            .retry_delay(Duration::from_millis(0));
        let err = backend
            .generate(&GenerateRequest::new("p", "m"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Exhausted { attempts: 2, .. }));
    }
}

//! Azure OpenAI backend.
//!
//! Same chat-completions contract as the OpenAI backend but addressed per
//! deployment and authenticated with an `api-key` header. Azure routes the
//! model through the deployment name, so the request body omits `model`.

use async_trait::async_trait;
use serde_json::Value;

use super::LlmBackend;
use super::openai::{chat_body, parse_chat_response};
use super::types::{GenerateRequest, Generation, LlmError};
use crate::error::ForgeError;

const DEFAULT_API_VERSION: &str = "2024-02-01";

pub struct AzureBackend {
    client: reqwest::Client,
    endpoint: String,
    deployment: String,
    api_version: String,
    key: String,
}

impl AzureBackend {
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            deployment: deployment.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            key: key.into(),
        }
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Build from `AZURE_OPENAI_ENDPOINT`, `AZURE_OPENAI_KEY` and
    /// `AZURE_OPENAI_DEPLOYMENT`.
    pub fn from_env() -> crate::Result<Self> {
        let endpoint = std::env::var("AZURE_OPENAI_ENDPOINT")
            .map_err(|_| ForgeError::Config("AZURE_OPENAI_ENDPOINT is not set".to_string()))?;
        let key = std::env::var("AZURE_OPENAI_KEY")
            .map_err(|_| ForgeError::Config("AZURE_OPENAI_KEY is not set".to_string()))?;
        let deployment = std::env::var("AZURE_OPENAI_DEPLOYMENT")
            .map_err(|_| ForgeError::Config("AZURE_OPENAI_DEPLOYMENT is not set".to_string()))?;
        Ok(Self::new(endpoint, deployment, key))
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

#[async_trait]
impl LlmBackend for AzureBackend {
    fn name(&self) -> &'static str {
        "azure"
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<Generation, LlmError> {
        let mut body = chat_body(req);
        if let Value::Object(map) = &mut body {
            map.remove("model");
        }

        let response = self
            .client
            .post(self.url())
            .header("api-key", &self.key)
            .json(&body)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_shape() {
        let backend = AzureBackend::new("https://unit.openai.azure.com/", "gpt4-east", "k");
        assert_eq!(
            backend.url(),
            "https://unit.openai.azure.com/openai/deployments/gpt4-east/chat/completions?api-version=2024-02-01"
        );
    }

    #[test]
    fn test_api_version_override() {
        let backend =
            AzureBackend::new("https://unit.openai.azure.com", "d", "k").api_version("2023-05-15");
        assert!(backend.url().ends_with("api-version=2023-05-15"));
    }

    #[test]
    fn test_body_omits_model() {
        let req = GenerateRequest::new("p", "gpt-4");
        let mut body = chat_body(&req);
        if let Value::Object(map) = &mut body {
            map.remove("model");
        }
        assert!(body.get("model").is_none());
        assert_eq!(body["messages"][1]["content"], "p");
    }
}

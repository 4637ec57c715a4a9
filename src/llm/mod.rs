//! LLM backends: OpenAI, Azure, and the ordered fallback chain.

pub mod azure;
pub mod chain;
pub mod openai;
pub mod types;

pub use azure::AzureBackend;
pub use chain::FallbackChain;
pub use openai::OpenAiBackend;
pub use types::{GenerateRequest, Generation, LlmError, Usage};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{ApiType, LlmSettings};
use crate::error::ForgeError;
use crate::Result;

/// A chat-completion provider.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn generate(&self, req: &GenerateRequest) -> std::result::Result<Generation, LlmError>;
}

/// Read API keys from a file, one per line, blank lines skipped.
pub fn read_keys(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    let keys: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if keys.is_empty() {
        return Err(ForgeError::Config(format!(
            "no api keys found in {}",
            path.display()
        )));
    }
    Ok(keys)
}

/// Assemble the backend selected on the command line. `mix` means Azure
/// first, falling back to OpenAI.
pub fn build_backend(
    api_type: ApiType,
    keys_file: &Path,
    settings: &LlmSettings,
) -> Result<Arc<dyn LlmBackend>> {
    let openai = || -> Result<Arc<dyn LlmBackend>> {
        Ok(Arc::new(
            OpenAiBackend::new(read_keys(keys_file)?)
                .max_attempts(settings.retry_attempts)
                .retry_delay(Duration::from_millis(settings.retry_delay_ms)),
        ))
    };
    match api_type {
        ApiType::OpenAi => openai(),
        ApiType::Azure => Ok(Arc::new(AzureBackend::from_env()?)),
        ApiType::Mix => {
            let chain = FallbackChain::new(vec![Arc::new(AzureBackend::from_env()?), openai()?]);
            Ok(Arc::new(chain))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sk-one").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  sk-two  ").unwrap();
        let keys = read_keys(file.path()).unwrap();
        assert_eq!(keys, vec!["sk-one", "sk-two"]);
    }

    #[test]
    fn test_read_keys_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = read_keys(file.path()).unwrap_err();
        assert!(matches!(err, ForgeError::Config(_)));
    }

    #[test]
    fn test_read_keys_missing_file() {
        let err = read_keys(Path::new("/nonexistent/keys.txt")).unwrap_err();
        assert!(matches!(err, ForgeError::Io(_)));
    }

    #[test]
    fn test_build_openai_backend() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sk-test").unwrap();
        let backend =
            build_backend(ApiType::OpenAi, file.path(), &LlmSettings::default()).unwrap();
        assert_eq!(backend.name(), "openai");
    }
}

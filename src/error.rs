//! Error types for planforge
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::extract::ExtractError;
use crate::llm::LlmError;
use crate::pddl::ParseError;

/// All error types that can occur in planforge
#[derive(Debug, Error)]
pub enum ForgeError {
    /// A required field is absent from an input record
    #[error("Missing field '{0}' in input record")]
    MissingField(String),

    /// Prompt template loading or substitution error
    #[error("Template error: {0}")]
    Template(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// LLM backend error (credentials exhausted, bad response, ...)
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// No structured artifact could be extracted from model output
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// External grammar parser error
    #[error("Domain parser error: {0}")]
    Parser(#[from] ParseError),

    /// Worker pool error
    #[error("Pool error: {0}")]
    Pool(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for planforge operations
pub type Result<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_error() {
        let err = ForgeError::MissingField("description".to_string());
        assert_eq!(err.to_string(), "Missing field 'description' in input record");
    }

    #[test]
    fn test_config_error() {
        let err = ForgeError::Config("no API keys".to_string());
        assert_eq!(err.to_string(), "Config error: no API keys");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ForgeError = io_err.into();
        assert!(matches!(err, ForgeError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: ForgeError = json_err.into();
        assert!(matches!(err, ForgeError::Json(_)));
    }

    #[test]
    fn test_extract_error_conversion() {
        let err: ForgeError = ExtractError::MissingBlock { tag: "pddl".to_string() }.into();
        assert!(err.to_string().contains("pddl"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(ForgeError::Pool("worker died".to_string()))
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}

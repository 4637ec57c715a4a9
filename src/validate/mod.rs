//! Artifact validation: the deterministic gate of the correction loop.

pub mod domain;
pub mod interface;

pub use domain::DomainValidator;
pub use interface::InterfaceValidator;

use async_trait::async_trait;

use crate::Result;
use crate::scratch::ScratchHandle;

/// Binary validation verdict. The diagnostic is quoted verbatim into the
/// next correction prompt, so failures carry human-readable text, never
/// bare booleans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub passed: bool,
    pub diagnostic: String,
}

impl ValidationResult {
    /// A passing verdict with an empty diagnostic
    pub fn pass() -> Self {
        Self {
            passed: true,
            diagnostic: String::new(),
        }
    }

    /// A failing verdict carrying the diagnostic text
    pub fn fail(diagnostic: impl Into<String>) -> Self {
        Self {
            passed: false,
            diagnostic: diagnostic.into(),
        }
    }
}

/// Checks one artifact kind. Pure apart from the scratch file it must clean
/// up after itself, success or failure.
#[async_trait]
pub trait ArtifactValidator<A>: Send + Sync {
    async fn check(&self, artifact: &A, scratch: &ScratchHandle) -> Result<ValidationResult>;
}

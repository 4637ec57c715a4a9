//! Artifact extraction from free-form model output.
//!
//! Models wrap the structured part of a response in a fenced code block.
//! Extraction pulls that block out; a missing or malformed block is a
//! recoverable failure that feeds the correction loop, never a panic.

pub mod fence;
pub mod mapping;

pub use fence::PddlExtractor;
pub use mapping::{MappingExtractor, NlInterface};

use thiserror::Error;

/// Failure to locate or parse the structured block in a response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// No fenced block with the expected language tag was found
    #[error("no fenced ```{tag}``` block found in model response")]
    MissingBlock { tag: String },

    /// A mapping block was found but is not a flat name-to-template literal
    #[error("error when parsing the name-to-template mapping: {0}")]
    MappingSyntax(String),
}

/// An extracted artifact plus the verbatim block text for the audit trace.
#[derive(Debug, Clone)]
pub struct Extracted<A> {
    /// Trimmed interior of the fenced block, exactly as the model wrote it
    pub raw: String,
    /// The parsed artifact value
    pub value: A,
}

/// Pulls one kind of structured artifact out of raw model text.
pub trait Extractor: Send + Sync {
    type Artifact: Clone + Send + Sync + 'static;

    /// Extract the artifact from `response`, keeping the raw block text.
    fn extract(&self, response: &str) -> Result<Extracted<Self::Artifact>, ExtractError>;
}

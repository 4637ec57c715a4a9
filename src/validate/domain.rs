//! Domain validation against the external grammar parser.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use super::{ArtifactValidator, ValidationResult};
use crate::Result;
use crate::pddl::DomainParser;
use crate::scratch::ScratchHandle;

/// Materializes a candidate domain to the scratch path and asks the external
/// parser to accept it. Any parser rejection becomes a failing verdict whose
/// diagnostic is the parser's kind, message and trace text.
pub struct DomainValidator {
    parser: Arc<dyn DomainParser>,
}

impl DomainValidator {
    pub fn new(parser: Arc<dyn DomainParser>) -> Self {
        Self { parser }
    }
}

#[async_trait]
impl ArtifactValidator<String> for DomainValidator {
    async fn check(&self, artifact: &String, scratch: &ScratchHandle) -> Result<ValidationResult> {
        let path = scratch.materialize(artifact)?;
        let outcome = self.parser.parse(path).await;
        scratch.cleanup();
        match outcome {
            Ok(table) => {
                debug!("domain parsed, {} symbols", table.len());
                Ok(ValidationResult::pass())
            }
            Err(e) => Ok(ValidationResult::fail(e.to_string())),
        }
    }
}

//! Planforge - closed-loop synthesis of planning-agent training data
//!
//! Planforge drives an LLM through a multi-stage pipeline (description
//! evolution, domain generation, natural-language interface generation,
//! problem generation) where each structured artifact is validated against a
//! formal contract and repaired through a cumulative correction loop.

pub mod config;
pub mod correction;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod llm;
pub mod pddl;
pub mod pool;
pub mod prompt;
pub mod scratch;
pub mod stages;
pub mod validate;

pub use error::{ForgeError, Result};

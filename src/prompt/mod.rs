//! Prompt templates and placeholder substitution.
//!
//! Templates are plain text files with bracketed placeholders such as
//! `[Description]`. Substitution is literal string replacement, no template
//! engine, so template authors never need to escape anything else.

pub mod loader;

pub use loader::PromptLoader;

use std::path::Path;

use crate::Result;

/// Replace every `[Name]` placeholder with its value.
pub fn fill(template: &str, substitutions: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in substitutions {
        out = out.replace(&format!("[{name}]"), value);
    }
    out
}

/// Read one template file verbatim.
pub fn read_template(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path)?)
}

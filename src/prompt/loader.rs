//! Cached loading of named templates from a prompt directory.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::Result;

/// Loads templates by name from a directory and caches them for the run.
/// Stages that need several templates (interface, problems) share one loader.
pub struct PromptLoader {
    dir: PathBuf,
    cache: RwLock<HashMap<String, String>>,
}

impl PromptLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Load the template named `name` (a bare file name under the prompt
    /// directory), reading it at most once.
    pub fn load(&self, name: &str) -> Result<String> {
        {
            let cache = self.cache.read().expect("prompt cache lock");
            if let Some(found) = cache.get(name) {
                return Ok(found.clone());
            }
        }
        let content = std::fs::read_to_string(self.dir.join(name))?;
        let mut cache = self.cache.write().expect("prompt cache lock");
        cache.insert(name.to_string(), content.clone());
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("domain_gen");
        std::fs::write(&path, "Generate a domain for [Description]").unwrap();

        let loader = PromptLoader::new(dir.path());
        assert_eq!(
            loader.load("domain_gen").unwrap(),
            "Generate a domain for [Description]"
        );

        // Cached copy survives deletion of the underlying file.
        std::fs::remove_file(&path).unwrap();
        assert!(loader.load("domain_gen").is_ok());
    }

    #[test]
    fn test_missing_template_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = PromptLoader::new(dir.path());
        assert!(loader.load("nope").is_err());
    }
}

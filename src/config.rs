use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which backend family to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    #[value(name = "openai")]
    OpenAi,
    Azure,
    /// Azure first, OpenAI as fallback
    Mix,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmSettings,
    pub pool: PoolSettings,
    /// Command line of the external grammar parser
    pub parser_cmd: String,
    /// Correction rounds allowed after the initial generation
    pub max_correction: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            llm: LlmSettings::default(),
            pool: PoolSettings::default(),
            parser_cmd: "pddl-symbols".to_string(),
            max_correction: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4-0125-preview".to_string(),
            max_tokens: 2048,
            timeout_ms: 300000,
            retry_attempts: 10,
            retry_delay_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub workers: usize,
    pub scratch_dir: Option<PathBuf>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            scratch_dir: None,
        }
    }
}

impl Config {
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir
                .join(project_name)
                .join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!(
                            "Failed to load config from {}: {}",
                            primary_config.display(),
                            e
                        );
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!(
                        "Failed to load config from {}: {}",
                        fallback_config.display(),
                        e
                    );
                }
            }
        }

        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.model, "gpt-4-0125-preview");
        assert_eq!(config.llm.max_tokens, 2048);
        assert_eq!(config.pool.workers, 4);
        assert_eq!(config.max_correction, 3);
        assert_eq!(config.parser_cmd, "pddl-symbols");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(
            &path,
            "llm:\n  model: gpt-4o\npool:\n  workers: 8\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.pool.workers, 8);
        assert_eq!(config.max_correction, 3);
        assert_eq!(config.llm.retry_attempts, 10);
    }

    #[test]
    fn test_bad_yaml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "llm: [unclosed").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_api_type_serde_names() {
        assert_eq!(
            serde_yaml::from_str::<ApiType>("openai").unwrap(),
            ApiType::OpenAi
        );
        assert_eq!(
            serde_yaml::from_str::<ApiType>("mix").unwrap(),
            ApiType::Mix
        );
    }
}

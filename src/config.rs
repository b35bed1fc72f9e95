use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub datagraph: DataGraphConfig,
    pub embeddings: EmbeddingsConfig,
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub ontology: OntologyConfig,
}

/// Engine-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DataGraphConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub dimensions: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Graph extraction (text-generation) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    pub model: String,
    pub api_key_env: String,
}

/// Similarity search defaults. The match threshold is advisory: callers use
/// it to decide auto-match vs. ask-the-user, the engine only reports distances.
#[derive(Debug, Clone, Deserialize)]
pub struct SimilarityConfig {
    #[serde(default = "default_similarity_limit")]
    pub default_limit: usize,
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            default_limit: default_similarity_limit(),
            match_threshold: default_match_threshold(),
        }
    }
}

/// Ontology enforcement toggle. Off by default: the catalog is advisory
/// metadata consulted by callers, not a server-side constraint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OntologyConfig {
    #[serde(default)]
    pub enforce: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_similarity_limit() -> usize {
    5
}

fn default_match_threshold() -> f32 {
    0.3
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in DATAGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("DATAGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    ///
    /// A failure here means the engine must report itself as not-ready
    /// rather than serve partial functionality.
    fn validate(&self) -> Result<()> {
        std::env::var(&self.embeddings.api_key_env)
            .with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable.",
                    self.embeddings.api_key_env
                )
            })?;

        std::env::var(&self.extraction.api_key_env)
            .with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable.",
                    self.extraction.api_key_env
                )
            })?;

        if self.embeddings.dimensions == 0 {
            anyhow::bail!("embeddings.dimensions must be greater than 0");
        }

        if self.similarity.default_limit == 0 {
            anyhow::bail!("similarity.default_limit must be greater than 0");
        }

        // Cosine distance lives in [0, 2]
        if self.similarity.match_threshold < 0.0 || self.similarity.match_threshold > 2.0 {
            anyhow::bail!("similarity.match_threshold must be between 0.0 and 2.0");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.datagraph.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    fn create_test_config(temp_dir: &TempDir) -> String {
        let db_path = temp_dir.path().join("graph.db");
        let db_path_str = db_path.to_str().unwrap().replace('\\', "\\\\");
        format!(
            r#"
[datagraph]
db_path = "{}"
log_level = "debug"

[embeddings]
provider = "openai"
model = "text-embedding-3-small"
api_key_env = "OPENAI_API_KEY"
dimensions = 1536

[extraction]
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"

[similarity]
default_limit = 5
match_threshold = 0.3
"#,
            db_path_str
        )
    }

    fn with_config_env(config_path: &std::path::Path, api_key: Option<&str>, f: impl FnOnce()) {
        let original_config = std::env::var("DATAGRAPH_CONFIG").ok();
        let original_key = std::env::var("OPENAI_API_KEY").ok();
        std::env::set_var("DATAGRAPH_CONFIG", config_path.to_str().unwrap());
        match api_key {
            Some(k) => std::env::set_var("OPENAI_API_KEY", k),
            None => std::env::remove_var("OPENAI_API_KEY"),
        }
        f();
        std::env::remove_var("DATAGRAPH_CONFIG");
        std::env::remove_var("OPENAI_API_KEY");
        if let Some(val) = original_config {
            std::env::set_var("DATAGRAPH_CONFIG", val);
        }
        if let Some(val) = original_key {
            std::env::set_var("OPENAI_API_KEY", val);
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_content = create_test_config(&temp_dir);
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, config_content).unwrap();
        with_config_env(&config_path, Some("test-key"), || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.datagraph.log_level, "debug");
            assert_eq!(config.embeddings.dimensions, 1536);
            assert_eq!(config.similarity.default_limit, 5);
            assert!((config.similarity.match_threshold - 0.3).abs() < 1e-6);
            assert!(!config.ontology.enforce);
        });
    }

    #[test]
    fn test_config_missing_api_key() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_content = create_test_config(&temp_dir);
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, config_content).unwrap();
        with_config_env(&config_path, None, || {
            let config = Config::load();
            assert!(config.is_err(), "Expected missing API key error");
            assert!(config.unwrap_err().to_string().contains("OPENAI_API_KEY"));
        });
    }

    #[test]
    fn test_config_invalid_threshold() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_content = create_test_config(&temp_dir)
            .replace("match_threshold = 0.3", "match_threshold = 2.5");
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, config_content).unwrap();
        with_config_env(&config_path, Some("test-key"), || {
            let config = Config::load();
            assert!(config.is_err());
            assert!(config.unwrap_err().to_string().contains("match_threshold"));
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("DATAGRAPH_CONFIG").ok();
        std::env::set_var("DATAGRAPH_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("DATAGRAPH_CONFIG");
        if let Some(v) = original {
            std::env::set_var("DATAGRAPH_CONFIG", v);
        }
    }
}

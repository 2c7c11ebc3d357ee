//! Layered configuration (SPEC_FULL.md §9.3): defaults → TOML file →
//! `OPENSRC_`-prefixed environment variables, mirroring the teacher's
//! `mcb_infrastructure::config::ConfigLoader` without the DI-container
//! plumbing that pattern also carries — this server has one fixed
//! provider per port, not a swappable-at-runtime registry.

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use opensrc_domain::constants::{
    BATCH_SIZE, EMBEDDING_DIM, MAX_CONCURRENT_INDEX, SANDBOX_DEADLINE_MS, SEARCH_TIMEOUT_MS,
};
use opensrc_domain::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "OPENSRC_";
const DEFAULT_CONFIG_FILENAME: &str = "opensrc.toml";

/// The full set of tunables a deployment may override. Every field
/// defaults to the value spec §5 calls out as the bound, so a process
/// with no config file anywhere behaves exactly per spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Data root override; `None` defers to `paths::resolve_data_dir`'s
    /// `OPENSRC_DIR`/`XDG_DATA_HOME`/`HOME` chain.
    pub data_dir: Option<PathBuf>,

    /// FastEmbed model name. Fixed to the one catalog entry matching
    /// `EMBEDDING_DIM`; exposed as a setting so a future model swap
    /// doesn't require a code change, not because alternatives are
    /// supported today.
    pub embedder_model: String,

    /// Embedding vector dimensionality.
    pub embedding_dim: usize,

    /// Sandbox script deadline, milliseconds.
    pub sandbox_deadline_ms: u64,

    /// Server-side search timeout, milliseconds (mirrors the sandbox
    /// deadline per spec §5).
    pub search_timeout_ms: u64,

    /// Maximum sources indexing concurrently.
    pub max_concurrent_index: usize,

    /// Chunks accumulated per embed+insert+yield cycle.
    pub batch_size: usize,

    /// `tracing` env-filter directive for the interactive stderr layer
    /// (e.g. `"info"`, `"opensrc=debug,warn"`).
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            embedder_model: "BGEBaseENV15".to_string(),
            embedding_dim: EMBEDDING_DIM,
            sandbox_deadline_ms: SANDBOX_DEADLINE_MS,
            search_timeout_ms: SEARCH_TIMEOUT_MS,
            max_concurrent_index: MAX_CONCURRENT_INDEX,
            batch_size: BATCH_SIZE,
            log_level: "info".to_string(),
        }
    }
}

/// Builds an `AppConfig` from the default/file/env layers.
#[derive(Clone, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Merge defaults, an optional TOML file, then `OPENSRC_*` env vars,
    /// in that increasing-precedence order.
    pub fn load(&self) -> Result<AppConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));

        match &self.config_path {
            Some(path) if path.exists() => {
                figment = figment.merge(Toml::file(path));
            }
            Some(_) => {}
            None => {
                if let Some(default_path) = Self::find_default_config_path() {
                    figment = figment.merge(Toml::file(&default_path));
                }
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        let config: AppConfig = figment.extract().map_err(|e| Error::config(e.to_string()))?;
        validate(&config)?;
        Ok(config)
    }

    fn find_default_config_path() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        let candidate = cwd.join(DEFAULT_CONFIG_FILENAME);
        candidate.exists().then_some(candidate)
    }
}

fn validate(config: &AppConfig) -> Result<()> {
    if config.embedding_dim == 0 {
        return Err(Error::config("embedding_dim must be greater than 0"));
    }
    if config.max_concurrent_index == 0 {
        return Err(Error::config("max_concurrent_index must be greater than 0"));
    }
    if config.batch_size == 0 {
        return Err(Error::config("batch_size must be greater than 0"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_bounds() {
        let config = AppConfig::default();
        assert_eq!(config.embedding_dim, EMBEDDING_DIM);
        assert_eq!(config.max_concurrent_index, MAX_CONCURRENT_INDEX);
        assert_eq!(config.batch_size, BATCH_SIZE);
    }

    #[test]
    fn load_with_no_file_yields_defaults() {
        let loader = ConfigLoader::new().with_config_path("/nonexistent/opensrc.toml");
        let config = loader.load().unwrap();
        assert_eq!(config.embedder_model, "BGEBaseENV15");
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opensrc.toml");
        std::fs::write(&path, "batch_size = 10\n").unwrap();

        let config = ConfigLoader::new().with_config_path(&path).load().unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.embedding_dim, EMBEDDING_DIM);
    }

    #[test]
    fn rejects_zero_batch_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opensrc.toml");
        std::fs::write(&path, "batch_size = 0\n").unwrap();

        let err = ConfigLoader::new().with_config_path(&path).load().unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }
}

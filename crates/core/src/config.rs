//! Application configuration handling.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Provider address used when nothing else is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SEARCH_LIMIT: usize = 20;

const DEFAULT_CONFIG_TOML: &str = r#"# gamerec configuration

# Base address of the search/recommendation provider.
api_base_url = "http://127.0.0.1:8000"

# Per-request timeout in seconds.
request_timeout_secs = 10

# Maximum number of search candidates the provider returns.
search_limit = 20
"#;

/// Runtime configuration for the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base address of the provider endpoints.
    pub api_base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Result cap the search provider applies.
    pub search_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file location, applying
    /// `GAMEREC_*` environment overrides on top.
    pub fn load() -> Result<Self> {
        Self::load_from(config_file_path())
    }

    /// Load configuration layered from defaults, the given file (if it
    /// exists), and environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut builder = Config::builder()
            .set_default("api_base_url", DEFAULT_API_BASE_URL)?
            .set_default("request_timeout_secs", DEFAULT_TIMEOUT_SECS as i64)?
            .set_default("search_limit", DEFAULT_SEARCH_LIMIT as i64)?;

        if path.exists() {
            builder = builder.add_source(File::from(path.to_path_buf()).format(FileFormat::Toml));
        }

        let settings = builder
            .add_source(Environment::with_prefix("GAMEREC"))
            .build()
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        settings
            .try_deserialize()
            .with_context(|| format!("failed to parse configuration at {}", path.display()))
    }
}

/// Location of the user-level configuration file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gamerec")
        .join("config.toml")
}

/// Write a commented default configuration file if none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    ensure_default_config_at(config_file_path())
}

fn ensure_default_config_at(path: PathBuf) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join("nope.toml"))?;
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.search_limit, DEFAULT_SEARCH_LIMIT);
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "api_base_url = \"http://games.example:9000\"\nrequest_timeout_secs = 3\n",
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.api_base_url, "http://games.example:9000");
        assert_eq!(config.request_timeout_secs, 3);
        assert_eq!(config.search_limit, DEFAULT_SEARCH_LIMIT);
        Ok(())
    }

    #[test]
    fn ensure_default_writes_once() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("gamerec").join("config.toml");

        let written = ensure_default_config_at(path.clone())?;
        assert!(written.exists());
        let config = AppConfig::load_from(&written)?;
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);

        // a second call must not clobber user edits
        fs::write(&path, "api_base_url = \"http://edited:1\"\n")?;
        ensure_default_config_at(path.clone())?;
        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.api_base_url, "http://edited:1");
        Ok(())
    }
}

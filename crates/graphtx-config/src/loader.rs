//! Reads [`ClientConfig`] from disk and layers environment overrides on top.

use crate::config::ClientConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Loads client configuration from TOML or JSON files
pub struct ConfigLoader;

impl ConfigLoader {
    /// Default config path: `$XDG_CONFIG_HOME/graphtx/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".config")
            })
            .join("graphtx")
            .join("config.toml")
    }

    /// Parse a config file without applying environment overrides.
    ///
    /// The format is chosen by extension: `.toml` or `.json`.
    pub async fn load_from_file(path: &Path) -> ConfigResult<ClientConfig> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config = Self::parse(path, &content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load the effective configuration.
    ///
    /// An explicit `path` must exist. Without one, the default path is used if
    /// present and the built-in defaults otherwise. Environment overrides are
    /// applied last, then the result is validated.
    pub async fn load(path: Option<&Path>) -> ConfigResult<ClientConfig> {
        let config = Self::load_unvalidated(path).await?;
        config.validate()?;
        info!("Using graph endpoint {}", config.base_url);
        Ok(config)
    }

    /// Same layering as [`ConfigLoader::load`] without the final validation,
    /// for callers that apply further overrides first.
    pub async fn load_unvalidated(path: Option<&Path>) -> ConfigResult<ClientConfig> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path).await?,
            None => {
                let default = Self::default_path();
                if tokio::fs::try_exists(&default).await.unwrap_or(false) {
                    Self::load_from_file(&default).await?
                } else {
                    debug!("No config file at {}, using defaults", default.display());
                    ClientConfig::default()
                }
            }
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load from the default location
    pub async fn load_default() -> ConfigResult<ClientConfig> {
        Self::load(None).await
    }

    fn parse(path: &Path, content: &str) -> ConfigResult<ClientConfig> {
        if content.trim().is_empty() {
            return Ok(ClientConfig::default());
        }

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

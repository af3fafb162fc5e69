use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::RepomanError;

/// Largest page size the GitHub REST API accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Which remote URL new clones are created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloneProtocol {
    #[default]
    Https,
    Ssh,
}

impl std::fmt::Display for CloneProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloneProtocol::Https => write!(f, "https"),
            CloneProtocol::Ssh => write!(f, "ssh"),
        }
    }
}

impl std::str::FromStr for CloneProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "https" => Ok(CloneProtocol::Https),
            "ssh" => Ok(CloneProtocol::Ssh),
            _ => Err(format!("unknown clone protocol: {s}")),
        }
    }
}

/// Top-level repoman configuration, stored at `~/.repoman/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepomanConfig {
    /// Base URL of the GitHub REST API.
    #[serde(default = "default_api_url")]
    pub api_url: Url,

    /// Repositories requested per API page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Maximum concurrent clone/update operations.
    #[serde(default = "default_concurrency")]
    pub sync_concurrency: usize,

    /// Protocol used for new clones.
    #[serde(default)]
    pub clone_protocol: CloneProtocol,
}

fn default_api_url() -> Url {
    Url::parse("https://api.github.com").expect("static URL is valid")
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_concurrency() -> usize {
    4
}

impl Default for RepomanConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            page_size: default_page_size(),
            sync_concurrency: default_concurrency(),
            clone_protocol: CloneProtocol::default(),
        }
    }
}

impl RepomanConfig {
    /// Returns the repoman home directory (`~/.repoman/`).
    pub fn home_dir() -> Result<PathBuf, RepomanError> {
        let base = dirs::home_dir().ok_or_else(|| RepomanError::Config {
            message: "could not determine home directory".into(),
        })?;
        Ok(base.join(".repoman"))
    }

    /// Returns the path to the config file.
    pub fn config_path() -> Result<PathBuf, RepomanError> {
        Ok(Self::home_dir()?.join("config.toml"))
    }

    /// Load config from the default location, or return defaults if not found.
    pub fn load() -> Result<Self, RepomanError> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, RepomanError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| RepomanError::Serialization(e.to_string()))?;
        config.validated()
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), RepomanError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| RepomanError::Serialization(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Initialize the repoman home directory with a default config.
    ///
    /// An existing config file is left untouched.
    pub fn init() -> Result<PathBuf, RepomanError> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            Self::default().save_to(&config_path)?;
        }
        Ok(config_path)
    }

    fn validated(mut self) -> Result<Self, RepomanError> {
        if self.sync_concurrency == 0 {
            return Err(RepomanError::Config {
                message: "sync_concurrency must be at least 1".into(),
            });
        }
        self.page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_roundtrip() {
        let config = RepomanConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: RepomanConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(config.api_url, deserialized.api_url);
        assert_eq!(config.sync_concurrency, deserialized.sync_concurrency);
        assert_eq!(config.clone_protocol, deserialized.clone_protocol);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "clone_protocol = \"ssh\"\npage_size = 500\n").unwrap();

        let config = RepomanConfig::load_from(&path).unwrap();
        assert_eq!(config.clone_protocol, CloneProtocol::Ssh);
        assert_eq!(config.page_size, MAX_PAGE_SIZE);
        assert_eq!(config.sync_concurrency, 4);
        assert_eq!(config.api_url.as_str(), "https://api.github.com/");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "sync_concurrency = 0\n").unwrap();

        let err = RepomanConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, RepomanError::Config { .. }));
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        RepomanConfig::default().save_to(&path).unwrap();
        assert!(path.exists());
    }
}

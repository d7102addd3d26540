//! Configuration for sangha

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::authz::AccessPolicy;
use crate::error::SanghaError;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sangha")
}

/// Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the SQLite database and this config file
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Posts per page when the client does not ask
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Upper bound on requested page size
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    /// Only ledger members may comment on and reply to group posts
    #[serde(default)]
    pub comments_require_membership: bool,

    /// Only ledger members may like group posts
    #[serde(default)]
    pub likes_require_membership: bool,

    /// Coerce unknown privacy values to `public` instead of rejecting them
    #[serde(default)]
    pub lenient_privacy: bool,
}

fn default_http_port() -> u16 {
    8095
}

fn default_page_size() -> u32 {
    10
}

fn default_max_page_size() -> u32 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            http_port: default_http_port(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            comments_require_membership: false,
            likes_require_membership: false,
            lenient_privacy: false,
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SanghaError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| SanghaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SanghaError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| SanghaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SanghaError> {
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(SanghaError::Config("page sizes must be at least 1".into()));
        }
        if self.default_page_size > self.max_page_size {
            return Err(SanghaError::Config(format!(
                "default_page_size ({}) exceeds max_page_size ({})",
                self.default_page_size, self.max_page_size
            )));
        }
        Ok(())
    }

    /// Authorization table with this deployment's overrides applied
    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::new()
            .with_member_comments(self.comments_require_membership)
            .with_member_likes(self.likes_require_membership)
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }
}

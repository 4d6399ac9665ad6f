//! Configuration management for stackr.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Stackr configuration loaded from .git/stackr/config.toml.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// GitHub-specific settings.
    #[serde(default)]
    pub github: GitHubConfig,

    /// Settings for `stackr land`.
    #[serde(default)]
    pub land: LandConfig,
}

impl Config {
    /// Location of the config file inside a repository's git directory.
    #[must_use]
    pub fn path_in(git_dir: impl AsRef<Path>) -> PathBuf {
        git_dir.as_ref().join("stackr").join("config.toml")
    }

    /// Load config from a TOML file.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns error if file can't be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to a TOML file, creating its directory if needed.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// General stackr settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Remote that pull request branches live on.
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Maximum number of pull requests processed at once.
    ///
    /// Unset means the available parallelism.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Prefix for the temporary branches created while rebasing.
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            concurrency: None,
            branch_prefix: default_branch_prefix(),
        }
    }
}

fn default_remote() -> String {
    "origin".into()
}

fn default_branch_prefix() -> String {
    "stackr/rebase".into()
}

/// GitHub-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Custom API URL for GitHub Enterprise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// Settings for landing pull requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandConfig {
    /// Require approval and a green build before landing.
    #[serde(default = "default_check")]
    pub check: bool,
}

impl Default for LandConfig {
    fn default() -> Self {
        Self {
            check: default_check(),
        }
    }
}

const fn default_check() -> bool {
    true
}

//! CLI preferences
//!
//! Kept apart from the stack configuration: these only affect how the
//! `forge` binary presents output and where it submits templates.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub default_output: String,
    /// Deployment service endpoint for `forge deploy`
    pub endpoint: Option<String>,
    pub token: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            default_output: "table".to_string(),
            endpoint: None,
            token: None,
        }
    }
}

impl CliConfig {
    /// Load from `~/.config/forge/cli.toml`, defaults when absent
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).with_context(|| format!("Invalid CLI config {}", path.display()))
    }

    fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")?;
        Ok(PathBuf::from(home).join(".config/forge/cli.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load_from(&dir.path().join("cli.toml")).unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cli.toml");
        std::fs::write(&path, "endpoint = \"https://deploy.internal\"\n").unwrap();

        let config = CliConfig::load_from(&path).unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("https://deploy.internal"));
        assert_eq!(config.default_output, "table");
        assert!(config.token.is_none());
    }
}

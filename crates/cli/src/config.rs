//! Configuration management for the CLI

use crate::output::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bundle path used when neither the flag, the environment nor the config
/// file name one
pub const DEFAULT_BUNDLE_PATH: &str = "health_model.json";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Model bundle used when `--bundle` is not given
    pub default_bundle: Option<PathBuf>,
    /// Default output format
    pub default_format: Option<OutputFormat>,
}

impl Config {
    /// Load configuration from the user's config file, if any
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))
    }

    /// Bundle path: explicit flag, then config file, then the default name
    pub fn resolve_bundle(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.default_bundle.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BUNDLE_PATH))
    }

    pub fn resolve_format(&self, flag: Option<OutputFormat>) -> OutputFormat {
        flag.or(self.default_format).unwrap_or_default()
    }

    /// `CHC_CONFIG` if set, otherwise `~/.config/chc/config.json`
    fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os("CHC_CONFIG") {
            return Some(PathBuf::from(path));
        }
        dirs_next::home_dir().map(|home| home.join(".config").join("chc").join("config.json"))
    }
}

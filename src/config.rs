// src/config.rs

//! User configuration
//!
//! Loaded from TOML. An explicit path wins; otherwise
//! `<config_dir>/pantry/config.toml` is used when it exists, and built-in
//! defaults apply when it does not. Every key is optional.
//!
//! ```toml
//! recipe_dirs = ["/srv/recipes", "./recipes"]
//! install_root = "/opt/pantry"
//! workers = 2
//! jobs = 8
//! offline = false
//! ```

use crate::error::{Error, Result};
use crate::recipe::KitchenConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directories scanned for `*.toml` recipes, later ones override earlier
    pub recipe_dirs: Vec<PathBuf>,
    /// Parent of every package prefix
    pub install_root: PathBuf,
    /// Downloaded source archives, keyed by checksum
    pub source_cache: PathBuf,
    /// Per-package build directories
    pub build_root: PathBuf,
    /// Packages built concurrently
    pub workers: usize,
    /// Parallel jobs inside one build (default: available cores)
    pub jobs: Option<u32>,
    pub keep_builddir: bool,
    pub offline: bool,
}

impl Default for Config {
    fn default() -> Self {
        let kitchen = KitchenConfig::default();
        Self {
            recipe_dirs: vec![PathBuf::from("recipes")],
            install_root: dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("pantry")
                .join("opt"),
            source_cache: kitchen.source_cache,
            build_root: kitchen.build_root,
            workers: 1,
            jobs: None,
            keep_builddir: false,
            offline: false,
        }
    }
}

impl Config {
    /// Per-user config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pantry").join("config.toml"))
    }

    /// Load configuration
    ///
    /// A missing explicit file is an error; a missing default file is not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.is_file() => path,
                _ => {
                    debug!("No config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        debug!("Loading config from {}", path.display());
        let text = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&text).map_err(|reason| Error::Config(format!("{}: {}", path.display(), reason)))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Self::parse(text).map_err(Error::Config)
    }

    fn parse(text: &str) -> std::result::Result<Self, String> {
        let config: Self = toml::from_str(text).map_err(|e| e.to_string())?;
        if config.workers == 0 {
            return Err("workers must be at least 1".to_string());
        }
        Ok(config)
    }

    /// Settings for the native executor
    pub fn kitchen_config(&self) -> KitchenConfig {
        let defaults = KitchenConfig::default();
        KitchenConfig {
            source_cache: self.source_cache.clone(),
            build_root: self.build_root.clone(),
            jobs: self.jobs.unwrap_or(defaults.jobs).max(1),
            keep_builddir: self.keep_builddir,
            offline: self.offline,
        }
    }
}

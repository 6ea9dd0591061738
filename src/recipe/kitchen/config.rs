// src/recipe/kitchen/config.rs

//! Configuration types for the Kitchen build system

use std::path::{Path, PathBuf};

/// Configuration for the Kitchen
#[derive(Debug, Clone)]
pub struct KitchenConfig {
    /// Directory for downloaded sources
    pub source_cache: PathBuf,
    /// Parent directory for per-build stage directories
    pub build_root: PathBuf,
    /// Number of parallel jobs passed to make / cmake --build
    pub jobs: u32,
    /// Keep build directory after completion (for debugging)
    pub keep_builddir: bool,
    /// Never download; only sources already in the cache can be built
    pub offline: bool,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        let jobs = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);

        Self {
            source_cache: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("pantry")
                .join("sources"),
            build_root: std::env::temp_dir().join("pantry-build"),
            jobs,
            keep_builddir: false,
            offline: false,
        }
    }
}

impl KitchenConfig {
    /// Configuration rooted under one scratch directory (sources and builds)
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            source_cache: dir.join("sources"),
            build_root: dir.join("build"),
            ..Self::default()
        }
    }

    /// Jobs for one package, honoring a recipe-level override
    pub fn jobs_for(&self, recipe_jobs: Option<u32>) -> u32 {
        recipe_jobs.unwrap_or(self.jobs).max(1)
    }
}

// src/commands/mod.rs
//! Command handlers for the pantry CLI

mod build;
mod query;
mod resolve;

pub use build::{BuildArgs, cmd_build};
pub use query::{cmd_info, cmd_list};
pub use resolve::{cmd_plan, cmd_resolve};

use anyhow::{Context, Result};
use pantry::{Config, PackageSpec, RecipeRegistry};
use tracing::debug;

/// Load every recipe directory named in the config
pub(crate) fn load_registry(config: &Config) -> Result<RecipeRegistry> {
    let registry = RecipeRegistry::from_dirs(&config.recipe_dirs).with_context(|| {
        format!(
            "Failed to load recipes from {}",
            config
                .recipe_dirs
                .iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    })?;
    debug!("Loaded {} recipe(s)", registry.len());
    Ok(registry)
}

/// Parse command-line specs against the registry
pub(crate) fn parse_specs(specs: &[String], registry: &RecipeRegistry) -> Result<Vec<PackageSpec>> {
    specs
        .iter()
        .map(|text| {
            PackageSpec::parse_checked(text, registry)
                .with_context(|| format!("Invalid package spec: {}", text))
        })
        .collect()
}

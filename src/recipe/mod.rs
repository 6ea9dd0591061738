// src/recipe/mod.rs

//! Recipes: package descriptions and how to build them
//!
//! A recipe declares the versions of one package (each with the checksum of
//! its source archive), the variants it can be built with, its dependencies
//! and the rules that turn a resolved node into a concrete build.
//!
//! # Culinary Terminology
//!
//! - **Recipe**: The build specification (like a recipe card)
//! - **Kitchen**: The executor that turns a plan step into an installed prefix
//! - **Cook**: One build in progress
//! - **Prep**: Fetch and verify sources
//! - **Simmer**: The actual build process
//! - **Plate**: Copy results into the install prefix
//!
//! # Example Recipe
//!
//! ```toml
//! [package]
//! name = "libsvm"
//! summary = "Library for Support Vector Machines"
//! url = "https://github.com/cjlin1/libsvm/archive/v%(version)s.tar.gz"
//!
//! [[versions]]
//! version = "323"
//! checksum = "sha256:7a466f90f327a98f8ed1cb217570547bcb00077933d1619f3cb9e73518f38196"
//!
//! [[install]]
//! files = ["svm-train", "svm-predict", "svm-scale"]
//! dest = "bin"
//! ```

mod format;
pub mod kitchen;
pub mod parser;
mod registry;

pub use format::{
    ArgumentRule, BuildSection, BuildSystem, DependencyDecl, DependencyType, EnvironmentRule,
    ExternalSection, FilterRule, InstallRule, PackageSection, PatchInfo, Recipe, VariantDecl,
    VersionEntry,
};
pub use kitchen::{BuildJob, DryRunExecutor, ExecOutcome, Executor, Kitchen, KitchenConfig};
pub use parser::{parse_recipe, parse_recipe_file, validate_recipe};
pub use registry::RecipeRegistry;

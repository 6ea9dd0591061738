// src/lib.rs

//! Pantry: recipe resolution and build-plan composer
//!
//! Builds scientific software from declarative recipes into isolated
//! prefixes.
//!
//! # Architecture
//!
//! - Recipes: static TOML declarations of versions, variants, dependencies
//!   and build rules, collected in a read-only [`RecipeRegistry`]
//! - Specs: user requests such as `seidr@0.14+tbb`
//! - Resolution: request + registry becomes a concrete, conflict-free graph
//!   ("first resolution wins")
//! - Plans: dependency-ordered build steps with prefixes, environment and
//!   build-system arguments
//! - Runner: executes a plan on a bounded worker pool through an
//!   [`Executor`]

pub mod checksum;
pub mod config;
mod error;
pub mod plan;
pub mod recipe;
pub mod resolver;
pub mod runner;
pub mod spec;
pub mod variant;
pub mod version;

pub use checksum::{Checksum, HashAlgorithm};
pub use config::Config;
pub use error::{Error, Result};
pub use plan::{BuildPlan, Composer, EnvBinding, PlanStep};
pub use recipe::{
    BuildJob, DryRunExecutor, ExecOutcome, Executor, Kitchen, KitchenConfig, Recipe,
    RecipeRegistry,
};
pub use resolver::{Resolution, ResolvedNode, Resolver};
pub use runner::{
    BuildOptions, BuildOutcome, BuildReport, BuildRunner, NodeReport, NodeStatus,
    resolve_and_build,
};
pub use spec::PackageSpec;
pub use variant::{Condition, VariantAssignment, VariantValue};
pub use version::{Version, VersionConstraint};

// src/cli.rs
//! CLI definitions for pantry
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pantry")]
#[command(version)]
#[command(about = "Resolve recipes into build plans and cook them into prefixes", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: <config dir>/pantry/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Recipe directory; repeat to search several (overrides the config file)
    #[arg(long = "recipes", global = true)]
    pub recipe_dirs: Vec<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List known recipes and their versions
    List,

    /// Show a recipe's versions, variants, dependencies and rules
    Info {
        /// Package name
        package: String,

        /// Print the recipe as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve specs into a dependency graph
    Resolve {
        /// Package specs (e.g., "seidr@0.14+tbb")
        #[arg(required = true)]
        specs: Vec<String>,

        /// Print the resolution as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the ordered build plan for specs
    Plan {
        /// Package specs (e.g., "vowpal-wabbit@8.7.0")
        #[arg(required = true)]
        specs: Vec<String>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,

        /// Parent directory of package prefixes
        #[arg(long)]
        install_root: Option<PathBuf>,
    },

    /// Resolve, plan and build specs
    Build {
        /// Package specs
        #[arg(required = true)]
        specs: Vec<String>,

        /// Packages built at the same time
        #[arg(short, long)]
        workers: Option<usize>,

        /// Parallel jobs inside each build (default: available cores)
        #[arg(short, long)]
        jobs: Option<u32>,

        /// Print the commands that would run without building anything
        #[arg(long)]
        dry_run: bool,

        /// Only use sources already in the cache
        #[arg(long)]
        offline: bool,

        /// Keep build directories after successful builds
        #[arg(long)]
        keep_builddir: bool,

        /// Parent directory of package prefixes
        #[arg(long)]
        install_root: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

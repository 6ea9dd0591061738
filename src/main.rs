// src/main.rs

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use commands::BuildArgs;
use pantry::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "pantry", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if !cli.recipe_dirs.is_empty() {
        config.recipe_dirs = cli.recipe_dirs;
    }

    match cli.command {
        Commands::List => commands::cmd_list(&config),
        Commands::Info { package, json } => commands::cmd_info(&config, &package, json),
        Commands::Resolve { specs, json } => commands::cmd_resolve(&config, &specs, json),
        Commands::Plan {
            specs,
            json,
            install_root,
        } => commands::cmd_plan(&config, &specs, json, install_root),
        Commands::Build {
            specs,
            workers,
            jobs,
            dry_run,
            offline,
            keep_builddir,
            install_root,
        } => commands::cmd_build(
            &config,
            &specs,
            BuildArgs {
                workers,
                jobs,
                dry_run,
                offline,
                keep_builddir,
                install_root,
            },
        ),
        Commands::Completions { .. } => Ok(()),
    }
}

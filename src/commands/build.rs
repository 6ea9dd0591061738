// src/commands/build.rs
//! Build command - resolve, plan and cook packages

use super::{load_registry, parse_specs};
use anyhow::{Context, Result};
use pantry::runner::{BuildOptions, BuildReport, NodeStatus, resolve_and_build};
use pantry::{Config, DryRunExecutor, Executor, Kitchen};
use std::path::PathBuf;
use tracing::info;

/// Command-line overrides for a build
#[derive(Debug, Default)]
pub struct BuildArgs {
    pub workers: Option<usize>,
    pub jobs: Option<u32>,
    pub dry_run: bool,
    pub offline: bool,
    pub keep_builddir: bool,
    pub install_root: Option<PathBuf>,
}

/// Build packages and everything they depend on
///
/// Returns an error (non-zero exit) if any package failed to build.
pub fn cmd_build(config: &Config, specs: &[String], args: BuildArgs) -> Result<()> {
    let mut config = config.clone();
    if let Some(workers) = args.workers {
        config.workers = workers.max(1);
    }
    if args.jobs.is_some() {
        config.jobs = args.jobs;
    }
    if let Some(root) = args.install_root {
        config.install_root = root;
    }
    config.offline |= args.offline;
    config.keep_builddir |= args.keep_builddir;

    let registry = load_registry(&config)?;
    let roots = parse_specs(specs, &registry)?;

    let kitchen_config = config.kitchen_config();
    let executor: Box<dyn Executor> = if args.dry_run {
        println!("Dry run: nothing will be downloaded or built");
        Box::new(DryRunExecutor::new(kitchen_config.jobs))
    } else {
        info!(
            "Building with {} worker(s), sources cached in {}",
            config.workers,
            kitchen_config.source_cache.display()
        );
        Box::new(Kitchen::new(kitchen_config))
    };

    let options = BuildOptions {
        install_root: config.install_root.clone(),
        workers: config.workers,
    };
    let outcome = resolve_and_build(&registry, &roots, executor.as_ref(), &options)?;

    println!("Build plan: {} step(s)", outcome.plan.len());
    print_report(&outcome.report, args.dry_run);

    outcome
        .report
        .into_result()
        .map(|_| ())
        .context("Build failed")
}

fn print_report(report: &BuildReport, dry_run: bool) {
    for node in &report.nodes {
        let status = match &node.status {
            NodeStatus::Succeeded if dry_run => "[PLANNED]".to_string(),
            NodeStatus::Succeeded => format!("[OK] {:.1}s", node.duration.as_secs_f64()),
            NodeStatus::External => "[EXTERNAL]".to_string(),
            NodeStatus::Failed { reason } => format!("[FAILED] {}", reason),
            NodeStatus::Skipped { dependency } => format!("[SKIPPED] {} did not build", dependency),
            NodeStatus::Cancelled => "[CANCELLED]".to_string(),
        };
        println!("  {}@{} {}", node.name, node.version, status);
        if dry_run {
            for line in node.log.lines() {
                println!("      {}", line);
            }
        } else if !node.status.is_ok() && !node.log.is_empty() {
            let lines: Vec<&str> = node.log.lines().collect();
            let tail = &lines[lines.len().saturating_sub(20)..];
            println!("    last {} line(s) of output:", tail.len());
            for line in tail {
                println!("      {}", line);
            }
        } else if matches!(node.status, NodeStatus::Succeeded) {
            println!("      -> {}", node.prefix.display());
        }
    }

    println!(
        "\nSucceeded: {}, external: {}, failed: {}, skipped: {}, cancelled: {}",
        report.count(|s| matches!(s, NodeStatus::Succeeded)),
        report.count(|s| matches!(s, NodeStatus::External)),
        report.count(|s| matches!(s, NodeStatus::Failed { .. })),
        report.count(|s| matches!(s, NodeStatus::Skipped { .. })),
        report.count(|s| matches!(s, NodeStatus::Cancelled)),
    );
}

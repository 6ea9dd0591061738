// src/commands/resolve.rs
//! Resolve and plan commands

use super::{load_registry, parse_specs};
use anyhow::{Context, Result};
use pantry::plan::{BuildPlan, EnvOp};
use pantry::{Composer, Config, Resolution, Resolver};
use std::path::PathBuf;
use tracing::info;

/// Resolve specs and print the dependency graph
pub fn cmd_resolve(config: &Config, specs: &[String], json: bool) -> Result<()> {
    let registry = load_registry(config)?;
    let roots = parse_specs(specs, &registry)?;

    info!("Resolving {} spec(s)", roots.len());
    let resolution = Resolver::new(&registry).resolve_all(&roots)?;

    if json {
        let text =
            serde_json::to_string_pretty(&resolution).context("Failed to serialize resolution")?;
        println!("{}", text);
    } else {
        print_resolution(&resolution);
    }
    Ok(())
}

fn print_resolution(resolution: &Resolution) {
    println!("Resolved {} package(s):", resolution.len());
    for node in &resolution.nodes {
        print!("  {}", node.describe());
        if node.external {
            print!(" (external)");
        }
        println!(" <- {}", node.requested_by);
        for input in &node.inputs {
            let types: Vec<String> = input.types.iter().map(|t| t.to_string()).collect();
            println!("      {} [{}]", input.name, types.join(","));
        }
    }
}

/// Resolve specs and print the ordered build plan
pub fn cmd_plan(
    config: &Config,
    specs: &[String],
    json: bool,
    install_root: Option<PathBuf>,
) -> Result<()> {
    let registry = load_registry(config)?;
    let roots = parse_specs(specs, &registry)?;
    let install_root = install_root.unwrap_or_else(|| config.install_root.clone());

    let resolution = Resolver::new(&registry).resolve_all(&roots)?;
    let plan = Composer::new(&registry, install_root).compose(&resolution)?;

    if json {
        let text = serde_json::to_string_pretty(&plan).context("Failed to serialize plan")?;
        println!("{}", text);
    } else {
        print_plan(&plan);
    }
    Ok(())
}

fn print_plan(plan: &BuildPlan) {
    println!("Build plan ({} step(s)):", plan.len());
    for (i, step) in plan.steps.iter().enumerate() {
        println!("\n[{}] {}", i + 1, step.describe());
        println!("    prefix: {}", step.prefix.display());
        if step.external {
            println!("    external, nothing to build");
            continue;
        }
        println!("    system: {}", step.system);
        if let Some(url) = &step.source_url {
            println!("    source: {}", url);
        }
        if !step.dependencies.is_empty() {
            println!("    depends on: {}", step.dependencies.join(", "));
        }
        for binding in &step.environment {
            let op = match binding.op {
                EnvOp::Set => "=",
                EnvOp::Prepend => "=+",
            };
            println!("    env {}{}{}", binding.name, op, binding.value);
        }
        for arg in &step.arguments {
            println!("    arg {}", arg);
        }
        for patch in &step.patches {
            println!("    patch {} (-p{})", patch.path.display(), patch.strip);
        }
    }
}

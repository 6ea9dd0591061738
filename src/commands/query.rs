// src/commands/query.rs
//! Recipe inspection commands

use super::load_registry;
use anyhow::{Context, Result};
use pantry::recipe::{Recipe, validate_recipe};
use pantry::Config;

/// List known recipes
pub fn cmd_list(config: &Config) -> Result<()> {
    let registry = load_registry(config)?;

    if registry.is_empty() {
        println!("No recipes found.");
        return Ok(());
    }

    println!("Recipes:");
    for recipe in registry.iter() {
        let versions = registry.versions_of(recipe.name())?;
        let versions: Vec<&str> = versions.iter().map(|v| v.as_str()).collect();
        print!("  {} [{}]", recipe.name(), versions.join(", "));
        if recipe.is_external() {
            print!(" (external)");
        }
        if let Some(summary) = &recipe.package.summary {
            print!(" - {}", summary);
        }
        println!();
    }
    println!("\nTotal: {} recipe(s)", registry.len());

    Ok(())
}

/// Show one recipe
pub fn cmd_info(config: &Config, package: &str, json: bool) -> Result<()> {
    let registry = load_registry(config)?;
    let recipe = registry.lookup(package)?;

    if json {
        let text = serde_json::to_string_pretty(recipe).context("Failed to serialize recipe")?;
        println!("{}", text);
        return Ok(());
    }

    print_recipe(recipe);
    Ok(())
}

fn when_suffix(when: &Option<pantry::Condition>) -> String {
    when.as_ref()
        .map(|c| format!(" (when {})", c))
        .unwrap_or_default()
}

fn print_recipe(recipe: &Recipe) {
    println!("Package: {}", recipe.name());
    if let Some(summary) = &recipe.package.summary {
        println!("  {}", summary);
    }
    if let Some(homepage) = &recipe.package.homepage {
        println!("  Homepage: {}", homepage);
    }
    if let Some(external) = &recipe.external {
        println!("  External: provided at {}", external.prefix.display());
    } else {
        println!("  Build system: {}", recipe.build.system);
    }

    println!("\nVersions:");
    for entry in &recipe.versions {
        match &entry.checksum {
            Some(checksum) => println!("  {} ({})", entry.version, checksum),
            None => println!("  {}", entry.version),
        }
    }

    if !recipe.variants.is_empty() {
        println!("\nVariants:");
        for decl in &recipe.variants {
            print!("  {} [default: {}]", decl.name, decl.default);
            if !decl.values.is_empty() {
                print!(" values: {}", decl.values.join(", "));
            }
            if let Some(description) = &decl.description {
                print!(" - {}", description);
            }
            println!();
        }
    }

    if !recipe.dependencies.is_empty() {
        println!("\nDependencies:");
        for dep in &recipe.dependencies {
            let types: Vec<String> = dep.types.iter().map(|t| t.to_string()).collect();
            println!("  {} [{}]{}", dep.spec, types.join(","), when_suffix(&dep.when));
        }
    }

    if !recipe.environment.is_empty() {
        println!("\nEnvironment:");
        for rule in &recipe.environment {
            let value = match (&rule.value, &rule.prefix_of) {
                (Some(value), _) => value.clone(),
                (None, Some(target)) => format!("<prefix of {}>", target),
                (None, None) => String::new(),
            };
            println!("  {}={}{}", rule.name, value, when_suffix(&rule.when));
        }
    }

    if !recipe.arguments.is_empty() {
        println!("\nArguments:");
        for rule in &recipe.arguments {
            let shown = match (&rule.value, &rule.define, &rule.variant) {
                (Some(value), _, _) => value.clone(),
                (None, Some(define), Some(variant)) => format!("-D{} <- {}", define, variant),
                _ => String::new(),
            };
            println!("  {}{}", shown, when_suffix(&rule.when));
        }
    }

    if !recipe.build.patches.is_empty() {
        println!("\nPatches:");
        for patch in &recipe.build.patches {
            println!("  {} (-p{}){}", patch.file, patch.strip, when_suffix(&patch.when));
        }
    }

    // Registration already rejected hard errors, so only warnings remain
    if let Ok(warnings) = validate_recipe(recipe)
        && !warnings.is_empty()
    {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  {}", warning);
        }
    }
}

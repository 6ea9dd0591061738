// src/plan/composer.rs

//! Build plan composition
//!
//! Orders a resolution topologically, derives a content hash and install
//! prefix per node, then evaluates each recipe's conditional rules against
//! the node's fixed version and variants.

use crate::error::{Error, Result};
use crate::recipe::{ArgumentRule, BuildSystem, Recipe, RecipeRegistry};
use crate::resolver::{Resolution, ResolvedNode};
use crate::variant::{Condition, VariantValue};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{BuildPlan, EnvBinding, FilterStep, InstallStep, PatchStep, PlanStep};

/// Hash characters used in install prefixes
pub const HASH_DISPLAY_LEN: usize = 7;

/// Composes a [`BuildPlan`] from a [`Resolution`]
pub struct Composer<'r> {
    registry: &'r RecipeRegistry,
    install_root: PathBuf,
}

impl<'r> Composer<'r> {
    pub fn new(registry: &'r RecipeRegistry, install_root: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            install_root: install_root.into(),
        }
    }

    /// Compose the plan
    ///
    /// Ties between packages that become buildable together are broken by
    /// registry order, so equal inputs always give the same plan.
    pub fn compose(&self, resolution: &Resolution) -> Result<BuildPlan> {
        let order = resolution.topological_order(|name| {
            self.registry.position(name).unwrap_or(usize::MAX)
        })?;

        let mut hashes: HashMap<&str, String> = HashMap::new();
        let mut prefixes: HashMap<&str, PathBuf> = HashMap::new();
        for &i in &order {
            let node = &resolution.nodes[i];
            let recipe = self.recipe_for(node)?;
            let hash = node_hash(node, &hashes)?;
            let prefix = match &recipe.external {
                Some(external) => external.prefix.clone(),
                None => self.install_root.join(format!(
                    "{}-{}-{}",
                    node.name,
                    node.version,
                    &hash[..HASH_DISPLAY_LEN]
                )),
            };
            hashes.insert(node.name.as_str(), hash);
            prefixes.insert(node.name.as_str(), prefix);
        }

        let mut steps = Vec::with_capacity(order.len());
        for &i in &order {
            let node = &resolution.nodes[i];
            let recipe = self.recipe_for(node)?;
            steps.push(self.compose_step(node, recipe, &hashes, &prefixes)?);
        }

        debug!("Composed plan with {} steps", steps.len());
        Ok(BuildPlan {
            install_root: self.install_root.clone(),
            steps,
        })
    }

    fn recipe_for(&self, node: &ResolvedNode) -> Result<&'r Recipe> {
        self.registry.get(&node.name).ok_or_else(|| Error::PlanComposition {
            package: node.name.clone(),
            reason: "no recipe registered for resolved package".to_string(),
        })
    }

    fn compose_step(
        &self,
        node: &ResolvedNode,
        recipe: &Recipe,
        hashes: &HashMap<&str, String>,
        prefixes: &HashMap<&str, PathBuf>,
    ) -> Result<PlanStep> {
        let prefix = prefix_of(node, &node.name, prefixes)?.to_path_buf();
        let holds = |when: &Option<Condition>| {
            when.as_ref()
                .is_none_or(|c| c.holds(&node.version, &node.variants))
        };

        let mut environment = Vec::new();
        let mut link_prefixes = Vec::new();
        let mut build_prefixes = Vec::new();
        for input in &node.inputs {
            let dep_prefix = prefix_of(node, &input.name, prefixes)?;
            if input.is_build() || input.is_link() {
                link_prefixes.push(dep_prefix);
            }
            if input.is_build() {
                build_prefixes.push(dep_prefix);
            }
        }
        if !link_prefixes.is_empty() {
            environment.push(EnvBinding::prepend(
                "CMAKE_PREFIX_PATH",
                join_paths(link_prefixes.iter().map(|p| p.to_path_buf())),
            ));
            environment.push(EnvBinding::prepend(
                "PKG_CONFIG_PATH",
                join_paths(link_prefixes.iter().map(|p| p.join("lib").join("pkgconfig"))),
            ));
        }
        if !build_prefixes.is_empty() {
            environment.push(EnvBinding::prepend(
                "PATH",
                join_paths(build_prefixes.iter().map(|p| p.join("bin"))),
            ));
        }

        for rule in recipe.environment.iter().filter(|r| holds(&r.when)) {
            let value = match (&rule.prefix_of, &rule.value) {
                (Some(target), _) => prefix_of(node, target, prefixes)
                    .map_err(|_| Error::PlanComposition {
                        package: node.name.clone(),
                        reason: format!(
                            "{} refers to the prefix of {}, which is not a resolved dependency",
                            rule.name, target
                        ),
                    })?
                    .to_string_lossy()
                    .into_owned(),
                (None, Some(value)) => recipe.substitute(value, &node.version, &prefix),
                (None, None) => continue,
            };
            environment.push(EnvBinding::set(rule.name.clone(), value));
        }

        let mut arguments = Vec::new();
        if recipe.build.system == BuildSystem::CMake && !recipe.is_external() {
            arguments.push(format!("-DCMAKE_INSTALL_PREFIX={}", prefix.display()));
            if let Some(VariantValue::Choice(build_type)) = node.variants.get("build_type") {
                arguments.push(format!("-DCMAKE_BUILD_TYPE={}", build_type));
            }
            if let Some(generator) = &recipe.build.generator {
                arguments.push("-G".to_string());
                arguments.push(generator.clone());
            }
        }
        for rule in recipe.arguments.iter().filter(|r| holds(&r.when)) {
            arguments.push(render_argument(node, recipe, rule, &prefix)?);
        }

        let patches = recipe
            .build
            .patches
            .iter()
            .filter(|p| holds(&p.when))
            .map(|p| PatchStep::from_info(recipe.patch_path(p), p))
            .collect();

        let filters = recipe
            .filters
            .iter()
            .filter(|f| holds(&f.when))
            .map(|f| FilterStep {
                file: f.file.clone(),
                from: recipe.substitute(&f.from, &node.version, &prefix),
                to: recipe.substitute(&f.to, &node.version, &prefix),
            })
            .collect();

        let install = recipe
            .install
            .iter()
            .filter(|r| holds(&r.when))
            .map(|r| InstallStep {
                files: r.files.clone(),
                dest: r.dest.clone(),
            })
            .collect();

        Ok(PlanStep {
            name: node.name.clone(),
            version: node.version.clone(),
            variants: node.variants.clone(),
            hash: hashes.get(node.name.as_str()).cloned().unwrap_or_default(),
            prefix,
            external: recipe.is_external(),
            system: recipe.build.system,
            source_url: recipe.archive_url(&node.version),
            checksum: node.checksum.clone(),
            build_directory: recipe.build.build_directory.clone(),
            targets: recipe.build.targets.clone(),
            jobs: recipe.build.jobs,
            environment,
            arguments,
            patches,
            filters,
            install,
            dependencies: node.inputs.iter().map(|i| i.name.clone()).collect(),
        })
    }
}

fn prefix_of<'p>(node: &ResolvedNode, name: &str, prefixes: &'p HashMap<&str, PathBuf>) -> Result<&'p Path> {
    prefixes
        .get(name)
        .map(PathBuf::as_path)
        .ok_or_else(|| Error::PlanComposition {
            package: node.name.clone(),
            reason: format!("no install prefix computed for {}", name),
        })
}

fn join_paths(paths: impl Iterator<Item = PathBuf>) -> String {
    paths
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(":")
}

/// Render a literal or variant-driven build argument
fn render_argument(node: &ResolvedNode, recipe: &Recipe, rule: &ArgumentRule, prefix: &Path) -> Result<String> {
    if let Some(value) = &rule.value {
        return Ok(recipe.substitute(value, &node.version, prefix));
    }

    let (Some(define), Some(variant)) = (&rule.define, &rule.variant) else {
        return Err(Error::PlanComposition {
            package: node.name.clone(),
            reason: "argument rule has neither value nor define".to_string(),
        });
    };

    match node.variants.get(variant) {
        Some(VariantValue::Bool(on)) => Ok(format!(
            "-D{}:BOOL={}",
            define,
            if *on { "ON" } else { "OFF" }
        )),
        Some(VariantValue::Choice(choice)) => Ok(format!("-D{}={}", define, choice)),
        None => Err(Error::PlanComposition {
            package: node.name.clone(),
            reason: format!("argument {} renders unassigned variant '{}'", define, variant),
        }),
    }
}

/// Content hash over the node's identity and its dependencies' hashes
fn node_hash(node: &ResolvedNode, known: &HashMap<&str, String>) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(format!("name={}\n", node.name));
    hasher.update(format!("version={}\n", node.version));
    hasher.update(format!("checksum={}\n", node.checksum.as_deref().unwrap_or("")));
    hasher.update(format!("variants={}\n", node.variants));
    for input in &node.inputs {
        let dep_hash = known.get(input.name.as_str()).ok_or_else(|| Error::PlanComposition {
            package: node.name.clone(),
            reason: format!("dependency {} has not been hashed", input.name),
        })?;
        let types: Vec<String> = input.types.iter().map(|t| t.to_string()).collect();
        hasher.update(format!("dep={}:{}:{}\n", input.name, types.join(","), dep_hash));
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::parse_recipe;
    use crate::resolver::Resolver;
    use crate::spec::PackageSpec;

    const SUM: &str = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn registry() -> RecipeRegistry {
        let app = format!(
            r#"
[package]
name = "app"
summary = "x"
url = "https://example.com/app-%(version)s.tar.gz"

[[versions]]
version = "1.0"
checksum = "{SUM}"

[[variants]]
name = "fast"
default = false

[[variants]]
name = "build_type"
default = "Release"
values = ["Release", "Debug"]

[[dependencies]]
spec = "tool"
type = ["build"]

[[dependencies]]
spec = "lib"

[build]
system = "cmake"
generator = "Ninja"

[[environment]]
name = "LIB_ROOT"
prefix_of = "lib"

[[environment]]
name = "FAST"
value = "1"
when = "+fast"

[[arguments]]
define = "APP_FAST"
variant = "fast"

[[arguments]]
value = "-DDATA_DIR=%(prefix)s/share"
"#
        );
        let tool = "[package]\nname = \"tool\"\n[[versions]]\nversion = \"2\"\n[external]\nprefix = \"/usr\"\n";
        let lib = format!(
            "[package]\nname = \"lib\"\nsummary = \"x\"\n[[versions]]\nversion = \"3\"\nchecksum = \"{SUM}\"\n[[install]]\nfiles = [\"liblib.a\"]\ndest = \"lib\"\n"
        );

        let mut registry = RecipeRegistry::new();
        for text in [tool.to_string(), lib, app] {
            registry.register(parse_recipe(&text).unwrap()).unwrap();
        }
        registry
    }

    fn plan(registry: &RecipeRegistry, spec: &str) -> BuildPlan {
        let resolution = Resolver::new(registry)
            .resolve(&PackageSpec::parse(spec).unwrap())
            .unwrap();
        Composer::new(registry, "/opt/pantry").compose(&resolution).unwrap()
    }

    #[test]
    fn test_order_and_prefixes() {
        let registry = registry();
        let plan = plan(&registry, "app");
        let names: Vec<&str> = plan.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["tool", "lib", "app"]);

        let tool = plan.step("tool").unwrap();
        assert!(tool.external);
        assert_eq!(tool.prefix, PathBuf::from("/usr"));

        let app = plan.step("app").unwrap();
        assert_eq!(
            app.prefix,
            PathBuf::from(format!("/opt/pantry/app-1.0-{}", app.short_hash()))
        );
    }

    #[test]
    fn test_environment_bindings() {
        let registry = registry();
        let default = plan(&registry, "app");
        let app = default.step("app").unwrap();
        let lib_prefix = default.step("lib").unwrap().prefix.display().to_string();

        assert_eq!(app.env("CMAKE_PREFIX_PATH"), Some(format!("/usr:{}", lib_prefix).as_str()));
        assert_eq!(app.env("PATH"), Some(format!("/usr/bin:{}/bin", lib_prefix).as_str()));
        assert_eq!(app.env("LIB_ROOT"), Some(lib_prefix.as_str()));
        assert_eq!(app.env("FAST"), None);

        let fast = plan(&registry, "app+fast");
        assert_eq!(fast.step("app").unwrap().env("FAST"), Some("1"));
    }

    #[test]
    fn test_arguments() {
        let registry = registry();
        let plan = plan(&registry, "app build_type=Debug");
        let app = plan.step("app").unwrap();
        let prefix = app.prefix.display().to_string();

        assert_eq!(
            app.arguments,
            vec![
                format!("-DCMAKE_INSTALL_PREFIX={}", prefix),
                "-DCMAKE_BUILD_TYPE=Debug".to_string(),
                "-G".to_string(),
                "Ninja".to_string(),
                "-DAPP_FAST:BOOL=OFF".to_string(),
                format!("-DDATA_DIR={}/share", prefix),
            ]
        );
    }

    #[test]
    fn test_hash_depends_on_variants() {
        let registry = registry();
        let plain = plan(&registry, "app");
        let fast = plan(&registry, "app+fast");
        assert_ne!(plain.step("app").unwrap().hash, fast.step("app").unwrap().hash);
        assert_eq!(plain.step("lib").unwrap().hash, fast.step("lib").unwrap().hash);
    }
}

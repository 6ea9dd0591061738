// src/resolver/engine.rs

//! Dependency resolver implementation
//!
//! Depth-first expansion of the requested specs against the recipe registry.
//! Each package is fixed exactly once: the first request picks its version
//! and variant assignment. A later request is accepted when that node already
//! satisfies it (version within its constraint, explicitly named variants
//! equal); otherwise resolution fails with a conflict.

use crate::error::{Error, Result};
use crate::recipe::{Recipe, RecipeRegistry};
use crate::spec::PackageSpec;
use crate::variant::VariantAssignment;
use crate::version::{Version, VersionConstraint};
use std::collections::HashMap;
use tracing::{debug, info};

use super::graph::{DependencyInput, Resolution, ResolvedEdge, ResolvedNode};

/// Requester name used for specs given directly by the user
pub const USER_REQUEST: &str = "<request>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

#[derive(Debug, Default)]
struct ResolveState {
    marks: HashMap<String, Mark>,
    /// Packages currently being expanded, outermost first
    stack: Vec<String>,
    discovered: Vec<String>,
    resolved: HashMap<String, ResolvedNode>,
    edges: Vec<ResolvedEdge>,
}

/// Resolves package specs into a [`Resolution`]
pub struct Resolver<'r> {
    registry: &'r RecipeRegistry,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r RecipeRegistry) -> Self {
        Self { registry }
    }

    /// Resolve a single root spec
    pub fn resolve(&self, root: &PackageSpec) -> Result<Resolution> {
        self.resolve_all(std::slice::from_ref(root))
    }

    /// Resolve several roots into one consistent graph
    ///
    /// Roots are expanded in order and share every node. Any resolution error
    /// aborts the whole request.
    pub fn resolve_all(&self, roots: &[PackageSpec]) -> Result<Resolution> {
        let mut state = ResolveState::default();
        let mut root_names: Vec<String> = Vec::new();

        for root in roots {
            self.visit(root, USER_REQUEST, &mut state)?;
            if !root_names.contains(&root.name) {
                root_names.push(root.name.clone());
            }
        }

        let ResolveState {
            discovered,
            mut resolved,
            edges,
            ..
        } = state;
        let nodes: Vec<ResolvedNode> = discovered
            .iter()
            .filter_map(|name| resolved.remove(name))
            .collect();

        info!(
            "Resolved {} to {} packages",
            root_names.join(", "),
            nodes.len()
        );

        Ok(Resolution {
            roots: root_names,
            nodes,
            edges,
        })
    }

    fn visit(&self, request: &PackageSpec, requester: &str, state: &mut ResolveState) -> Result<()> {
        let recipe = self.registry.lookup(&request.name).map_err(|e| match e {
            Error::UnknownPackage { name, .. } if requester != USER_REQUEST => Error::UnknownPackage {
                name,
                required_by: Some(requester.to_string()),
            },
            other => other,
        })?;
        let request = request.clone().checked(recipe)?;
        let name = recipe.name().to_string();

        if state.marks.get(&name) == Some(&Mark::InProgress) {
            let start = state.stack.iter().position(|n| *n == name).unwrap_or(0);
            let mut cycle = state.stack[start..].to_vec();
            cycle.push(name);
            return Err(Error::CyclicDependency { cycle });
        }

        if state.marks.get(&name) == Some(&Mark::Done) {
            let Some(existing) = state.resolved.get(&name) else {
                return Ok(());
            };
            if !accepts(existing, &request) {
                return Err(Error::Conflict {
                    package: name.clone(),
                    first_requester: existing.requested_by.clone(),
                    first: existing.describe(),
                    second_requester: requester.to_string(),
                    second: request.to_string(),
                });
            }
            debug!("{} already resolved, request from {} agrees", name, requester);
            return Ok(());
        }

        let (version, checksum) = self.select_version(recipe, &request.version, requester)?;
        let variants = fix_variants(recipe, &request);

        debug!("Resolving {}@{}{} for {}", name, version, variants, requester);
        state.marks.insert(name.clone(), Mark::InProgress);
        state.stack.push(name.clone());
        state.discovered.push(name.clone());

        let mut inputs: Vec<DependencyInput> = Vec::new();
        for dep in &recipe.dependencies {
            if let Some(when) = &dep.when
                && !when.holds(&version, &variants)
            {
                debug!("{}: skipping {} (when {} does not hold)", name, dep.spec, when);
                continue;
            }

            self.visit(&dep.spec, &name, state)?;

            match inputs.iter_mut().find(|i| i.name == dep.spec.name) {
                Some(input) => {
                    for ty in &dep.types {
                        if !input.types.contains(ty) {
                            input.types.push(*ty);
                        }
                    }
                    input.types.sort();
                }
                None => {
                    let mut types = dep.types.clone();
                    types.sort();
                    types.dedup();
                    inputs.push(DependencyInput {
                        name: dep.spec.name.clone(),
                        types,
                    });
                }
            }
        }

        for input in &inputs {
            state.edges.push(ResolvedEdge {
                from: name.clone(),
                to: input.name.clone(),
                types: input.types.clone(),
            });
        }

        state.stack.pop();
        state.marks.insert(name.clone(), Mark::Done);
        state.resolved.insert(
            name.clone(),
            ResolvedNode {
                name,
                version,
                checksum,
                variants,
                inputs,
                requested_by: requester.to_string(),
                external: recipe.is_external(),
            },
        );
        Ok(())
    }

    /// Exact pin if given, otherwise the highest declared version that satisfies
    fn select_version(
        &self,
        recipe: &Recipe,
        constraint: &VersionConstraint,
        requester: &str,
    ) -> Result<(Version, Option<String>)> {
        let no_match = || Error::NoSatisfyingVersion {
            package: recipe.name().to_string(),
            constraint: constraint.to_string(),
            required_by: requester.to_string(),
        };

        let version = match constraint.pinned() {
            Some(pin) => recipe.version_entry(pin).map(|e| e.version.clone()).ok_or_else(no_match)?,
            None => self
                .registry
                .versions_of(recipe.name())?
                .into_iter()
                .find(|v| constraint.satisfies(v))
                .ok_or_else(no_match)?,
        };

        let checksum = recipe.version_entry(&version).and_then(|e| e.checksum.clone());
        Ok((version, checksum))
    }
}

/// An already fixed node satisfies a later request if the request's version
/// constraint admits its version and every variant the request names matches
fn accepts(existing: &ResolvedNode, request: &PackageSpec) -> bool {
    request.version.satisfies(&existing.version)
        && request
            .variants
            .iter()
            .all(|(name, value)| existing.variants.get(name).is_some_and(|v| v.matches(value)))
}

/// Requested values over recipe defaults
fn fix_variants(recipe: &Recipe, request: &PackageSpec) -> VariantAssignment {
    let mut assignment = recipe.default_assignment();
    for (name, value) in &request.variants {
        assignment.set(name.clone(), value.clone());
    }
    assignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::parse_recipe;

    const SUM: &str = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn registry(recipes: &[&str]) -> RecipeRegistry {
        let mut registry = RecipeRegistry::new();
        for text in recipes {
            registry.register(parse_recipe(text).unwrap()).unwrap();
        }
        registry
    }

    fn simple(name: &str, versions: &[&str], deps: &[&str]) -> String {
        let mut text = format!("[package]\nname = \"{}\"\nsummary = \"x\"\n", name);
        for v in versions {
            text.push_str(&format!("[[versions]]\nversion = \"{}\"\nchecksum = \"{}\"\n", v, SUM));
        }
        for d in deps {
            text.push_str(&format!("[[dependencies]]\nspec = \"{}\"\n", d));
        }
        text
    }

    #[test]
    fn test_leaf_resolves_to_single_node() {
        let reg = registry(&[&simple("libsvm", &["330", "323"], &[])]);
        let resolution = Resolver::new(&reg).resolve(&PackageSpec::named("libsvm")).unwrap();
        assert_eq!(resolution.len(), 1);
        assert!(resolution.edges.is_empty());
        assert_eq!(resolution.nodes[0].version.to_string(), "330");
        assert_eq!(resolution.nodes[0].requested_by, USER_REQUEST);
    }

    #[test]
    fn test_exact_pin_and_range() {
        let reg = registry(&[&simple("libsvm", &["330", "325", "323"], &[])]);
        let resolver = Resolver::new(&reg);

        let pinned = resolver.resolve(&PackageSpec::parse("libsvm@=323").unwrap()).unwrap();
        assert_eq!(pinned.nodes[0].version.to_string(), "323");

        let ranged = resolver.resolve(&PackageSpec::parse("libsvm@:325").unwrap()).unwrap();
        assert_eq!(ranged.nodes[0].version.to_string(), "325");

        let err = resolver.resolve(&PackageSpec::parse("libsvm@=999").unwrap()).unwrap_err();
        assert!(matches!(err, Error::NoSatisfyingVersion { .. }));
    }

    #[test]
    fn test_unknown_dependency_names_requester() {
        let reg = registry(&[&simple("app", &["1"], &["missing"])]);
        let err = Resolver::new(&reg).resolve(&PackageSpec::named("app")).unwrap_err();
        match err {
            Error::UnknownPackage { name, required_by } => {
                assert_eq!(name, "missing");
                assert_eq!(required_by.as_deref(), Some("app"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_cycle_reports_path() {
        let reg = registry(&[&simple("a", &["1"], &["b"]), &simple("b", &["1"], &["a"])]);
        let err = Resolver::new(&reg).resolve(&PackageSpec::named("b")).unwrap_err();
        match err {
            Error::CyclicDependency { cycle } => assert_eq!(cycle, vec!["b", "a", "b"]),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_shared_dependency_resolved_once() {
        let reg = registry(&[
            &simple("app", &["1"], &["left", "right"]),
            &simple("left", &["1"], &["base"]),
            &simple("right", &["1"], &["base"]),
            &simple("base", &["2", "1"], &[]),
        ]);
        let resolution = Resolver::new(&reg).resolve(&PackageSpec::named("app")).unwrap();
        assert_eq!(resolution.len(), 4);
        let order: Vec<&str> = resolution.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(order, vec!["app", "left", "base", "right"]);
        assert_eq!(resolution.node("base").unwrap().requested_by, "left");
    }

    #[test]
    fn test_version_conflict() {
        let reg = registry(&[
            &simple("app", &["1"], &["left", "right"]),
            &simple("left", &["1"], &["base@=1"]),
            &simple("right", &["1"], &["base@=2"]),
            &simple("base", &["2", "1"], &[]),
        ]);
        let err = Resolver::new(&reg).resolve(&PackageSpec::named("app")).unwrap_err();
        match err {
            Error::Conflict {
                package,
                first_requester,
                second_requester,
                ..
            } => {
                assert_eq!(package, "base");
                assert_eq!(first_requester, "left");
                assert_eq!(second_requester, "right");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_later_compatible_request_reuses_node() {
        let reg = registry(&[
            &simple("app", &["1"], &["base@=1"]),
            &simple("base", &["2", "1"], &[]),
        ]);
        let resolver = Resolver::new(&reg);
        let roots = [
            PackageSpec::named("app"),
            PackageSpec::named("base"),
            PackageSpec::parse("base@1:").unwrap(),
        ];
        let resolution = resolver.resolve_all(&roots).unwrap();
        assert_eq!(resolution.len(), 2);
        assert_eq!(resolution.node("base").unwrap().version.to_string(), "1");
        assert_eq!(resolution.node("base").unwrap().requested_by, "app");

        let err = resolver
            .resolve_all(&[PackageSpec::named("app"), PackageSpec::parse("base@2:").unwrap()])
            .unwrap_err();
        match err {
            Error::Conflict { second_requester, second, .. } => {
                assert_eq!(second_requester, USER_REQUEST);
                assert_eq!(second, "base@2:");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_declarations_merge_types() {
        let text = format!(
            "{}[[dependencies]]\nspec = \"tool\"\ntype = [\"build\"]\n[[dependencies]]\nspec = \"tool\"\ntype = [\"run\"]\n",
            simple("app", &["1"], &[])
        );
        let reg = registry(&[&text, &simple("tool", &["1"], &[])]);
        let resolution = Resolver::new(&reg).resolve(&PackageSpec::named("app")).unwrap();
        assert_eq!(resolution.edges.len(), 1);
        assert_eq!(
            resolution.edges[0].types,
            vec![crate::recipe::DependencyType::Build, crate::recipe::DependencyType::Run]
        );
    }
}

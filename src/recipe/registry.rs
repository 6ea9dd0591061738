// src/recipe/registry.rs

//! Recipe registry
//!
//! Holds every known recipe keyed by package name. Registration order is
//! remembered: the plan composer uses it to break ties between packages that
//! become buildable at the same time.

use crate::error::{Error, Result};
use crate::recipe::format::{Recipe, VersionEntry};
use crate::recipe::parser::{parse_recipe_file, validate_recipe};
use crate::version::Version;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Mapping from package name to recipe
#[derive(Debug, Clone, Default)]
pub struct RecipeRegistry {
    recipes: Vec<Recipe>,
    index: HashMap<String, usize>,
}

impl RecipeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.toml` recipe from the given directories, in order
    pub fn from_dirs(dirs: &[PathBuf]) -> Result<Self> {
        let mut registry = Self::new();
        for dir in dirs {
            registry.load_dir(dir)?;
        }
        Ok(registry)
    }

    /// Validate and register a recipe
    ///
    /// Repeated identical version declarations collapse into one. A version
    /// declared twice with different checksums (within the recipe, or against
    /// the recipe it replaces) is a `DuplicateVersion` error. Registering a
    /// name again replaces the earlier recipe but keeps its position.
    pub fn register(&mut self, mut recipe: Recipe) -> Result<()> {
        for warning in validate_recipe(&recipe)? {
            warn!("{}: {}", recipe.name(), warning);
        }

        let name = recipe.name().to_string();
        recipe.versions = dedup_versions(&name, recipe.versions)?;

        match self.index.get(&name) {
            Some(&pos) => {
                check_against(&name, &self.recipes[pos].versions, &recipe.versions)?;
                debug!("Replacing recipe {}", name);
                self.recipes[pos] = recipe;
            }
            None => {
                debug!("Registering recipe {} ({} versions)", name, recipe.versions.len());
                self.index.insert(name, self.recipes.len());
                self.recipes.push(recipe);
            }
        }
        Ok(())
    }

    /// Load every `*.toml` file in `dir`, sorted by file name
    ///
    /// Returns the number of recipes registered.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| {
                Error::Config(format!("cannot read recipe directory {}: {}", dir.display(), e))
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        for path in &paths {
            let recipe = parse_recipe_file(path)?;
            self.register(recipe)?;
        }

        info!("Loaded {} recipes from {}", paths.len(), dir.display());
        Ok(paths.len())
    }

    /// Get a recipe by name
    pub fn get(&self, name: &str) -> Option<&Recipe> {
        self.index.get(name).map(|&pos| &self.recipes[pos])
    }

    /// Get a recipe by name, or `UnknownPackage`
    pub fn lookup(&self, name: &str) -> Result<&Recipe> {
        self.get(name).ok_or_else(|| Error::UnknownPackage {
            name: name.to_string(),
            required_by: None,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Declared versions of a package, highest first
    pub fn versions_of(&self, name: &str) -> Result<Vec<Version>> {
        let recipe = self.lookup(name)?;
        let mut versions: Vec<Version> = recipe.versions.iter().map(|e| e.version.clone()).collect();
        versions.sort_by(|a, b| b.cmp(a));
        Ok(versions)
    }

    /// Registration position of a package
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Recipes in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.iter()
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

fn describe_checksum(checksum: &Option<String>) -> String {
    checksum.clone().unwrap_or_else(|| "<none>".to_string())
}

fn dedup_versions(package: &str, entries: Vec<VersionEntry>) -> Result<Vec<VersionEntry>> {
    let mut unique: Vec<VersionEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        match unique.iter().find(|e| e.version == entry.version) {
            Some(existing) if existing.checksum != entry.checksum => {
                return Err(Error::DuplicateVersion {
                    package: package.to_string(),
                    version: entry.version.to_string(),
                    first: describe_checksum(&existing.checksum),
                    second: describe_checksum(&entry.checksum),
                });
            }
            Some(_) => {}
            None => unique.push(entry),
        }
    }
    Ok(unique)
}

fn check_against(package: &str, previous: &[VersionEntry], incoming: &[VersionEntry]) -> Result<()> {
    for entry in incoming {
        if let Some(old) = previous.iter().find(|e| e.version == entry.version)
            && old.checksum != entry.checksum
        {
            return Err(Error::DuplicateVersion {
                package: package.to_string(),
                version: entry.version.to_string(),
                first: describe_checksum(&old.checksum),
                second: describe_checksum(&entry.checksum),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::parse_recipe;

    const SUM_A: &str = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
    const SUM_B: &str = "sha256:486ea46224d1bb4fb680f34f7c9ad96a8f24ec88be73ea8e5a6c65260e9cb8a7";

    fn recipe(name: &str, versions: &[(&str, &str)]) -> Recipe {
        let mut text = format!("[package]\nname = \"{}\"\nsummary = \"x\"\n", name);
        for (version, checksum) in versions {
            text.push_str(&format!(
                "[[versions]]\nversion = \"{}\"\nchecksum = \"{}\"\n",
                version, checksum
            ));
        }
        parse_recipe(&text).unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = RecipeRegistry::new();
        registry.register(recipe("libsvm", &[("323", SUM_A)])).unwrap();

        assert!(registry.contains("libsvm"));
        assert_eq!(registry.lookup("libsvm").unwrap().name(), "libsvm");
        assert!(matches!(
            registry.lookup("nope"),
            Err(Error::UnknownPackage { .. })
        ));
    }

    #[test]
    fn test_versions_descending() {
        let mut registry = RecipeRegistry::new();
        registry
            .register(recipe("liblinear", &[("230", SUM_A), ("246", SUM_B), ("241", SUM_A)]))
            .unwrap();
        let versions: Vec<String> = registry
            .versions_of("liblinear")
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(versions, vec!["246", "241", "230"]);
    }

    #[test]
    fn test_identical_duplicate_collapses() {
        let mut registry = RecipeRegistry::new();
        registry
            .register(recipe("libsvm", &[("323", SUM_A), ("323", SUM_A)]))
            .unwrap();
        assert_eq!(registry.lookup("libsvm").unwrap().versions.len(), 1);
    }

    #[test]
    fn test_conflicting_duplicate_rejected() {
        let mut registry = RecipeRegistry::new();
        let err = registry
            .register(recipe("libsvm", &[("323", SUM_A), ("323", SUM_B)]))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateVersion { .. }));
    }

    #[test]
    fn test_reregister_keeps_position_and_checks_checksums() {
        let mut registry = RecipeRegistry::new();
        registry.register(recipe("a", &[("1", SUM_A)])).unwrap();
        registry.register(recipe("b", &[("1", SUM_A)])).unwrap();
        registry.register(recipe("a", &[("1", SUM_A), ("2", SUM_B)])).unwrap();

        assert_eq!(registry.position("a"), Some(0));
        assert_eq!(registry.lookup("a").unwrap().versions.len(), 2);

        let err = registry.register(recipe("b", &[("1", SUM_B)])).unwrap_err();
        assert!(matches!(err, Error::DuplicateVersion { .. }));
    }

    #[test]
    fn test_load_dir_in_file_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zlib", "armadillo"] {
            std::fs::write(
                dir.path().join(format!("{}.toml", name)),
                format!(
                    "[package]\nname = \"{}\"\n[[versions]]\nversion = \"1\"\n[external]\nprefix = \"/usr\"\n",
                    name
                ),
            )
            .unwrap();
        }
        std::fs::write(dir.path().join("README.md"), "not a recipe").unwrap();

        let mut registry = RecipeRegistry::new();
        assert_eq!(registry.load_dir(dir.path()).unwrap(), 2);
        assert_eq!(registry.position("armadillo"), Some(0));
        assert_eq!(registry.position("zlib"), Some(1));
    }
}

// src/recipe/parser.rs

//! Recipe file parsing and validation

use crate::checksum::Checksum;
use crate::error::{Error, Result};
use crate::recipe::format::{BuildSystem, DependencyType, Recipe};
use crate::variant::Condition;
use std::collections::HashSet;
use std::path::Path;
use strum::IntoEnumIterator;

/// Parse a recipe from a TOML string
pub fn parse_recipe(content: &str) -> Result<Recipe> {
    toml::from_str(content).map_err(|e| Error::ParseError(format!("Invalid recipe: {}", e)))
}

/// Parse a recipe from a file
///
/// The file's directory is remembered so patches can be found next to it.
pub fn parse_recipe_file(path: &Path) -> Result<Recipe> {
    let content = std::fs::read_to_string(path)?;

    let mut recipe = parse_recipe(&content)
        .map_err(|e| Error::ParseError(format!("{}: {}", path.display(), e)))?;
    recipe.recipe_dir = path.parent().map(Path::to_path_buf);
    Ok(recipe)
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Check that a `when` condition only references declared variants with valid values
fn check_condition(recipe: &Recipe, condition: &Option<Condition>, context: &str) -> Result<()> {
    let Some(condition) = condition else {
        return Ok(());
    };
    for setting in &condition.variants {
        let decl = recipe.variant(&setting.name).ok_or_else(|| {
            Error::invalid_recipe(
                recipe.name(),
                format!("{} condition '{}' uses undeclared variant '{}'", context, condition, setting.name),
            )
        })?;
        decl.normalize(&setting.value).map_err(|reason| {
            Error::invalid_recipe(recipe.name(), format!("{} condition '{}': {}", context, condition, reason))
        })?;
    }
    Ok(())
}

/// Validate a recipe for completeness and correctness
///
/// Hard errors are returned as `InvalidRecipe`; soft problems come back as
/// warnings for the caller to log.
pub fn validate_recipe(recipe: &Recipe) -> Result<Vec<String>> {
    let mut warnings = Vec::new();
    let name = recipe.name();

    if !is_valid_name(name) {
        return Err(Error::invalid_recipe(
            name,
            "package name must be non-empty and use only letters, digits, '-', '_' or '.'",
        ));
    }

    if recipe.versions.is_empty() {
        return Err(Error::invalid_recipe(name, "no versions declared"));
    }

    for entry in &recipe.versions {
        match &entry.checksum {
            Some(checksum) => {
                Checksum::parse(checksum).map_err(|e| {
                    Error::invalid_recipe(name, format!("version {}: {}", entry.version, e))
                })?;
            }
            None if !recipe.is_external() => {
                return Err(Error::invalid_recipe(
                    name,
                    format!("version {} has no checksum", entry.version),
                ));
            }
            None => {}
        }
    }

    let mut seen = HashSet::new();
    for decl in &recipe.variants {
        if decl.name.is_empty() || !decl.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::invalid_recipe(
                name,
                format!("invalid variant name '{}'", decl.name),
            ));
        }
        if !seen.insert(decl.name.as_str()) {
            return Err(Error::invalid_recipe(
                name,
                format!("variant '{}' declared twice", decl.name),
            ));
        }
        decl.normalize(&decl.default)
            .map_err(|reason| Error::invalid_recipe(name, format!("default of {}", reason)))?;
    }

    for dep in &recipe.dependencies {
        if dep.types.is_empty() {
            let known: Vec<String> = DependencyType::iter().map(|t| t.to_string()).collect();
            return Err(Error::invalid_recipe(
                name,
                format!("dependency '{}' has no type (expected some of: {})", dep.spec, known.join(", ")),
            ));
        }
        check_condition(recipe, &dep.when, &format!("dependency '{}'", dep.spec))?;
    }

    for patch in &recipe.build.patches {
        check_condition(recipe, &patch.when, &format!("patch '{}'", patch.file))?;
    }

    for rule in &recipe.environment {
        if rule.name.is_empty() {
            return Err(Error::invalid_recipe(name, "environment rule without a name"));
        }
        if rule.value.is_some() == rule.prefix_of.is_some() {
            return Err(Error::invalid_recipe(
                name,
                format!("environment rule {} needs exactly one of value or prefix_of", rule.name),
            ));
        }
        check_condition(recipe, &rule.when, &format!("environment rule {}", rule.name))?;
    }

    for rule in &recipe.arguments {
        match (&rule.value, &rule.define, &rule.variant) {
            (Some(_), None, None) => {}
            (None, Some(define), Some(variant)) => {
                if recipe.variant(variant).is_none() {
                    return Err(Error::invalid_recipe(
                        name,
                        format!("argument {} renders undeclared variant '{}'", define, variant),
                    ));
                }
            }
            _ => {
                return Err(Error::invalid_recipe(
                    name,
                    "argument rule needs either value, or define together with variant",
                ));
            }
        }
        check_condition(recipe, &rule.when, "argument")?;
    }

    for rule in &recipe.filters {
        check_condition(recipe, &rule.when, &format!("filter on {}", rule.file))?;
    }

    for rule in &recipe.install {
        if rule.files.is_empty() {
            warnings.push(format!("install rule for {} lists no files", rule.dest));
        }
        check_condition(recipe, &rule.when, &format!("install rule for {}", rule.dest))?;
    }

    // Warn about missing fields
    if recipe.package.summary.is_none() {
        warnings.push("Missing package summary".to_string());
    }

    // Only checkable for recipes loaded from a file
    if recipe.recipe_dir.is_some() {
        for patch in &recipe.build.patches {
            let path = recipe.patch_path(patch);
            if !path.is_file() {
                warnings.push(format!(
                    "patch file {} not found; the build will stop at the patch phase",
                    path.display()
                ));
            }
        }
    }

    if recipe.is_external() {
        if !recipe.build.patches.is_empty() || !recipe.install.is_empty() || !recipe.filters.is_empty() {
            warnings.push("External package has build rules that will never run".to_string());
        }
    } else {
        if recipe.package.url.is_none() {
            warnings.push("No source url; package cannot be fetched".to_string());
        }
        if recipe.build.system == BuildSystem::Makefile && recipe.install.is_empty() {
            warnings.push("Makefile build has no install rules".to_string());
        }
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKSUM: &str = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn recipe(body: &str) -> Recipe {
        parse_recipe(&format!(
            r#"
[package]
name = "test"
summary = "Test package"
url = "https://example.com/test-%(version)s.tar.gz"

{}
"#,
            body
        ))
        .unwrap()
    }

    #[test]
    fn test_parse_valid_recipe() {
        let r = recipe(&format!(
            "[[versions]]\nversion = \"1.0\"\nchecksum = \"{}\"\n[[install]]\nfiles = [\"test\"]\ndest = \"bin\"\n",
            CHECKSUM
        ));
        assert_eq!(r.name(), "test");
        assert!(validate_recipe(&r).unwrap().is_empty());
    }

    #[test]
    fn test_parse_invalid_recipe() {
        let content = "this is not valid toml at all {}";
        assert!(parse_recipe(content).is_err());
    }

    #[test]
    fn test_parse_bad_dependency_spec() {
        let content = format!(
            "[package]\nname = \"t\"\n[[versions]]\nversion = \"1\"\nchecksum = \"{}\"\n[[dependencies]]\nspec = \"a@\"\n",
            CHECKSUM
        );
        assert!(parse_recipe(&content).is_err());
    }

    #[test]
    fn test_validate_requires_versions() {
        let r = recipe("");
        assert!(matches!(validate_recipe(&r), Err(Error::InvalidRecipe { .. })));
    }

    #[test]
    fn test_validate_bad_checksum() {
        let r = recipe("[[versions]]\nversion = \"1.0\"\nchecksum = \"md5:abc123\"\n");
        assert!(validate_recipe(&r).is_err());
    }

    #[test]
    fn test_validate_missing_checksum() {
        let r = recipe("[[versions]]\nversion = \"1.0\"\n");
        assert!(validate_recipe(&r).is_err());

        let r = recipe("[[versions]]\nversion = \"1.0\"\n[external]\nprefix = \"/usr\"\n");
        assert!(validate_recipe(&r).is_ok());
    }

    #[test]
    fn test_validate_undeclared_variant_in_condition() {
        let r = recipe(&format!(
            "[[versions]]\nversion = \"1.0\"\nchecksum = \"{}\"\n[[dependencies]]\nspec = \"zlib\"\nwhen = \"+tbb\"\n",
            CHECKSUM
        ));
        let err = validate_recipe(&r).unwrap_err();
        assert!(err.to_string().contains("undeclared variant 'tbb'"));
    }

    #[test]
    fn test_validate_empty_dependency_types() {
        let r = recipe(&format!(
            "[[versions]]\nversion = \"1\"\nchecksum = \"{}\"\n[[dependencies]]\nspec = \"zlib\"\ntype = []\n",
            CHECKSUM
        ));
        let err = validate_recipe(&r).unwrap_err().to_string();
        assert!(err.contains("zlib"));
        assert!(err.contains("build, link, run"));
    }

    #[test]
    fn test_validate_environment_rule_shape() {
        let r = recipe(&format!(
            "[[versions]]\nversion = \"1.0\"\nchecksum = \"{}\"\n[[environment]]\nname = \"X\"\nvalue = \"1\"\nprefix_of = \"zlib\"\n",
            CHECKSUM
        ));
        assert!(validate_recipe(&r).is_err());
    }

    #[test]
    fn test_validate_warnings() {
        let r = parse_recipe(&format!(
            "[package]\nname = \"bare\"\n[[versions]]\nversion = \"1\"\nchecksum = \"{}\"\n",
            CHECKSUM
        ))
        .unwrap();
        let warnings = validate_recipe(&r).unwrap();
        assert!(warnings.iter().any(|w| w.contains("summary")));
        assert!(warnings.iter().any(|w| w.contains("url")));
        assert!(warnings.iter().any(|w| w.contains("install rules")));
    }

    #[test]
    fn test_parse_recipe_file_sets_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.toml");
        std::fs::write(
            &path,
            format!("[package]\nname = \"t\"\n[[versions]]\nversion = \"1\"\nchecksum = \"{}\"\n", CHECKSUM),
        )
        .unwrap();

        let r = parse_recipe_file(&path).unwrap();
        assert_eq!(r.recipe_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_missing_patch_file_warns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool.toml");
        std::fs::write(
            &path,
            format!(
                "[package]\nname = \"tool\"\nsummary = \"x\"\nurl = \"https://example.com/t.tar.gz\"\n\
                 [[versions]]\nversion = \"1\"\nchecksum = \"{}\"\n\
                 [build]\nsystem = \"cmake\"\n[[build.patches]]\nfile = \"tool/fix.patch\"\n",
                CHECKSUM
            ),
        )
        .unwrap();

        let r = parse_recipe_file(&path).unwrap();
        let warnings = validate_recipe(&r).unwrap();
        assert!(warnings.iter().any(|w| w.contains("fix.patch") && w.contains("not found")));

        std::fs::create_dir(dir.path().join("tool")).unwrap();
        std::fs::write(dir.path().join("tool/fix.patch"), "--- a\n+++ b\n").unwrap();
        let warnings = validate_recipe(&r).unwrap();
        assert!(!warnings.iter().any(|w| w.contains("fix.patch")));
    }
}

// src/recipe/format.rs

//! Recipe file format definitions
//!
//! A recipe is a TOML file describing one package: its declared versions
//! with source checksums, its variants, its conditional dependencies and the
//! rules that shape its build environment, arguments and installation.

use crate::spec::PackageSpec;
use crate::variant::{Condition, VariantAssignment, VariantValue};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumIter, EnumString};

/// A complete recipe for one package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Package metadata
    pub package: PackageSection,

    /// Declared versions, newest first by convention (order is not relied upon)
    #[serde(default)]
    pub versions: Vec<VersionEntry>,

    /// Declared variants
    #[serde(default)]
    pub variants: Vec<VariantDecl>,

    /// Dependency declarations, in declaration order
    #[serde(default)]
    pub dependencies: Vec<DependencyDecl>,

    /// Build instructions
    #[serde(default)]
    pub build: BuildSection,

    /// Environment variable rules
    #[serde(default)]
    pub environment: Vec<EnvironmentRule>,

    /// Build-system argument rules
    #[serde(default)]
    pub arguments: Vec<ArgumentRule>,

    /// Source file edits applied before building
    #[serde(default)]
    pub filters: Vec<FilterRule>,

    /// Explicit install rules (copy built files into the prefix)
    #[serde(default)]
    pub install: Vec<InstallRule>,

    /// Present for packages provided by the host instead of being built
    #[serde(default)]
    pub external: Option<ExternalSection>,

    /// Directory the recipe was loaded from (patch files are relative to it)
    #[serde(skip)]
    pub recipe_dir: Option<PathBuf>,
}

impl Recipe {
    pub fn name(&self) -> &str {
        &self.package.name
    }

    /// True if the package is provided by the host
    pub fn is_external(&self) -> bool {
        self.external.is_some()
    }

    /// Look up a declared variant
    pub fn variant(&self, name: &str) -> Option<&VariantDecl> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// Look up a declared version
    pub fn version_entry(&self, version: &Version) -> Option<&VersionEntry> {
        self.versions.iter().find(|e| &e.version == version)
    }

    /// Assignment with every declared variant at its default
    pub fn default_assignment(&self) -> VariantAssignment {
        let mut assignment = VariantAssignment::new();
        for decl in &self.variants {
            assignment.set(decl.name.clone(), decl.default.clone());
        }
        assignment
    }

    /// Substitute variables in a string
    ///
    /// Replaces `%(name)s`, `%(version)s` and `%(prefix)s`.
    pub fn substitute(&self, template: &str, version: &Version, prefix: &Path) -> String {
        template
            .replace("%(name)s", &self.package.name)
            .replace("%(version)s", version.as_str())
            .replace("%(prefix)s", &prefix.to_string_lossy())
    }

    /// Source archive URL for `version`, if the recipe has a URL template
    pub fn archive_url(&self, version: &Version) -> Option<String> {
        self.package
            .url
            .as_ref()
            .map(|url| url.replace("%(version)s", version.as_str()).replace("%(name)s", &self.package.name))
    }

    /// Archive filename from the URL
    pub fn archive_filename(&self, version: &Version) -> Option<String> {
        self.archive_url(version).map(|url| {
            url.split('/')
                .next_back()
                .filter(|s| !s.is_empty())
                .unwrap_or("source.tar.gz")
                .to_string()
        })
    }

    /// Resolve a patch file relative to the recipe directory
    pub fn patch_path(&self, patch: &PatchInfo) -> PathBuf {
        match &self.recipe_dir {
            Some(dir) => dir.join(&patch.file),
            None => PathBuf::from(&patch.file),
        }
    }
}

/// Package metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSection {
    /// Package name
    pub name: String,

    /// Short one-line summary
    #[serde(default)]
    pub summary: Option<String>,

    /// Longer description
    #[serde(default)]
    pub description: Option<String>,

    /// Project homepage
    #[serde(default)]
    pub homepage: Option<String>,

    /// Source archive URL template; `%(version)s` is substituted
    #[serde(default)]
    pub url: Option<String>,

    /// Page listing all release archives
    #[serde(default)]
    pub list_url: Option<String>,
}

/// One declared version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: Version,

    /// `sha256:<hex>` of the source archive; external recipes may omit it
    #[serde(default)]
    pub checksum: Option<String>,
}

/// A declared variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantDecl {
    pub name: String,

    /// Default value; a boolean for switches, a string for enumerations
    pub default: VariantValue,

    /// Allowed values for an enumeration (empty means any string)
    #[serde(default)]
    pub values: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,
}

impl VariantDecl {
    /// True for `+name`/`~name` switches
    pub fn is_bool(&self) -> bool {
        matches!(self.default, VariantValue::Bool(_))
    }

    /// Check a requested value against this declaration
    ///
    /// Returns the normalized value: switches always come back as `Bool`.
    pub fn normalize(&self, value: &VariantValue) -> Result<VariantValue, String> {
        if self.is_bool() {
            return value.as_bool().map(VariantValue::Bool).ok_or_else(|| {
                format!("variant '{}' is a switch, got '{}'", self.name, value)
            });
        }

        match value {
            VariantValue::Bool(_) => Err(format!(
                "variant '{}' takes a value, use {}=<value>",
                self.name, self.name
            )),
            VariantValue::Choice(choice) => {
                if !self.values.is_empty() && !self.values.iter().any(|v| v == choice) {
                    return Err(format!(
                        "'{}' is not a valid value for variant '{}' (expected one of: {})",
                        choice,
                        self.name,
                        self.values.join(", ")
                    ));
                }
                Ok(value.clone())
            }
        }
    }
}

/// Kind of dependency edge
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DependencyType {
    /// Needed while building (tools on PATH)
    Build,
    /// Linked against (headers and libraries)
    Link,
    /// Needed when the package runs
    Run,
}

fn default_dependency_types() -> Vec<DependencyType> {
    vec![DependencyType::Build, DependencyType::Link]
}

/// One dependency declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyDecl {
    /// Requested package, e.g. `libsvm@323:323` or `boost+system`
    pub spec: PackageSpec,

    /// Edge types (default: build and link)
    #[serde(rename = "type", default = "default_dependency_types")]
    pub types: Vec<DependencyType>,

    /// Only applies when the condition holds for this package
    #[serde(default)]
    pub when: Option<Condition>,
}

/// Supported build systems
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BuildSystem {
    /// `make` in the source directory, install via `[[install]]` rules
    #[default]
    Makefile,
    /// CMake configure, build and install
    CMake,
}

/// Build instructions section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSection {
    #[serde(default)]
    pub system: BuildSystem,

    /// Out-of-source build directory relative to the source root (CMake)
    #[serde(default)]
    pub build_directory: Option<String>,

    /// CMake generator (e.g. `Ninja`)
    #[serde(default)]
    pub generator: Option<String>,

    /// Targets to build instead of the default
    #[serde(default)]
    pub targets: Vec<String>,

    /// Patches applied in order after unpacking
    #[serde(default)]
    pub patches: Vec<PatchInfo>,

    /// Parallel jobs for this package (overrides the global setting)
    #[serde(default)]
    pub jobs: Option<u32>,
}

/// Patch file information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchInfo {
    /// Patch path relative to the recipe directory
    pub file: String,

    /// Strip level for patch (default: 1)
    #[serde(default = "default_strip")]
    pub strip: u32,

    /// Apply only if the condition holds
    #[serde(default)]
    pub when: Option<Condition>,
}

fn default_strip() -> u32 {
    1
}

/// Environment variable rule
///
/// Exactly one of `value` or `prefix_of` must be given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentRule {
    pub name: String,

    /// Literal value; `%(prefix)s` and friends are substituted
    #[serde(default)]
    pub value: Option<String>,

    /// Bind to the install prefix of another resolved package
    #[serde(default)]
    pub prefix_of: Option<String>,

    #[serde(default)]
    pub when: Option<Condition>,
}

/// Build-system argument rule
///
/// Either a literal `value`, or `define` + `variant` which renders a CMake
/// definition from the variant's value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentRule {
    #[serde(default)]
    pub value: Option<String>,

    #[serde(default)]
    pub define: Option<String>,

    #[serde(default)]
    pub variant: Option<String>,

    #[serde(default)]
    pub when: Option<Condition>,
}

/// Literal replacement in a source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRule {
    pub file: String,
    pub from: String,
    pub to: String,

    #[serde(default)]
    pub when: Option<Condition>,
}

/// Copy built files into a prefix subdirectory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallRule {
    /// Glob patterns relative to the source root
    pub files: Vec<String>,

    /// Destination relative to the prefix (e.g. `bin`)
    pub dest: String,

    #[serde(default)]
    pub when: Option<Condition>,
}

/// Host-provided package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalSection {
    /// Where the host installed it
    pub prefix: PathBuf,
}

// src/plan/mod.rs

//! Build plans
//!
//! A [`BuildPlan`] lists one [`PlanStep`] per resolved package in an order
//! where every dependency comes before its dependents. Each step carries the
//! install prefix, environment bindings and build-system arguments computed
//! from the resolved graph, so executors need nothing else to build it.

mod composer;

pub use composer::{Composer, HASH_DISPLAY_LEN};

use crate::recipe::{BuildSystem, PatchInfo};
use crate::variant::VariantAssignment;
use crate::version::Version;
use serde::Serialize;
use std::path::PathBuf;

/// How a binding combines with the value already in effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvOp {
    /// Replace the variable
    Set,
    /// Put the value in front of an existing `:`-separated search path
    Prepend,
}

/// One environment variable assignment, in application order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvBinding {
    pub name: String,
    pub value: String,
    pub op: EnvOp,
}

impl EnvBinding {
    pub fn set(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            op: EnvOp::Set,
        }
    }

    pub fn prepend(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            op: EnvOp::Prepend,
        }
    }
}

/// Apply bindings in order on top of a base environment
///
/// `base` supplies the inherited value of a variable. Returns the final
/// value of every variable the bindings touch, in first-touched order.
pub fn effective_environment(
    bindings: &[EnvBinding],
    base: impl Fn(&str) -> Option<String>,
) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();
    for binding in bindings {
        let current = match result.iter().find(|(name, _)| *name == binding.name) {
            Some((_, value)) => Some(value.clone()),
            None => base(&binding.name),
        };
        let value = match (binding.op, current) {
            (EnvOp::Prepend, Some(current)) if !current.is_empty() => {
                format!("{}:{}", binding.value, current)
            }
            _ => binding.value.clone(),
        };
        match result.iter_mut().find(|(name, _)| *name == binding.name) {
            Some(entry) => entry.1 = value,
            None => result.push((binding.name.clone(), value)),
        }
    }
    result
}

/// A source file edit that applies to this step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterStep {
    pub file: String,
    pub from: String,
    pub to: String,
}

/// Files to copy into a prefix subdirectory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallStep {
    pub files: Vec<String>,
    pub dest: String,
}

/// A patch that applies to this step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchStep {
    pub path: PathBuf,
    pub strip: u32,
}

impl PatchStep {
    pub(crate) fn from_info(path: PathBuf, info: &PatchInfo) -> Self {
        Self {
            path,
            strip: info.strip,
        }
    }
}

/// Everything needed to build one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub name: String,
    pub version: Version,
    pub variants: VariantAssignment,
    /// Hex content hash of the node and its dependencies
    pub hash: String,
    pub prefix: PathBuf,
    /// Provided by the host; nothing to build
    pub external: bool,
    pub system: BuildSystem,
    pub source_url: Option<String>,
    pub checksum: Option<String>,
    pub build_directory: Option<String>,
    pub targets: Vec<String>,
    pub jobs: Option<u32>,
    pub environment: Vec<EnvBinding>,
    pub arguments: Vec<String>,
    pub patches: Vec<PatchStep>,
    pub filters: Vec<FilterStep>,
    pub install: Vec<InstallStep>,
    /// Direct dependencies (package names)
    pub dependencies: Vec<String>,
}

impl PlanStep {
    /// Abbreviated hash used in prefixes and listings
    pub fn short_hash(&self) -> &str {
        &self.hash[..HASH_DISPLAY_LEN.min(self.hash.len())]
    }

    /// Last binding of an environment variable
    pub fn env(&self, name: &str) -> Option<&str> {
        self.environment
            .iter()
            .rev()
            .find(|b| b.name == name)
            .map(|b| b.value.as_str())
    }

    /// `name@version+variants/hash`
    pub fn describe(&self) -> String {
        format!(
            "{}@{}{}/{}",
            self.name,
            self.version,
            self.variants,
            self.short_hash()
        )
    }
}

/// Ordered build steps for a resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    pub install_root: PathBuf,
    pub steps: Vec<PlanStep>,
}

impl BuildPlan {
    pub fn step(&self, name: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Index of a package's step
    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps that actually need building
    pub fn buildable(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter().filter(|s| !s.external)
    }
}

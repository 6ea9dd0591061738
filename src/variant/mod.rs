// src/variant/mod.rs
//! Variant values, assignments and `when` conditions
//!
//! Variants are build-time switches declared by a recipe. Syntax follows the
//! recipe spec language: `+tbb` (on), `~mpi` (off), `build_type=Release`.
//! A [`Condition`] such as `@230 +tbb` gates a dependency edge or build rule
//! on the node's version and fixed variant assignment.

use crate::error::{Error, Result};
use crate::version::{Version, VersionConstraint};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Value of a single variant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantValue {
    /// Boolean switch (`+name` / `~name`)
    Bool(bool),
    /// Enumeration value (`name=value`)
    Choice(String),
}

impl VariantValue {
    /// Interpret the value as a boolean, accepting `true`/`false` choices
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Choice(s) => match s.as_str() {
                "true" | "True" | "on" | "ON" => Some(true),
                "false" | "False" | "off" | "OFF" => Some(false),
                _ => None,
            },
        }
    }

    /// Semantic equality: `shared=true` matches `+shared`
    pub fn matches(&self, other: &VariantValue) -> bool {
        match (self, other) {
            (Self::Choice(a), Self::Choice(b)) => a == b,
            _ => self.as_bool().is_some() && self.as_bool() == other.as_bool(),
        }
    }
}

impl fmt::Display for VariantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Choice(s) => write!(f, "{}", s),
        }
    }
}

/// One `+name`, `~name` or `name=value` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSetting {
    pub name: String,
    pub value: VariantValue,
}

impl VariantSetting {
    /// Create a boolean setting
    pub fn enabled(name: impl Into<String>, on: bool) -> Self {
        Self {
            name: name.into(),
            value: VariantValue::Bool(on),
        }
    }

    /// Create an enumeration setting
    pub fn choice(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: VariantValue::Choice(value.into()),
        }
    }
}

impl fmt::Display for VariantSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            VariantValue::Bool(true) => write!(f, "+{}", self.name),
            VariantValue::Bool(false) => write!(f, "~{}", self.name),
            VariantValue::Choice(v) => write!(f, "{}={}", self.name, v),
        }
    }
}

/// Complete variant assignment of one resolved package
///
/// Keyed by variant name so iteration and display are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct VariantAssignment {
    values: BTreeMap<String, VariantValue>,
}

impl VariantAssignment {
    /// Create an empty assignment
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variant, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: VariantValue) {
        self.values.insert(name.into(), value);
    }

    /// Get a variant value
    pub fn get(&self, name: &str) -> Option<&VariantValue> {
        self.values.get(name)
    }

    /// True if the variant is a boolean set to on
    pub fn is_enabled(&self, name: &str) -> bool {
        self.values
            .get(name)
            .and_then(VariantValue::as_bool)
            .unwrap_or(false)
    }

    /// Check every setting against this assignment
    pub fn satisfies(&self, settings: &[VariantSetting]) -> bool {
        settings.iter().all(|setting| {
            self.values
                .get(&setting.name)
                .is_some_and(|value| value.matches(&setting.value))
        })
    }

    /// Iterate over (name, value) pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariantValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for VariantAssignment {
    /// Booleans first (`+mpi~tbb`), then enumerations (` build_type=Release`)
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.values {
            if let VariantValue::Bool(on) = value {
                write!(f, "{}{}", if *on { '+' } else { '~' }, name)?;
            }
        }
        for (name, value) in &self.values {
            if let VariantValue::Choice(choice) = value {
                write!(f, " {}={}", name, choice)?;
            }
        }
        Ok(())
    }
}

/// A `when` predicate over a package's version and variant assignment
///
/// Syntax: optional `@constraint` followed by variant settings, e.g.
/// `+tbb`, `~mpi`, `@230`, `@2.0: build_type=Debug`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Condition {
    pub version: Option<VersionConstraint>,
    pub variants: Vec<VariantSetting>,
}

impl Condition {
    /// Parse a condition string
    pub fn parse(s: &str) -> Result<Self> {
        let clauses = crate::spec::parse_clauses(s, false)
            .map_err(|reason| Error::ParseError(format!("invalid condition '{}': {}", s, reason)))?;

        if clauses.version.is_none() && clauses.variants.is_empty() {
            return Err(Error::ParseError(format!("empty condition '{}'", s)));
        }

        Ok(Self {
            version: clauses.version,
            variants: clauses.variants,
        })
    }

    /// Evaluate against a resolved version and variant assignment
    pub fn holds(&self, version: &Version, assignment: &VariantAssignment) -> bool {
        self.version.as_ref().is_none_or(|c| c.satisfies(version))
            && assignment.satisfies(&self.variants)
    }

    /// Names of the variants this condition inspects
    pub fn variant_names(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|s| s.name.as_str())
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(version) = &self.version {
            parts.push(format!("@{}", version));
        }
        parts.extend(self.variants.iter().map(|s| s.to_string()));
        write!(f, "{}", parts.join(" "))
    }
}

impl FromStr for Condition {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Condition::parse(s)
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Condition::parse(&text).map_err(serde::de::Error::custom)
    }
}

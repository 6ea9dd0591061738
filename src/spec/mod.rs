// src/spec/mod.rs
//! Package requests: `name[@constraint][+variant|~variant|key=value ...]`
//!
//! A [`PackageSpec`] is what a user (or a recipe dependency) asks for. It is
//! parsed without reference to any recipe; [`PackageSpec::checked`] then
//! validates the requested variants against the recipe that will satisfy it.

use crate::error::{Error, Result};
use crate::recipe::{Recipe, RecipeRegistry};
use crate::variant::{VariantSetting, VariantValue};
use crate::version::VersionConstraint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A request for a package, possibly constrained by version and variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub version: VersionConstraint,
    pub variants: BTreeMap<String, VariantValue>,
}

impl PackageSpec {
    /// Unconstrained request for `name`
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: VersionConstraint::Any,
            variants: BTreeMap::new(),
        }
    }

    /// Parse spec text such as `seidr+tbb~mpi` or `libsvm@323:323`
    pub fn parse(text: &str) -> Result<Self> {
        let clauses = parse_clauses(text, true).map_err(|reason| Error::malformed(text, reason))?;
        let name = clauses
            .name
            .ok_or_else(|| Error::malformed(text, "missing package name"))?;

        let mut variants = BTreeMap::new();
        for setting in clauses.variants {
            match variants.get(&setting.name) {
                Some(existing) if existing != &setting.value => {
                    return Err(Error::malformed(
                        text,
                        format!(
                            "variant '{}' given contradictory values {} and {}",
                            setting.name, existing, setting.value
                        ),
                    ));
                }
                _ => {
                    variants.insert(setting.name, setting.value);
                }
            }
        }

        Ok(Self {
            name,
            version: clauses.version.unwrap_or_default(),
            variants,
        })
    }

    /// Parse and validate against the registered recipe of the same name
    pub fn parse_checked(text: &str, registry: &RecipeRegistry) -> Result<Self> {
        let spec = Self::parse(text)?;
        let recipe = registry.lookup(&spec.name)?;
        spec.checked(recipe)
    }

    /// Validate requested variants against `recipe`
    ///
    /// Every named variant must be declared, and its value must fit the
    /// declaration. Boolean values written as `name=true` are normalized.
    pub fn checked(mut self, recipe: &Recipe) -> Result<Self> {
        if self.name != recipe.name() {
            return Err(Error::malformed(
                self.to_string(),
                format!("recipe '{}' does not provide this package", recipe.name()),
            ));
        }

        let shown = self.to_string();
        for (name, value) in self.variants.iter_mut() {
            let decl = recipe.variant(name).ok_or_else(|| {
                Error::malformed(
                    &shown,
                    format!("variant '{}' is not declared by {}", name, recipe.name()),
                )
            })?;
            *value = decl
                .normalize(value)
                .map_err(|reason| Error::malformed(&shown, reason))?;
        }

        Ok(self)
    }

    /// Settings in name order
    pub fn settings(&self) -> impl Iterator<Item = VariantSetting> + '_ {
        self.variants.iter().map(|(name, value)| VariantSetting {
            name: name.clone(),
            value: value.clone(),
        })
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.version.is_any() {
            write!(f, "@{}", self.version)?;
        }
        for (name, value) in &self.variants {
            if let VariantValue::Bool(on) = value {
                write!(f, "{}{}", if *on { '+' } else { '~' }, name)?;
            }
        }
        for (name, value) in &self.variants {
            if let VariantValue::Choice(choice) = value {
                write!(f, " {}={}", name, choice)?;
            }
        }
        Ok(())
    }
}

impl FromStr for PackageSpec {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        PackageSpec::parse(s)
    }
}

impl Serialize for PackageSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        PackageSpec::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Raw clauses of a spec or condition, before any recipe is consulted
#[derive(Debug, Default)]
pub(crate) struct Clauses {
    pub name: Option<String>,
    pub version: Option<VersionConstraint>,
    pub variants: Vec<VariantSetting>,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn take_while(chars: &[char], pos: &mut usize, pred: impl Fn(char) -> bool) -> String {
    let start = *pos;
    while *pos < chars.len() && pred(chars[*pos]) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

/// Tokenize spec text into its clauses
///
/// With `with_name`, a package name must lead; without it (conditions) no
/// name is accepted.
pub(crate) fn parse_clauses(text: &str, with_name: bool) -> std::result::Result<Clauses, String> {
    let chars: Vec<char> = text.trim().chars().collect();
    let mut pos = 0;
    let mut clauses = Clauses::default();

    if with_name {
        let name = take_while(&chars, &mut pos, is_name_char);
        if name.is_empty() {
            return Err("missing package name".to_string());
        }
        clauses.name = Some(name);
    }

    loop {
        while pos < chars.len() && chars[pos].is_whitespace() {
            pos += 1;
        }
        let Some(&c) = chars.get(pos) else {
            break;
        };

        match c {
            '@' => {
                pos += 1;
                let text = take_while(&chars, &mut pos, |c| {
                    !c.is_whitespace() && c != '+' && c != '~'
                });
                if text.is_empty() {
                    return Err("empty version after '@'".to_string());
                }
                if clauses.version.is_some() {
                    return Err("more than one version constraint".to_string());
                }
                let constraint = VersionConstraint::parse(&text).map_err(|e| e.to_string())?;
                clauses.version = Some(constraint);
            }
            '+' | '~' => {
                pos += 1;
                let name = take_while(&chars, &mut pos, is_ident_char);
                if name.is_empty() {
                    return Err(format!("missing variant name after '{}'", c));
                }
                clauses.variants.push(VariantSetting::enabled(name, c == '+'));
            }
            c if is_ident_char(c) => {
                let key = take_while(&chars, &mut pos, is_ident_char);
                if chars.get(pos) != Some(&'=') {
                    return Err(format!("unexpected token '{}'", key));
                }
                pos += 1;
                let value = take_while(&chars, &mut pos, is_name_char);
                if value.is_empty() {
                    return Err(format!("missing value for variant '{}'", key));
                }
                clauses.variants.push(VariantSetting::choice(key, value));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(clauses)
}

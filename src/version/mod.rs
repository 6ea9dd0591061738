// src/version/mod.rs

//! Version handling and constraint satisfaction for recipe versions
//!
//! Versions are upstream release tokens such as `323`, `0.14.2` or `2020.3`.
//! Constraints follow the range syntax used in recipe dependency specs:
//! `323:323`, `7.1:`, `:2.0`, `=9.7.0`, or a comma-separated union.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// One segment of a version token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Number(u64),
    Text(String),
}

impl Segment {
    fn compare(&self, other: &Segment) -> Ordering {
        match (self, other) {
            (Segment::Number(a), Segment::Number(b)) => a.cmp(b),
            (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
            // Pre-release style text sorts below any numeric segment
            (Segment::Text(_), Segment::Number(_)) => Ordering::Less,
            (Segment::Number(_), Segment::Text(_)) => Ordering::Greater,
        }
    }
}

/// A parsed, comparable version token
///
/// The original token is kept for display; comparison works on segments, so
/// `1.10` sorts above `1.9` and `0.14` below `0.14.2`.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    segments: Vec<Segment>,
}

impl Version {
    /// Parse a version token
    pub fn parse(s: &str) -> Result<Self> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(Error::ParseError("empty version".to_string()));
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut current_is_digit = false;

        for c in raw.chars() {
            if matches!(c, '.' | '-' | '_') {
                if current.is_empty() {
                    return Err(Error::ParseError(format!(
                        "empty segment in version '{}'",
                        raw
                    )));
                }
                segments.push(Self::segment(&current)?);
                current.clear();
                continue;
            }

            if !c.is_ascii_alphanumeric() {
                return Err(Error::ParseError(format!(
                    "invalid character '{}' in version '{}'",
                    c, raw
                )));
            }

            // Split at digit/letter boundaries: "1rc2" -> 1, rc, 2
            if !current.is_empty() && c.is_ascii_digit() != current_is_digit {
                segments.push(Self::segment(&current)?);
                current.clear();
            }
            current_is_digit = c.is_ascii_digit();
            current.push(c);
        }

        if current.is_empty() {
            return Err(Error::ParseError(format!(
                "version '{}' ends with a separator",
                raw
            )));
        }
        segments.push(Self::segment(&current)?);

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    fn segment(text: &str) -> Result<Segment> {
        if text.chars().all(|c| c.is_ascii_digit()) {
            text.parse::<u64>()
                .map(Segment::Number)
                .map_err(|e| Error::ParseError(format!("version segment '{}': {}", text, e)))
        } else {
            Ok(Segment::Text(text.to_string()))
        }
    }

    /// The version as written in the recipe
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True if every segment of `self` is a leading segment of `other`
    ///
    /// `7.1` is a prefix of `7.1` and `7.1.3`, but not of `7.10`.
    pub fn is_prefix_of(&self, other: &Version) -> bool {
        self.segments.len() <= other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a == b)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.segments.iter().zip(&other.segments) {
            match a.compare(b) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        self.segments.len().cmp(&other.segments.len())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        // Bare integers are accepted (`version = 323`); dotted versions must be
        // quoted since a TOML float would lose trailing zeros.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Integer(u64),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Integer(n) => n.to_string(),
        };
        Version::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Version constraint as written after `@` in a spec
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionConstraint {
    /// Any version is acceptable
    #[default]
    Any,
    /// Exactly this version (`=X`)
    Exact(Version),
    /// Inclusive range; an upper bound also admits versions it prefixes
    Range {
        low: Option<Version>,
        high: Option<Version>,
    },
    /// Any of the listed constraints (`A:B,C`)
    Union(Vec<VersionConstraint>),
}

impl VersionConstraint {
    /// Parse a version constraint
    ///
    /// Examples:
    /// - `""` or `"*"` or `":"` → Any
    /// - `"=9.7.0"` → Exact(9.7.0)
    /// - `"323:323"` → Range(323..=323)
    /// - `"2020.3:"` → Range(2020.3..)
    /// - `"7.1"` → Range(7.1..=7.1), which also admits 7.1.x
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "*" || s == ":" {
            return Ok(VersionConstraint::Any);
        }

        if s.contains(',') {
            let parts = s
                .split(',')
                .map(Self::parse)
                .collect::<Result<Vec<_>>>()?;
            return Ok(VersionConstraint::Union(parts));
        }

        if let Some(rest) = s.strip_prefix('=') {
            return Ok(VersionConstraint::Exact(Version::parse(rest)?));
        }

        if let Some((low, high)) = s.split_once(':') {
            let parse_bound = |bound: &str| -> Result<Option<Version>> {
                let bound = bound.trim();
                if bound.is_empty() {
                    Ok(None)
                } else {
                    Version::parse(bound).map(Some)
                }
            };
            let low = parse_bound(low)?;
            let high = parse_bound(high)?;
            if let (Some(l), Some(h)) = (&low, &high)
                && l > h
                && !h.is_prefix_of(l)
            {
                return Err(Error::ParseError(format!(
                    "version range '{}' has its lower bound above its upper bound",
                    s
                )));
            }
            return Ok(VersionConstraint::Range { low, high });
        }

        let version = Version::parse(s)?;
        Ok(VersionConstraint::Range {
            low: Some(version.clone()),
            high: Some(version),
        })
    }

    /// Check if a version satisfies this constraint
    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            VersionConstraint::Any => true,
            VersionConstraint::Exact(v) => version == v,
            VersionConstraint::Range { low, high } => {
                let above = low.as_ref().is_none_or(|l| version >= l);
                let below = high
                    .as_ref()
                    .is_none_or(|h| version <= h || h.is_prefix_of(version));
                above && below
            }
            VersionConstraint::Union(parts) => parts.iter().any(|c| c.satisfies(version)),
        }
    }

    /// The pinned version, if this constraint names exactly one
    pub fn pinned(&self) -> Option<&Version> {
        match self {
            VersionConstraint::Exact(v) => Some(v),
            _ => None,
        }
    }

    /// True for the unconstrained case
    pub fn is_any(&self) -> bool {
        matches!(self, VersionConstraint::Any)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => write!(f, ":"),
            VersionConstraint::Exact(v) => write!(f, "={}", v),
            VersionConstraint::Range { low, high } => match (low, high) {
                (Some(l), Some(h)) if l == h => write!(f, "{}", l),
                (Some(l), Some(h)) => write!(f, "{}:{}", l, h),
                (Some(l), None) => write!(f, "{}:", l),
                (None, Some(h)) => write!(f, ":{}", h),
                (None, None) => write!(f, ":"),
            },
            VersionConstraint::Union(parts) => {
                let rendered: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", rendered.join(","))
            }
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        VersionConstraint::parse(s)
    }
}

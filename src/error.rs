// src/error.rs

//! Error types for pantry
//!
//! Resolution errors (`MalformedSpec` through `Conflict`) abort a run and are
//! never accompanied by partial results. `BuildFailure` is produced per node
//! by the build runner.

use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading recipes, resolving, planning and building
#[derive(Error, Debug)]
pub enum Error {
    /// A package request could not be parsed or names an undeclared variant
    #[error("malformed spec '{spec}': {reason}")]
    MalformedSpec { spec: String, reason: String },

    /// No recipe is registered under this name
    #[error("unknown package '{name}'{}", required_by_suffix(.required_by))]
    UnknownPackage {
        name: String,
        required_by: Option<String>,
    },

    /// Two declarations of one version disagree on the checksum
    #[error("duplicate version {version} of {package}: checksum {first} conflicts with {second}")]
    DuplicateVersion {
        package: String,
        version: String,
        first: String,
        second: String,
    },

    /// The dependency graph reachable from the request contains a cycle
    #[error("cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// No declared version satisfies the requested constraint
    #[error("no version of {package} satisfies '{constraint}' (required by {required_by})")]
    NoSatisfyingVersion {
        package: String,
        constraint: String,
        required_by: String,
    },

    /// A package was requested twice with different outcomes
    #[error(
        "conflicting requests for {package}: {first_requester} resolved {first}, \
         but {second_requester} requires {second}"
    )]
    Conflict {
        package: String,
        first_requester: String,
        first: String,
        second_requester: String,
        second: String,
    },

    /// The composer hit an inconsistent resolution
    #[error("cannot compose build plan for {package}: {reason}")]
    PlanComposition { package: String, reason: String },

    /// A package failed to build
    #[error("build of {package} failed: {reason}")]
    BuildFailure { package: String, reason: String },

    /// Recipe failed validation
    #[error("invalid recipe {recipe}: {reason}")]
    InvalidRecipe { recipe: String, reason: String },

    /// Parse failure for recipe or configuration text
    #[error("parse error: {0}")]
    ParseError(String),

    /// Downloaded or cached source does not match its declared checksum
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Source download failed
    #[error("download error: {0}")]
    DownloadError(String),

    /// Executor infrastructure failure (missing tool, stage setup, ...)
    #[error("executor error: {0}")]
    Executor(String),

    /// Configuration problem
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn required_by_suffix(required_by: &Option<String>) -> String {
    match required_by {
        Some(requester) => format!(" (required by {})", requester),
        None => String::new(),
    }
}

impl Error {
    /// Build a `MalformedSpec` error
    pub fn malformed(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSpec {
            spec: spec.into(),
            reason: reason.into(),
        }
    }

    /// Build an `InvalidRecipe` error
    pub fn invalid_recipe(recipe: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRecipe {
            recipe: recipe.into(),
            reason: reason.into(),
        }
    }

    /// True for the errors that abort resolution
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedSpec { .. }
                | Error::UnknownPackage { .. }
                | Error::DuplicateVersion { .. }
                | Error::CyclicDependency { .. }
                | Error::NoSatisfyingVersion { .. }
                | Error::Conflict { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_package_message() {
        let err = Error::UnknownPackage {
            name: "tbb".to_string(),
            required_by: Some("seidr".to_string()),
        };
        assert_eq!(err.to_string(), "unknown package 'tbb' (required by seidr)");

        let err = Error::UnknownPackage {
            name: "tbb".to_string(),
            required_by: None,
        };
        assert_eq!(err.to_string(), "unknown package 'tbb'");
    }

    #[test]
    fn test_cycle_message() {
        let err = Error::CyclicDependency {
            cycle: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
        assert!(err.is_resolution_error());
    }

    #[test]
    fn test_build_failure_is_not_resolution_error() {
        let err = Error::BuildFailure {
            package: "libsvm".to_string(),
            reason: "make exited with 2".to_string(),
        };
        assert!(!err.is_resolution_error());
    }
}

// src/resolver/mod.rs

//! Dependency resolution and conflict detection
//!
//! Turns user requests into a [`Resolution`]: every reachable package with
//! one version and one variant assignment, and the typed edges between them.
//! Resolution is all-or-nothing; the first unknown package, cycle, missing
//! version or conflicting request aborts it.

mod engine;
mod graph;

pub use engine::{Resolver, USER_REQUEST};
pub use graph::{DependencyInput, Resolution, ResolvedEdge, ResolvedNode};

// src/resolver/graph.rs

//! Resolved dependency graph
//!
//! The resolver's output: one node per package, each with a fixed version
//! and variant assignment, plus the typed edges between them.

use crate::error::{Error, Result};
use crate::recipe::DependencyType;
use crate::variant::VariantAssignment;
use crate::version::Version;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Direct dependency of a resolved node, with the edge types that apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyInput {
    pub name: String,
    pub types: Vec<DependencyType>,
}

impl DependencyInput {
    /// True if the package is needed at build time (tools on PATH)
    pub fn is_build(&self) -> bool {
        self.types.contains(&DependencyType::Build)
    }

    /// True if the package contributes headers or libraries
    pub fn is_link(&self) -> bool {
        self.types.contains(&DependencyType::Link)
    }
}

/// A package with its version and variants fixed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedNode {
    pub name: String,
    pub version: Version,
    /// Source checksum of the selected version
    pub checksum: Option<String>,
    pub variants: VariantAssignment,
    /// Direct dependencies in declaration order
    pub inputs: Vec<DependencyInput>,
    /// Whoever first requested this package (a package name, or the user)
    pub requested_by: String,
    /// Provided by the host rather than built
    pub external: bool,
}

impl ResolvedNode {
    /// `name@version+variants`, as shown in conflicts and plans
    pub fn describe(&self) -> String {
        format!("{}@{}{}", self.name, self.version, self.variants)
    }
}

/// Typed edge `from` depends on `to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEdge {
    pub from: String,
    pub to: String,
    pub types: Vec<DependencyType>,
}

/// Result of resolving one or more root requests
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    /// Requested root packages
    pub roots: Vec<String>,
    /// Nodes in discovery order (the first root comes first)
    pub nodes: Vec<ResolvedNode>,
    pub edges: Vec<ResolvedEdge>,
}

impl Resolution {
    /// Find a node by package name
    pub fn node(&self, name: &str) -> Option<&ResolvedNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Outgoing edges of a package
    pub fn dependencies_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ResolvedEdge> {
        self.edges.iter().filter(move |e| e.from == name)
    }

    /// Incoming edges of a package
    pub fn dependents_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ResolvedEdge> {
        self.edges.iter().filter(move |e| e.to == name)
    }

    /// Kahn's algorithm over the node indices, dependencies first
    ///
    /// Among nodes that are ready at the same time, the one with the smallest
    /// `rank` goes first; equal ranks fall back to discovery order.
    pub fn topological_order(&self, rank: impl Fn(&str) -> usize) -> Result<Vec<usize>> {
        let position: HashMap<&str, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.as_str(), i))
            .collect();

        let mut in_degree = vec![0usize; self.nodes.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for edge in &self.edges {
            let (Some(&from), Some(&to)) = (position.get(edge.from.as_str()), position.get(edge.to.as_str()))
            else {
                return Err(Error::PlanComposition {
                    package: edge.from.clone(),
                    reason: format!("edge to {} which is not a resolved node", edge.to),
                });
            };
            in_degree[from] += 1;
            dependents[to].push(from);
        }

        // Queue of nodes with no remaining dependencies
        let mut ready: BTreeSet<(usize, usize)> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, deg)| *deg == 0)
            .map(|(i, _)| (rank(&self.nodes[i].name), i))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some((_, node)) = ready.pop_first() {
            order.push(node);
            for &dependent in &dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert((rank(&self.nodes[dependent].name), dependent));
                }
            }
        }

        if order.len() != self.nodes.len() {
            let remaining: Vec<&str> = (0..self.nodes.len())
                .filter(|i| !order.contains(i))
                .map(|i| self.nodes[i].name.as_str())
                .collect();
            return Err(Error::PlanComposition {
                package: remaining.first().map(|s| s.to_string()).unwrap_or_default(),
                reason: format!("dependency cycle among {}", remaining.join(", ")),
            });
        }

        Ok(order)
    }
}

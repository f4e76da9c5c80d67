//! Ownership Graph
//!
//! Directed graph over schemas built from main relations, using petgraph.
//! An edge `owner -> target` means documents of `owner` embed (and own) a
//! document of `target`, so deleting a `target` document cascades to `owner`.
//!
//! Owner *order* for cascading is resolved from the registry itself (see
//! `relations`); this graph answers structural questions: cycles, reach, export.

pub mod analysis;

pub use analysis::{find_ownership_cycles, OwnershipCycle};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::schema::Schema;

/// Edge weight: the main-relation field on the owner
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnershipEdge {
    pub field: String,
}

/// A collection reachable by a cascade, with its distance from the start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachNode {
    pub schema: String,
    pub depth: usize,
}

/// The main-relation ownership graph
#[derive(Debug, Clone, Default)]
pub struct OwnershipGraph {
    pub(crate) graph: DiGraph<String, OwnershipEdge>,
    pub(crate) node_indices: HashMap<String, NodeIndex>,
}

impl OwnershipGraph {
    /// Build the graph from schemas. Relation targets missing from `schemas`
    /// still get a node so that the graph is total.
    pub fn from_schemas<'a>(schemas: impl IntoIterator<Item = &'a Schema>) -> Self {
        let mut graph = Self::default();
        let schemas: Vec<&Schema> = schemas.into_iter().collect();

        for schema in &schemas {
            graph.node(&schema.name);
        }
        for schema in &schemas {
            let from = graph.node(&schema.name);
            for (field, relation) in &schema.main_relations {
                let to = graph.node(&relation.schema_name);
                graph.graph.add_edge(from, to, OwnershipEdge { field: field.clone() });
            }
        }
        graph
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.node_indices.insert(name.to_string(), idx);
        idx
    }

    pub fn schema_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Schemas owning `target` directly, with the owning field
    pub fn owners(&self, target: &str) -> Vec<(&str, &str)> {
        let Some(&idx) = self.node_indices.get(target) else {
            return Vec::new();
        };
        let mut owners: Vec<(&str, &str)> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter_map(|e| {
                self.graph
                    .node_weight(e.source())
                    .map(|s| (s.as_str(), e.weight().field.as_str()))
            })
            .collect();
        owners.sort();
        owners
    }

    /// Schemas `owner` embeds through main relations
    pub fn owned(&self, owner: &str) -> Vec<&str> {
        let Some(&idx) = self.node_indices.get(owner) else {
            return Vec::new();
        };
        let mut owned: Vec<&str> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter_map(|e| self.graph.node_weight(e.target()).map(|s| s.as_str()))
            .collect();
        owned.sort();
        owned.dedup();
        owned
    }

    /// Every collection a delete in `target` can cascade into, nearest first
    pub fn cascade_reach(&self, target: &str, max_depth: Option<usize>) -> Vec<ReachNode> {
        let Some(&start) = self.node_indices.get(target) else {
            return Vec::new();
        };

        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([(start, 0usize)]);
        visited.insert(start);

        // breadth first, so each collection is reported at its shortest distance
        while let Some((idx, depth)) = queue.pop_front() {
            if idx != start {
                if let Some(name) = self.graph.node_weight(idx) {
                    result.push(ReachNode {
                        schema: name.clone(),
                        depth,
                    });
                }
            }
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            for edge in self.graph.edges_directed(idx, Direction::Incoming) {
                if visited.insert(edge.source()) {
                    queue.push_back((edge.source(), depth + 1));
                }
            }
        }

        result.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.schema.cmp(&b.schema)));
        result
    }

    /// Export to GraphViz DOT format
    pub fn to_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph Ownership {\n");
        output.push_str("  rankdir=LR;\n");
        output.push_str("  node [shape=box, style=\"rounded\", fontname=\"Helvetica\", fontsize=10];\n");
        output.push_str("  edge [fontname=\"Helvetica\", fontsize=8];\n\n");

        let mut names: Vec<&String> = self.node_indices.keys().collect();
        names.sort();
        for name in names {
            output.push_str(&format!("  \"{}\";\n", name));
        }
        output.push('\n');

        for edge in self.graph.edge_references() {
            if let (Some(owner), Some(target)) = (
                self.graph.node_weight(edge.source()),
                self.graph.node_weight(edge.target()),
            ) {
                output.push_str(&format!(
                    "  \"{}\" -> \"{}\" [label=\"{}\"];\n",
                    owner,
                    target,
                    edge.weight().field
                ));
            }
        }

        output.push_str("}\n");
        output
    }
}

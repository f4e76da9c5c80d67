//! Ownership Graph Analysis
//!
//! Cascading deletes walk main relations from target to owner. A cycle in
//! that graph would make a cascade revisit collections without end, so cycles
//! are found here (strongly connected components plus self-loops) and
//! rejected when a registry is built.

use petgraph::algo::kosaraju_scc;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use super::OwnershipGraph;

/// One group of schemas that own each other, directly or transitively
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipCycle {
    /// Members, sorted by name
    pub members: Vec<String>,
    /// A single schema owning its own collection
    pub is_self_referential: bool,
}

impl OwnershipCycle {
    /// Members as a closed path for messages, e.g. `a -> b -> a`
    pub fn path(&self) -> Vec<String> {
        let mut path = self.members.clone();
        if let Some(first) = self.members.first() {
            path.push(first.clone());
        }
        path
    }
}

/// Find every ownership cycle, ordered by first member name
pub fn find_ownership_cycles(graph: &OwnershipGraph) -> Vec<OwnershipCycle> {
    let mut cycles = Vec::new();

    for scc in kosaraju_scc(&graph.graph) {
        if scc.len() == 1 {
            let idx = scc[0];
            let has_self_ref = graph
                .graph
                .edges_directed(idx, Direction::Outgoing)
                .any(|e| e.target() == idx);

            if has_self_ref {
                if let Some(name) = graph.graph.node_weight(idx) {
                    cycles.push(OwnershipCycle {
                        members: vec![name.clone()],
                        is_self_referential: true,
                    });
                }
            }
        } else {
            let mut members: Vec<String> = scc
                .iter()
                .filter_map(|idx| graph.graph.node_weight(*idx).cloned())
                .collect();
            members.sort();
            cycles.push(OwnershipCycle {
                members,
                is_self_referential: false,
            });
        }
    }

    cycles.sort_by(|a, b| a.members.cmp(&b.members));
    cycles
}

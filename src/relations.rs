//! Owner resolution
//!
//! Answers "who owns documents of this collection": every main-relation field,
//! across all schemas, whose target is the collection.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::registry::SchemaRegistry;

/// A main-relation field that points at a target collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerReference {
    /// Schema (collection) holding the embedded copy
    pub owner_schema: String,
    /// Main-relation field on the owner
    pub field: String,
    /// Schema being embedded
    pub target_schema: String,
}

impl OwnerReference {
    /// Dotted path of the embedded identifier, e.g. `author._id`
    pub fn embedded_id_path(&self) -> String {
        format!("{}._id", self.field)
    }
}

impl fmt::Display for OwnerReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} -> {}", self.owner_schema, self.field, self.target_schema)
    }
}

/// Every owner reference targeting `target_collection`.
///
/// Order is registry order, then main-relation declaration order within a
/// schema.
pub fn find_owners(registry: &SchemaRegistry, target_collection: &str) -> Vec<OwnerReference> {
    registry
        .schemas()
        .flat_map(|schema| {
            schema
                .main_relations
                .iter()
                .filter(|(_, relation)| relation.schema_name == target_collection)
                .map(|(field, _)| OwnerReference {
                    owner_schema: schema.name.clone(),
                    field: field.clone(),
                    target_schema: target_collection.to_string(),
                })
        })
        .collect()
}

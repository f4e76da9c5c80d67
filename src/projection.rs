//! Depth-bounded projections
//!
//! Builds a nested projection spec for a schema: every pure field becomes an
//! optional `0 | 1` flag and in/out relation fields expand into the related
//! schema's own spec, as far as a depth budget allows.
//!
//! The budget is either uniform (`DepthSpec::Leaf`, shared by every relation
//! branch at a level) or per field (`DepthSpec::Branch`). In the per-field
//! form only the top level of the map is decremented on each call; nested
//! maps are decremented when their own level is processed, and a map-valued
//! entry always expands.
//!
//! Descriptive relations may loop back to their own schema, so the number of
//! nested levels is capped independently of the budget.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::ProjectionConfig;
use crate::error::{OdmError, Result};
use crate::registry::SchemaRegistry;

// =============================================================================
// Depth budget
// =============================================================================

/// Remaining expansion budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DepthSpec {
    /// Uniform remaining depth
    Leaf(i64),
    /// Per relation field budget
    Branch(IndexMap<String, DepthSpec>),
}

impl Default for DepthSpec {
    fn default() -> Self {
        DepthSpec::Leaf(2)
    }
}

impl From<i64> for DepthSpec {
    fn from(depth: i64) -> Self {
        DepthSpec::Leaf(depth)
    }
}

impl<K: Into<String>> FromIterator<(K, DepthSpec)> for DepthSpec {
    fn from_iter<I: IntoIterator<Item = (K, DepthSpec)>>(iter: I) -> Self {
        DepthSpec::Branch(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl DepthSpec {
    /// Decrement a leaf, or every leaf entry at the top level of a branch.
    /// Nested branches are left as they are.
    pub fn decrement_first_level(&self) -> DepthSpec {
        match self {
            DepthSpec::Leaf(n) => DepthSpec::Leaf(n.saturating_sub(1)),
            DepthSpec::Branch(map) => DepthSpec::Branch(
                map.iter()
                    .map(|(field, entry)| {
                        let entry = match entry {
                            DepthSpec::Leaf(n) => DepthSpec::Leaf(n.saturating_sub(1)),
                            branch => branch.clone(),
                        };
                        (field.clone(), entry)
                    })
                    .collect(),
            ),
        }
    }

    /// Whether an entry (already decremented) lets its field expand
    pub fn allows_expansion(&self) -> bool {
        match self {
            DepthSpec::Leaf(n) => *n > -1,
            DepthSpec::Branch(_) => true,
        }
    }

    /// Entry for a relation field, in branch form
    pub fn entry(&self, field: &str) -> Option<&DepthSpec> {
        match self {
            DepthSpec::Branch(map) => map.get(field),
            DepthSpec::Leaf(_) => None,
        }
    }
}

// =============================================================================
// Projection spec
// =============================================================================

/// One field of a projection spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionField {
    /// Optional include/exclude flag, `0` or `1`
    Flag,
    /// Optional nested spec for a related schema
    Nested(ProjectionSpec),
}

/// Nested optional-object spec for one schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSpec {
    pub schema: String,
    pub fields: IndexMap<String, ProjectionField>,
}

/// A projection request that does not fit its spec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid projection at '{path}': {reason}")]
pub struct ProjectionViolation {
    pub path: String,
    pub reason: String,
}

impl ProjectionSpec {
    pub fn get(&self, field: &str) -> Option<&ProjectionField> {
        self.fields.get(field)
    }

    /// Nested spec of an expanded relation field
    pub fn nested(&self, field: &str) -> Option<&ProjectionSpec> {
        match self.fields.get(field) {
            Some(ProjectionField::Nested(spec)) => Some(spec),
            _ => None,
        }
    }

    pub fn flag_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, f)| matches!(f, ProjectionField::Flag))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn relation_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, f)| matches!(f, ProjectionField::Nested(_)))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Levels of nesting below this spec (0 when nothing expanded)
    pub fn max_depth(&self) -> usize {
        self.fields
            .values()
            .filter_map(|f| match f {
                ProjectionField::Nested(spec) => Some(1 + spec.max_depth()),
                ProjectionField::Flag => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Projection document including everything the spec allows
    pub fn to_document(&self) -> Value {
        let map = self
            .fields
            .iter()
            .map(|(name, field)| {
                let value = match field {
                    ProjectionField::Flag => Value::from(1),
                    ProjectionField::Nested(spec) => spec.to_document(),
                };
                (name.clone(), value)
            })
            .collect();
        Value::Object(map)
    }

    /// Check a client projection request against this spec.
    ///
    /// The whole spec is optional, so `null` passes; flags take `0` or `1`;
    /// nested relations take `null` or an object; unknown keys are rejected.
    pub fn validate(&self, request: &Value) -> std::result::Result<(), ProjectionViolation> {
        self.validate_at(request, "")
    }

    fn validate_at(&self, request: &Value, path: &str) -> std::result::Result<(), ProjectionViolation> {
        let object = match request {
            Value::Null => return Ok(()),
            Value::Object(object) => object,
            other => {
                return Err(violation(
                    path,
                    format!("expected an object for '{}', got {}", self.schema, json_kind(other)),
                ))
            }
        };

        for (key, value) in object {
            let child = if path.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", path, key)
            };

            match self.fields.get(key) {
                None => return Err(violation(&child, format!("unknown field on '{}'", self.schema))),
                Some(ProjectionField::Flag) => {
                    let ok = matches!(value.as_i64(), Some(0) | Some(1)) || value.is_null();
                    if !ok {
                        return Err(violation(&child, format!("expected 0 or 1, got {}", value)));
                    }
                }
                Some(ProjectionField::Nested(spec)) => spec.validate_at(value, &child)?,
            }
        }
        Ok(())
    }
}

fn violation(path: &str, reason: String) -> ProjectionViolation {
    ProjectionViolation {
        path: if path.is_empty() { "<root>".to_string() } else { path.to_string() },
        reason,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Default bound on nested relation levels in one projection
pub const DEFAULT_MAX_NESTING: usize = 32;

/// Build the projection spec of `schema` under a depth budget, nesting at
/// most [`DEFAULT_MAX_NESTING`] levels
pub fn select_struct(registry: &SchemaRegistry, schema: &str, depth: &DepthSpec) -> Result<ProjectionSpec> {
    select_struct_bounded(registry, schema, depth, DEFAULT_MAX_NESTING)
}

/// [`select_struct`] with an explicit nesting bound. A budget that would
/// expand past `max_nesting` levels fails with `ProjectionDepthExceeded`.
pub fn select_struct_bounded(
    registry: &SchemaRegistry,
    schema: &str,
    depth: &DepthSpec,
    max_nesting: usize,
) -> Result<ProjectionSpec> {
    build(registry, schema, depth, 0, max_nesting)
}

fn build(
    registry: &SchemaRegistry,
    schema: &str,
    depth: &DepthSpec,
    level: usize,
    max_nesting: usize,
) -> Result<ProjectionSpec> {
    let definition = registry.get_schema(schema)?;

    let mut fields: IndexMap<String, ProjectionField> = definition
        .pure_fields
        .keys()
        .map(|name| (name.clone(), ProjectionField::Flag))
        .collect();

    // (field, target, budget for the target) in in-then-out order
    let mut expansions: Vec<(&String, &str, DepthSpec)> = Vec::new();
    match depth {
        DepthSpec::Leaf(n) => {
            let remaining = n.saturating_sub(1);
            if remaining > -1 {
                for (field, relation) in definition.descriptive_relations() {
                    expansions.push((field, relation.schema_name.as_str(), DepthSpec::Leaf(remaining)));
                }
            }
        }
        DepthSpec::Branch(_) => {
            let decremented = depth.decrement_first_level();
            for (field, relation) in definition.descriptive_relations() {
                let Some(entry) = decremented.entry(field) else {
                    continue;
                };
                if entry.allows_expansion() {
                    expansions.push((field, relation.schema_name.as_str(), entry.clone()));
                }
            }
        }
    }

    if !expansions.is_empty() && level >= max_nesting {
        return Err(OdmError::ProjectionDepthExceeded {
            schema: definition.name.clone(),
            limit: max_nesting,
        });
    }

    for (field, target, budget) in expansions {
        let nested = build(registry, target, &budget, level + 1, max_nesting)?;
        fields.insert(field.clone(), ProjectionField::Nested(nested));
    }

    Ok(ProjectionSpec {
        schema: definition.name.clone(),
        fields,
    })
}

/// [`select_struct`] bound to a registry, a default depth and a nesting limit
#[derive(Debug, Clone, Copy)]
pub struct ProjectionBuilder<'a> {
    registry: &'a SchemaRegistry,
    default_depth: i64,
    max_nesting: usize,
}

impl<'a> ProjectionBuilder<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            default_depth: 2,
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }

    /// Apply `[projection]` settings
    pub fn with_config(mut self, config: &ProjectionConfig) -> Self {
        self.default_depth = config.default_depth;
        self.max_nesting = config.max_depth;
        self
    }

    pub fn with_default_depth(mut self, depth: i64) -> Self {
        self.default_depth = depth;
        self
    }

    pub fn with_max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting;
        self
    }

    pub fn select(&self, schema: &str, depth: &DepthSpec) -> Result<ProjectionSpec> {
        select_struct_bounded(self.registry, schema, depth, self.max_nesting)
    }

    pub fn select_default(&self, schema: &str) -> Result<ProjectionSpec> {
        self.select(schema, &DepthSpec::Leaf(self.default_depth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_depth_spec_parses_both_forms() {
        assert_eq!(serde_json::from_value::<DepthSpec>(json!(3)).unwrap(), DepthSpec::Leaf(3));
        let spec: DepthSpec = serde_json::from_value(json!({ "author": 1, "comments": { "user": 0 } })).unwrap();
        let expected: DepthSpec = [
            ("author", DepthSpec::Leaf(1)),
            ("comments", [("user", DepthSpec::Leaf(0))].into_iter().collect()),
        ]
        .into_iter()
        .collect();
        assert_eq!(spec, expected);
    }

    #[test]
    fn test_decrement_first_level_only() {
        let spec: DepthSpec = serde_json::from_value(json!({ "a": 1, "b": { "x": 3 }, "c": 0 })).unwrap();
        let decremented = spec.decrement_first_level();
        assert_eq!(decremented.entry("a"), Some(&DepthSpec::Leaf(0)));
        assert_eq!(decremented.entry("c"), Some(&DepthSpec::Leaf(-1)));
        assert_eq!(decremented.entry("b"), spec.entry("b"));
        assert_eq!(DepthSpec::Leaf(2).decrement_first_level(), DepthSpec::Leaf(1));
        // original untouched
        assert_eq!(spec.entry("a"), Some(&DepthSpec::Leaf(1)));
    }

    #[test]
    fn test_allows_expansion() {
        assert!(DepthSpec::Leaf(0).allows_expansion());
        assert!(!DepthSpec::Leaf(-1).allows_expansion());
        assert!(DepthSpec::Branch(IndexMap::new()).allows_expansion());
        assert_eq!(DepthSpec::Leaf(i64::MIN).decrement_first_level(), DepthSpec::Leaf(i64::MIN));
    }

    fn linked_list() -> SchemaRegistry {
        use crate::schema::{FieldKind, RelationDef, Schema};
        SchemaRegistry::from_schemas(vec![Schema::new("node")
            .with_pure("value", FieldKind::Number)
            .with_out_relation("next", RelationDef::single("node"))])
        .unwrap()
    }

    #[test]
    fn test_self_loop_is_capped() {
        let registry = linked_list();

        match select_struct(&registry, "node", &DepthSpec::Leaf(5_000)) {
            Err(OdmError::ProjectionDepthExceeded { schema, limit }) => {
                assert_eq!(schema, "node");
                assert_eq!(limit, DEFAULT_MAX_NESTING);
            }
            other => panic!("Expected ProjectionDepthExceeded, got {:?}", other),
        }

        let deepest = select_struct(&registry, "node", &DepthSpec::Leaf(DEFAULT_MAX_NESTING as i64)).unwrap();
        assert_eq!(deepest.max_depth(), DEFAULT_MAX_NESTING);
    }

    #[test]
    fn test_builder_nesting_limit() {
        let registry = linked_list();
        let builder = ProjectionBuilder::new(&registry).with_max_nesting(3);
        assert_eq!(builder.select("node", &DepthSpec::Leaf(3)).unwrap().max_depth(), 3);
        assert!(matches!(
            builder.select("node", &DepthSpec::Leaf(4)),
            Err(OdmError::ProjectionDepthExceeded { limit: 3, .. })
        ));

        // a nested map counts toward the same limit
        let nested: DepthSpec = serde_json::from_value(json!({ "next": { "next": { "next": { "next": { "next": 0 } } } } })).unwrap();
        assert!(builder.select("node", &nested).is_err());

        let config = crate::config::ProjectionConfig {
            default_depth: 1,
            max_depth: 0,
        };
        let builder = ProjectionBuilder::new(&registry).with_config(&config);
        assert!(builder.select_default("node").is_err());
        assert!(builder.select("node", &DepthSpec::Leaf(0)).is_ok());
    }
}

//! Schema Registry
//!
//! Immutable, validated set of schemas. A registry is built once, checked for
//! dangling relation targets and ownership cycles, and then passed by
//! reference into every resolver, cascade and projection call.

use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::debug;

use crate::checksum::Checksum;
use crate::error::{OdmError, Result};
use crate::graph::{find_ownership_cycles, OwnershipGraph};
use crate::schema::{FieldDescriptor, Relations, Schema};

/// The schema registry
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    /// Schemas by name, in declaration order
    schemas: IndexMap<String, Schema>,
    /// Main-relation graph, built once
    ownership: OwnershipGraph,
    /// Fingerprint of the definitions
    fingerprint: Checksum,
}

impl SchemaRegistry {
    /// Start building a registry
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Build and validate a registry from schemas, keeping their order
    pub fn from_schemas(schemas: impl IntoIterator<Item = Schema>) -> Result<Self> {
        schemas
            .into_iter()
            .fold(Self::builder(), |builder, schema| builder.schema(schema))
            .build()
    }

    /// Get a schema by name
    pub fn get_schema(&self, name: &str) -> Result<&Schema> {
        self.schemas.get(name).ok_or_else(|| OdmError::UnknownSchema {
            name: name.to_string(),
            suggestion: self.suggest(name),
        })
    }

    /// Pure (non-relational) fields of a schema
    pub fn get_pure_fields(&self, name: &str) -> Result<&IndexMap<String, FieldDescriptor>> {
        Ok(&self.get_schema(name)?.pure_fields)
    }

    /// The in-, out- and main-relation maps of a schema
    pub fn get_relations(&self, name: &str) -> Result<Relations<'_>> {
        Ok(self.get_schema(name)?.relations())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// All schemas, in declaration order
    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }

    pub fn schema_names(&self) -> impl Iterator<Item = &String> {
        self.schemas.keys()
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    /// Total relation fields across all schemas
    pub fn relation_count(&self) -> usize {
        self.schemas.values().map(|s| s.relations().len()).sum()
    }

    pub fn ownership_graph(&self) -> &OwnershipGraph {
        &self.ownership
    }

    pub fn fingerprint(&self) -> &Checksum {
        &self.fingerprint
    }

    /// Closest schema name to a misspelled query
    pub fn suggest(&self, query: &str) -> Option<String> {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        let matcher = SkimMatcherV2::default();
        let query_lower = query.to_lowercase();

        self.schemas
            .keys()
            .filter_map(|name| {
                let forward = matcher.fuzzy_match(&name.to_lowercase(), &query_lower);
                let backward = matcher.fuzzy_match(&query_lower, &name.to_lowercase());
                forward.max(backward).map(|score| (score, name))
            })
            .max_by_key(|(score, _)| *score)
            .map(|(_, name)| name.clone())
    }
}

/// Collects schemas and validates them into a [`SchemaRegistry`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    schemas: Vec<Schema>,
    fingerprint: Option<Checksum>,
}

impl RegistryBuilder {
    /// Add a schema; order of calls is the registry order
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Use a precomputed fingerprint (e.g. over the source files)
    pub fn fingerprint(mut self, fingerprint: Checksum) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    /// Validate and freeze the registry
    pub fn build(self) -> Result<SchemaRegistry> {
        let mut schemas: IndexMap<String, Schema> = IndexMap::with_capacity(self.schemas.len());
        for schema in self.schemas {
            if schemas.contains_key(&schema.name) {
                return Err(OdmError::DuplicateSchema(schema.name));
            }
            schemas.insert(schema.name.clone(), schema);
        }

        for schema in schemas.values() {
            check_field_names(schema)?;

            let relations = schema.relations();
            for (field, relation) in relations
                .in_relations
                .iter()
                .chain(relations.out_relations)
                .chain(relations.main_relations)
            {
                if !schemas.contains_key(&relation.schema_name) {
                    return Err(OdmError::UnknownRelationTarget {
                        schema: schema.name.clone(),
                        field: field.clone(),
                        target: relation.schema_name.clone(),
                    });
                }
            }
        }

        let ownership = OwnershipGraph::from_schemas(schemas.values());
        if let Some(cycle) = find_ownership_cycles(&ownership).into_iter().next() {
            return Err(OdmError::OwnershipCycle { cycle: cycle.path() });
        }

        let fingerprint = self
            .fingerprint
            .unwrap_or_else(|| Checksum::from_schemas(schemas.values()));

        debug!(
            schemas = schemas.len(),
            ownership_edges = ownership.edge_count(),
            fingerprint = fingerprint.short(),
            "schema registry built"
        );

        Ok(SchemaRegistry {
            schemas,
            ownership,
            fingerprint,
        })
    }
}

/// A field name may live in only one of the four field maps
fn check_field_names(schema: &Schema) -> Result<()> {
    let mut seen = HashSet::new();
    for name in schema.field_names() {
        if !seen.insert(name) {
            return Err(OdmError::InvalidDefinition {
                source_name: schema.name.clone(),
                reason: format!("field '{}' is declared more than once", name),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, RelationDef};

    fn blog() -> Vec<Schema> {
        vec![
            Schema::new("user")
                .with_pure("name", FieldKind::String)
                .with_pure("email", FieldKind::String),
            Schema::new("post")
                .with_pure("title", FieldKind::String)
                .with_main_relation("author", RelationDef::single("user"))
                .with_in_relation("comments", RelationDef::multiple("comment")),
            Schema::new("comment")
                .with_pure("text", FieldKind::String)
                .with_main_relation("post", RelationDef::single("post")),
        ]
    }

    #[test]
    fn test_build_and_lookup() {
        let registry = SchemaRegistry::from_schemas(blog()).unwrap();
        assert_eq!(registry.schema_count(), 3);
        assert_eq!(registry.relation_count(), 3);
        let names: Vec<_> = registry.schema_names().cloned().collect();
        assert_eq!(names, vec!["user", "post", "comment"]);

        let pure = registry.get_pure_fields("user").unwrap();
        assert_eq!(pure.keys().collect::<Vec<_>>(), vec!["name", "email"]);

        let relations = registry.get_relations("post").unwrap();
        assert_eq!(relations.main_relations["author"].schema_name, "user");
        assert_eq!(relations.in_relations.len(), 1);
        assert!(relations.out_relations.is_empty());
    }

    #[test]
    fn test_unknown_schema_suggests() {
        let registry = SchemaRegistry::from_schemas(blog()).unwrap();
        match registry.get_schema("posts") {
            Err(OdmError::UnknownSchema { name, suggestion }) => {
                assert_eq!(name, "posts");
                assert_eq!(suggestion.as_deref(), Some("post"));
            }
            other => panic!("Expected UnknownSchema, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_duplicate_schema() {
        let result = SchemaRegistry::from_schemas(vec![Schema::new("user"), Schema::new("user")]);
        assert!(matches!(result, Err(OdmError::DuplicateSchema(name)) if name == "user"));
    }

    #[test]
    fn test_rejects_unknown_relation_target() {
        let result = SchemaRegistry::from_schemas(vec![
            Schema::new("post").with_out_relation("tags", RelationDef::multiple("tag")),
        ]);
        match result {
            Err(OdmError::UnknownRelationTarget { schema, field, target }) => {
                assert_eq!((schema.as_str(), field.as_str(), target.as_str()), ("post", "tags", "tag"));
            }
            other => panic!("Expected UnknownRelationTarget, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_ownership_cycle() {
        let result = SchemaRegistry::from_schemas(vec![
            Schema::new("a").with_main_relation("b", RelationDef::single("b")),
            Schema::new("b").with_main_relation("a", RelationDef::single("a")),
        ]);
        match result {
            Err(OdmError::OwnershipCycle { cycle }) => assert_eq!(cycle, vec!["a", "b", "a"]),
            other => panic!("Expected OwnershipCycle, got {:?}", other),
        }
    }

    #[test]
    fn test_descriptive_cycles_are_allowed() {
        let registry = SchemaRegistry::from_schemas(vec![
            Schema::new("user").with_out_relation("friends", RelationDef::multiple("user")),
        ]);
        assert!(registry.is_ok());
    }

    #[test]
    fn test_rejects_field_declared_twice() {
        let result = SchemaRegistry::from_schemas(vec![
            Schema::new("user"),
            Schema::new("post")
                .with_pure("author", FieldKind::String)
                .with_main_relation("author", RelationDef::single("user")),
        ]);
        assert!(matches!(result, Err(OdmError::InvalidDefinition { .. })));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = SchemaRegistry::from_schemas(blog()).unwrap();
        let b = SchemaRegistry::from_schemas(blog()).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}

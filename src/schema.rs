//! Schema definition types
//!
//! A schema describes one collection: its pure (non-relational) fields and the
//! three relation maps. All maps keep declaration order, which is the order
//! owners are resolved and relation fields are projected in.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Primitive type of a pure field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Date,
    ObjectId,
    Object,
    Array,
}

impl FieldKind {
    /// Returns the type name used in definitions and messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::ObjectId => "object_id",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
        }
    }
}

/// A pure field descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub optional: bool,
}

impl FieldDescriptor {
    pub fn required(kind: FieldKind) -> Self {
        Self { kind, optional: false }
    }

    pub fn optional(kind: FieldKind) -> Self {
        Self { kind, optional: true }
    }
}

/// Whether a relation field embeds one document or an array of them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    #[default]
    Single,
    Multiple,
}

/// Target of a relation field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Name of the referenced schema (and collection)
    pub schema_name: String,
    #[serde(default)]
    pub kind: RelationKind,
}

impl RelationDef {
    pub fn single(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            kind: RelationKind::Single,
        }
    }

    pub fn multiple(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            kind: RelationKind::Multiple,
        }
    }
}

/// Relation field name -> relation target, in declaration order
pub type RelationMap = IndexMap<String, RelationDef>;

/// A single collection schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Unique schema name, also the collection name
    pub name: String,
    #[serde(default)]
    pub pure_fields: IndexMap<String, FieldDescriptor>,
    /// Descriptive, non-owning relations (projection only)
    #[serde(default)]
    pub in_relations: RelationMap,
    /// Descriptive, non-owning relations (projection only)
    #[serde(default)]
    pub out_relations: RelationMap,
    /// Owning embeds; these drive cascading deletes
    #[serde(default)]
    pub main_relations: RelationMap,
}

impl Schema {
    /// Create an empty schema
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pure_fields: IndexMap::new(),
            in_relations: IndexMap::new(),
            out_relations: IndexMap::new(),
            main_relations: IndexMap::new(),
        }
    }

    pub fn with_pure(mut self, field: impl Into<String>, kind: FieldKind) -> Self {
        self.pure_fields.insert(field.into(), FieldDescriptor::required(kind));
        self
    }

    pub fn with_in_relation(mut self, field: impl Into<String>, target: RelationDef) -> Self {
        self.in_relations.insert(field.into(), target);
        self
    }

    pub fn with_out_relation(mut self, field: impl Into<String>, target: RelationDef) -> Self {
        self.out_relations.insert(field.into(), target);
        self
    }

    pub fn with_main_relation(mut self, field: impl Into<String>, target: RelationDef) -> Self {
        self.main_relations.insert(field.into(), target);
        self
    }

    /// Borrow the three relation maps
    pub fn relations(&self) -> Relations<'_> {
        Relations {
            in_relations: &self.in_relations,
            out_relations: &self.out_relations,
            main_relations: &self.main_relations,
        }
    }

    /// In-relations followed by out-relations, the fields a projection may expand
    pub fn descriptive_relations(&self) -> impl Iterator<Item = (&String, &RelationDef)> {
        self.in_relations.iter().chain(self.out_relations.iter())
    }

    /// Every declared field name, pure and relational
    pub fn field_names(&self) -> impl Iterator<Item = &String> {
        self.pure_fields
            .keys()
            .chain(self.in_relations.keys())
            .chain(self.out_relations.keys())
            .chain(self.main_relations.keys())
    }
}

/// Borrowed view over a schema's relation maps
#[derive(Debug, Clone, Copy)]
pub struct Relations<'a> {
    pub in_relations: &'a RelationMap,
    pub out_relations: &'a RelationMap,
    pub main_relations: &'a RelationMap,
}

impl Relations<'_> {
    /// Total number of relation fields
    pub fn len(&self) -> usize {
        self.in_relations.len() + self.out_relations.len() + self.main_relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

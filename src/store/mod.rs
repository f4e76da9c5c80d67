//! Document-store driver boundary
//!
//! The engine only needs four primitives from a store: `find_one`, `find`,
//! `delete_one` and `delete_many`, with filters on exact values, dotted
//! embedded paths (`"author._id"`) and `_id in [...]`. Any driver implementing
//! [`DocumentStore`] can back the cascade engine; [`memory::MemoryStore`] is
//! the in-process implementation.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use thiserror::Error;

/// Name of the identifier field
pub const ID_FIELD: &str = "_id";

// =============================================================================
// Documents
// =============================================================================

/// Opaque document identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Value);

impl DocumentId {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl Hash for DocumentId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Value has no Hash; its compact encoding is canonical for equal values
        self.0.to_string().hash(state);
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", other),
        }
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(Value::String(s.to_string()))
    }
}

impl From<i64> for DocumentId {
    fn from(n: i64) -> Self {
        Self(Value::from(n))
    }
}

/// A stored document: `_id` plus arbitrary fields
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Build a document from an id and a JSON object of fields.
    /// Non-object `fields` are ignored.
    pub fn new(id: impl Into<DocumentId>, fields: Value) -> Self {
        let mut map = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        map.insert(ID_FIELD.to_string(), id.into().into_value());
        Self(map)
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// The document's `_id`, if present
    pub fn id(&self) -> Option<DocumentId> {
        self.0.get(ID_FIELD).cloned().map(DocumentId)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Every value found at a dotted path. Arrays along the path fan out,
    /// so `tags._id` on `{tags: [{_id: 1}, {_id: 2}]}` yields both ids.
    pub fn values_at(&self, path: &str) -> Vec<&Value> {
        let mut current: Vec<&Value> = Vec::new();
        let mut segments = path.split('.');

        let Some(first) = segments.next() else {
            return current;
        };
        if let Some(value) = self.0.get(first) {
            current.push(value);
        }

        for segment in segments {
            let mut next = Vec::new();
            for value in current {
                match value {
                    Value::Object(map) => next.extend(map.get(segment)),
                    Value::Array(items) => next.extend(
                        items
                            .iter()
                            .filter_map(|item| item.as_object())
                            .filter_map(|map| map.get(segment)),
                    ),
                    _ => {}
                }
            }
            current = next;
        }
        current
    }

    /// Keep only `_id` and the listed top-level fields
    pub fn project(&self, projection: &Projection) -> Document {
        let map = self
            .0
            .iter()
            .filter(|(key, _)| key.as_str() == ID_FIELD || projection.fields.iter().any(|f| f == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Document(map)
    }
}

// =============================================================================
// Filters, projections, options
// =============================================================================

/// Query filter understood by every driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Matches every document
    All,
    /// Some value at the dotted path equals `value`
    Eq { path: String, value: Value },
    /// Some value at the dotted path is one of `values`
    In { path: String, values: Vec<Value> },
    /// Every sub-filter matches
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            path: path.into(),
            value: value.into(),
        }
    }

    /// `_id == id`
    pub fn by_id(id: &DocumentId) -> Self {
        Self::eq(ID_FIELD, id.as_value().clone())
    }

    /// `_id in ids`
    pub fn id_in(ids: &[DocumentId]) -> Self {
        Self::In {
            path: ID_FIELD.to_string(),
            values: ids.iter().map(|id| id.as_value().clone()).collect(),
        }
    }

    /// `"<path>" == id`, for embedded identifiers such as `author._id`
    pub fn embedded_id(path: impl Into<String>, id: &DocumentId) -> Self {
        Self::eq(path, id.as_value().clone())
    }

    /// Evaluate against a document
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq { path, value } => document.values_at(path).into_iter().any(|v| v == value),
            Filter::In { path, values } => document
                .values_at(path)
                .into_iter()
                .any(|v| values.contains(v)),
            Filter::And(filters) => filters.iter().all(|f| f.matches(document)),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => write!(f, "{{}}"),
            Filter::Eq { path, value } => write!(f, "{{{}: {}}}", path, value),
            Filter::In { path, values } => {
                let list: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{{{}: {{$in: [{}]}}}}", path, list.join(", "))
            }
            Filter::And(filters) => {
                let parts: Vec<String> = filters.iter().map(|p| p.to_string()).collect();
                write!(f, "{{$and: [{}]}}", parts.join(", "))
            }
        }
    }
}

/// Fields to return from `find`; `_id` is always included
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Projection {
    pub fields: Vec<String>,
}

impl Projection {
    /// Return identifiers only
    pub fn ids_only() -> Self {
        Self::default()
    }
}

/// Per-call delete options, interpreted by the driver
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteOptions {
    /// Driver-side time limit for the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    /// Free-form annotation recorded by drivers that support it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

// =============================================================================
// Driver trait
// =============================================================================

/// Failure surfaced by a store driver; passed through the engine unchanged
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Transient failures may succeed when retried by the caller
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

/// Result type for driver calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Primitives the engine consumes from a document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// First document in `collection` matching `filter`
    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>>;

    /// All documents matching `filter`, optionally projected
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&Projection>,
    ) -> StoreResult<Vec<Document>>;

    /// Delete the first document matching `filter`; returns the number removed
    async fn delete_one(
        &self,
        collection: &str,
        filter: &Filter,
        options: Option<&DeleteOptions>,
    ) -> StoreResult<u64>;

    /// Delete every document matching `filter`; returns the number removed
    async fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<u64>;

    /// Insert a document
    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<()>;
}

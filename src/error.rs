//! Error types for the document mapping core

use thiserror::Error;

use crate::cascade::BlockingOwner;
use crate::store::StoreError;

/// Result type for ODM operations
pub type Result<T> = std::result::Result<T, OdmError>;

/// ODM errors
#[derive(Error, Debug)]
pub enum OdmError {
    #[error("Document not found in '{collection}' matching {filter}")]
    NotFound { collection: String, filter: String },

    #[error(
        "Cannot delete from '{collection}': {} owning document(s) still reference it: {}",
        blocking.len(),
        format_blocking(blocking)
    )]
    CascadeConflict {
        collection: String,
        blocking: Vec<BlockingOwner>,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Unknown schema: {name}{}", suggestion.as_ref().map(|s| format!(" (did you mean '{}'?)", s)).unwrap_or_default())]
    UnknownSchema {
        name: String,
        suggestion: Option<String>,
    },

    #[error("Relation {schema}.{field} targets unknown schema '{target}'")]
    UnknownRelationTarget {
        schema: String,
        field: String,
        target: String,
    },

    #[error("Schema already registered: {0}")]
    DuplicateSchema(String),

    #[error("Main relations form an ownership cycle: {}", cycle.join(" -> "))]
    OwnershipCycle { cycle: Vec<String> },

    #[error("Invalid schema definition in {source_name}: {reason}")]
    InvalidDefinition { source_name: String, reason: String },

    #[error("Cascade from '{collection}' exceeded the maximum depth of {limit}")]
    CascadeDepthExceeded { collection: String, limit: usize },

    #[error("Projection of '{schema}' exceeded the maximum nesting of {limit}")]
    ProjectionDepthExceeded { schema: String, limit: usize },

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl OdmError {
    /// Whether retrying the same call unchanged could succeed.
    ///
    /// The engine never retries on its own; only transient store failures qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

fn format_blocking(blocking: &[BlockingOwner]) -> String {
    blocking
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

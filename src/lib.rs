//! Familiar ODM
//!
//! Relation-aware mapping core for document stores. Schemas declare pure
//! fields plus three kinds of relation to other schemas:
//!
//! - **in/out relations**: descriptive embeds, used only for projections
//! - **main relations**: owning embeds; the owner holds `{ _id, ... }` of the
//!   owned document and is deleted with it on a hard cascade
//!
//! ## Architecture
//!
//! ```text
//! loader ──> SchemaRegistry (immutable, cycle-free ownership)
//!                 │
//!       ┌─────────┼──────────────┐
//!       v         v              v
//!  find_owners  select_struct  CascadeDeleteEngine ──> DocumentStore
//!                                                      (MemoryStore, drivers)
//! ```
//!
//! ## Example
//!
//! ```
//! use familiar_odm::{select_struct, DepthSpec, FieldKind, RelationDef, Schema, SchemaRegistry};
//!
//! let registry = SchemaRegistry::from_schemas(vec![
//!     Schema::new("user").with_pure("name", FieldKind::String),
//!     Schema::new("post")
//!         .with_pure("title", FieldKind::String)
//!         .with_out_relation("author", RelationDef::single("user")),
//! ])
//! .unwrap();
//!
//! let spec = select_struct(&registry, "post", &DepthSpec::Leaf(1)).unwrap();
//! assert_eq!(spec.relation_names(), vec!["author"]);
//! ```

pub mod cascade;
pub mod checksum;
pub mod config;
pub mod error;
pub mod graph;
pub mod lint;
pub mod loader;
pub mod projection;
pub mod registry;
pub mod relations;
pub mod schema;
pub mod services;
pub mod store;

pub use cascade::{delete_one, BlockingOwner, CascadeDeleteEngine, CascadeStep, DeleteRequest, Deleted};
pub use checksum::Checksum;
pub use config::OdmConfig;
pub use error::{OdmError, Result};
pub use graph::OwnershipGraph;
pub use loader::{load_from_directory, load_from_file, load_from_path, LoadConfig};
pub use projection::{select_struct, select_struct_bounded, DepthSpec, ProjectionBuilder, ProjectionField, ProjectionSpec};
pub use registry::{RegistryBuilder, SchemaRegistry};
pub use relations::{find_owners, OwnerReference};
pub use schema::{FieldDescriptor, FieldKind, RelationDef, RelationKind, Schema};
pub use services::{ServiceRegistry, ServiceTarget};
pub use store::{DeleteOptions, Document, DocumentId, DocumentStore, Filter, MemoryStore, StoreError};

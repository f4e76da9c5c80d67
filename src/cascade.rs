//! Cascading Delete
//!
//! Deletes a document together with every document that owns it through a
//! main relation, transitively, or refuses when owners exist and a hard
//! cascade was not requested.
//!
//! Order of store calls:
//! 1. `find_one` the target; missing is `NotFound`
//! 2. one `find_one` per owner reference to collect blocking owners
//! 3. conflict check (no mutation happened yet)
//! 4. cascade: per owner reference, `find` all owning documents, `delete_many`
//!    them, then cascade each removed id before the next owner reference
//! 5. `delete_one` the target with the caller's filter and options
//!
//! The cascade walks an explicit stack instead of recursing, so a deep
//! ownership chain cannot exhaust the call stack.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::CascadeConfig;
use crate::error::{OdmError, Result};
use crate::registry::SchemaRegistry;
use crate::relations::{find_owners, OwnerReference};
use crate::store::{DeleteOptions, DocumentId, DocumentStore, Filter, Projection};

/// Default bound on cascade depth
pub const DEFAULT_MAX_DEPTH: usize = 64;

// =============================================================================
// Request / result types
// =============================================================================

/// A delete request against one collection
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub collection: String,
    pub filter: Filter,
    pub options: Option<DeleteOptions>,
    /// Delete owners too instead of failing with a conflict
    pub hard_cascade: bool,
}

impl DeleteRequest {
    pub fn new(collection: impl Into<String>, filter: Filter) -> Self {
        Self {
            collection: collection.into(),
            filter,
            options: None,
            hard_cascade: false,
        }
    }

    pub fn hard_cascade(mut self, hard_cascade: bool) -> Self {
        self.hard_cascade = hard_cascade;
        self
    }

    pub fn options(mut self, options: DeleteOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// An owner document preventing a soft delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingOwner {
    pub owner: OwnerReference,
    /// Identifier of the first owning document found
    pub document_id: DocumentId,
}

impl fmt::Display for BlockingOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} (document {})",
            self.owner.owner_schema, self.owner.field, self.document_id
        )
    }
}

/// One bulk delete performed while cascading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeStep {
    /// The relation followed
    pub owner: OwnerReference,
    /// The owned document whose removal triggered this step
    pub owned_id: DocumentId,
    /// Owner documents removed
    pub deleted_ids: Vec<DocumentId>,
}

/// Outcome of a successful delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deleted {
    pub collection: String,
    pub id: DocumentId,
    /// Bulk deletes, in the order they ran
    pub cascaded: Vec<CascadeStep>,
}

impl Deleted {
    /// Number of owner documents removed by the cascade
    pub fn cascaded_count(&self) -> usize {
        self.cascaded.iter().map(|s| s.deleted_ids.len()).sum()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Pending work on the cascade stack
enum Task {
    /// Expand every owner reference of a removed document
    Visit {
        collection: String,
        id: DocumentId,
        depth: usize,
    },
    /// Remove the owners of `id` reachable through one reference
    Follow {
        owner: OwnerReference,
        id: DocumentId,
        depth: usize,
    },
}

/// Cascading delete over a store and a registry
pub struct CascadeDeleteEngine<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    registry: &'a SchemaRegistry,
    max_depth: usize,
}

impl<'a, S: DocumentStore + ?Sized> CascadeDeleteEngine<'a, S> {
    pub fn new(store: &'a S, registry: &'a SchemaRegistry) -> Self {
        Self {
            store,
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Apply `[cascade]` settings
    pub fn with_config(mut self, config: &CascadeConfig) -> Self {
        self.max_depth = config.max_depth;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Owners currently referencing `id`, one document per owner reference.
    /// Read-only.
    pub async fn find_blocking_owners(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Vec<BlockingOwner>> {
        let mut blocking = Vec::new();
        for owner in find_owners(self.registry, collection) {
            let filter = Filter::embedded_id(owner.embedded_id_path(), id);
            if let Some(doc) = self.store.find_one(&owner.owner_schema, &filter).await? {
                if let Some(document_id) = doc.id() {
                    blocking.push(BlockingOwner { owner, document_id });
                }
            }
        }
        Ok(blocking)
    }

    /// Delete one document, cascading to its owners when allowed
    pub async fn delete_one(&self, request: DeleteRequest) -> Result<Deleted> {
        let DeleteRequest {
            collection,
            filter,
            options,
            hard_cascade,
        } = request;

        // Collections outside the registry have no owners; they delete plainly.
        let target = self
            .store
            .find_one(&collection, &filter)
            .await?
            .and_then(|doc| doc.id());
        let Some(id) = target else {
            return Err(OdmError::NotFound {
                collection,
                filter: filter.to_string(),
            });
        };

        let blocking = self.find_blocking_owners(&collection, &id).await?;
        if !blocking.is_empty() && !hard_cascade {
            warn!(
                collection = %collection,
                id = %id,
                blocking = blocking.len(),
                "delete refused: document is still owned"
            );
            return Err(OdmError::CascadeConflict { collection, blocking });
        }

        let cascaded = if blocking.is_empty() {
            Vec::new()
        } else {
            self.cascade(&collection, &id).await?
        };

        self.store
            .delete_one(&collection, &filter, options.as_ref())
            .await?;

        info!(
            collection = %collection,
            id = %id,
            cascaded = cascaded.iter().map(|s| s.deleted_ids.len()).sum::<usize>(),
            "document deleted"
        );

        Ok(Deleted {
            collection,
            id,
            cascaded,
        })
    }

    /// Remove every owner of `(collection, id)`, transitively.
    ///
    /// Tasks are pushed in reverse so they pop in registry order, and the
    /// visits for one reference's deleted ids sit above the next reference's
    /// task: each deleted owner is fully cascaded before moving on.
    async fn cascade(&self, collection: &str, id: &DocumentId) -> Result<Vec<CascadeStep>> {
        let mut steps = Vec::new();
        let mut visited: HashSet<(String, DocumentId)> = HashSet::new();
        let mut stack = vec![Task::Visit {
            collection: collection.to_string(),
            id: id.clone(),
            depth: 0,
        }];

        while let Some(task) = stack.pop() {
            match task {
                Task::Visit { collection, id, depth } => {
                    if !visited.insert((collection.clone(), id.clone())) {
                        continue;
                    }
                    for owner in find_owners(self.registry, &collection).into_iter().rev() {
                        stack.push(Task::Follow {
                            owner,
                            id: id.clone(),
                            depth,
                        });
                    }
                }
                Task::Follow { owner, id, depth } => {
                    let filter = Filter::embedded_id(owner.embedded_id_path(), &id);
                    let found = self
                        .store
                        .find(&owner.owner_schema, &filter, Some(&Projection::ids_only()))
                        .await?;
                    let deleted_ids: Vec<DocumentId> = found.iter().filter_map(|d| d.id()).collect();
                    if deleted_ids.is_empty() {
                        continue;
                    }
                    if depth >= self.max_depth {
                        return Err(OdmError::CascadeDepthExceeded {
                            collection: owner.target_schema,
                            limit: self.max_depth,
                        });
                    }

                    self.store
                        .delete_many(&owner.owner_schema, &Filter::id_in(&deleted_ids))
                        .await?;
                    debug!(
                        owner = %owner,
                        owned_id = %id,
                        removed = deleted_ids.len(),
                        "cascade step"
                    );

                    for deleted in deleted_ids.iter().rev() {
                        stack.push(Task::Visit {
                            collection: owner.owner_schema.clone(),
                            id: deleted.clone(),
                            depth: depth + 1,
                        });
                    }
                    steps.push(CascadeStep {
                        owner,
                        owned_id: id,
                        deleted_ids,
                    });
                }
            }
        }

        Ok(steps)
    }
}

/// Delete one document from `request.collection`; see [`CascadeDeleteEngine`]
pub async fn delete_one<S: DocumentStore + ?Sized>(
    store: &S,
    registry: &SchemaRegistry,
    request: DeleteRequest,
) -> Result<Deleted> {
    CascadeDeleteEngine::new(store, registry).delete_one(request).await
}

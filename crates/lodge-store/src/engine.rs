//! The storage engine trait
//!
//! One uniform contract over two backends: a file-backed object graph and an
//! embedded relational database. Call sites depend on this trait only and
//! never branch on which backend is behind it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use lodge_types::{Entity, EntityKind, ParentLink};

use crate::error::Result;

/// Outcome of linking an amenity to a place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A new association was recorded.
    Created,
    /// The amenity was already linked; linking again is a no-op.
    Existing,
}

/// Uniform persistence contract.
///
/// Mutations (`stage`, `delete`, link edits) are held in the engine's unit of
/// work until `save` makes them durable; `close` ends the unit of work and
/// drops anything unsaved. One unit of work per request.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Every entity, keyed `"Kind.id"`, optionally filtered to one kind.
    async fn all(&self, kind: Option<EntityKind>) -> Result<BTreeMap<String, Entity>>;

    /// Single lookup. Absent is `Ok(None)`, not an error.
    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>>;

    /// Cardinality, optionally filtered to one kind.
    async fn count(&self, kind: Option<EntityKind>) -> Result<u64>;

    /// Records of `kind` whose `link` foreign key equals `parent_id`,
    /// ordered by creation time. Does not check that the parent exists;
    /// that is the resolver's job.
    async fn children(
        &self,
        kind: EntityKind,
        link: ParentLink,
        parent_id: &str,
    ) -> Result<Vec<Entity>>;

    /// Amenities linked to a place, in link-insertion order.
    async fn amenities_of(&self, place_id: &str) -> Result<Vec<Entity>>;

    /// Record a place-amenity association. Idempotent: linking an existing
    /// association reports `Existing` and changes nothing.
    async fn link_amenity(&self, place_id: &str, amenity_id: &str) -> Result<LinkOutcome>;

    /// Remove a place-amenity association. Unlinking an association that was
    /// never made is `NotFound`, not a silent success.
    async fn unlink_amenity(&self, place_id: &str, amenity_id: &str) -> Result<()>;

    /// Register a newly constructed or modified entity with the unit of
    /// work. Staged, not yet durable.
    async fn stage(&self, entity: Entity) -> Result<()>;

    /// Stage removal of one entity, cascading to owned children and link
    /// edges. `None` is a no-op. Durable at the next `save`.
    async fn delete(&self, entity: Option<&Entity>) -> Result<()>;

    /// Durably persist the staged state, atomically from the caller's view:
    /// the relational backend commits its transaction, the file backend
    /// rewrites the store through a temp-file-then-rename swap.
    async fn save(&self) -> Result<()>;

    /// (Re)initialize engine state: create schema if absent (db) or parse
    /// the backing file, treating an absent or empty file as an empty store.
    async fn reload(&self) -> Result<()>;

    /// End the unit of work, dropping unsaved changes: roll back the active
    /// transaction (db) or re-read the backing file (file). Runs at request
    /// teardown, also when the handler failed.
    async fn close(&self) -> Result<()>;
}

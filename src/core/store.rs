//! The entity store seam
//!
//! Implementations provide persistence for every entity type a handler manages.
//! The framework is agnostic to the underlying storage mechanism; see
//! [`InMemoryEntityStore`](crate::storage::InMemoryEntityStore) for the
//! reference implementation.

use crate::core::entity::{Entity, EntityId, EntityType, Fields};
use crate::core::query::{Page, PageRequest, Selection, StoreQuery};
use anyhow::Result;
use async_trait::async_trait;

/// Persistence collaborator of the resource handler
///
/// Every call is expected to be atomic as seen by the handler: a failed
/// `create` or `update` leaves no partial state behind.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Load one entity, honoring the selected fields and includes
    ///
    /// Returns `Ok(None)` when no entity of that type has this id.
    async fn find_by_id(
        &self,
        entity_type: &EntityType,
        id: EntityId,
        selection: &Selection,
    ) -> Result<Option<Entity>>;

    /// Run a filtered, sorted query and return the requested page
    async fn query(
        &self,
        entity_type: &EntityType,
        query: &StoreQuery,
        page: PageRequest,
    ) -> Result<Page<Entity>>;

    /// Persist a new entity built from `fields`
    async fn create(&self, entity_type: &EntityType, fields: Fields) -> Result<Entity>;

    /// Apply `fields` to an existing entity; unspecified fields are unchanged
    async fn update(
        &self,
        entity_type: &EntityType,
        entity: &Entity,
        fields: Fields,
    ) -> Result<Entity>;

    async fn delete(&self, entity_type: &EntityType, entity: &Entity) -> Result<()>;
}

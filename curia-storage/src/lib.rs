//! The `Storage` trait: the resolver's one named persistence seam. No SQL
//! (or any other query-language) string building is visible past the
//! `QueryPlan` value it accepts — concrete implementations (a real
//! Postgres-backed one, or the in-memory mock in `curia-test-utils`) are the
//! only code aware of the underlying store.
//!
//! One `#[async_trait]` trait, `Result`-returning methods, `Option` for
//! possibly-missing rows.

use async_trait::async_trait;
use curia_core::{Entity, EntityId, QueryPlan};

mod error;
pub use error::StorageError;

pub type StorageResult<T> = Result<T, StorageError>;

/// One page of listing results alongside the total row count the query
/// would have matched without `LIMIT`/`OFFSET`.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub rows: Vec<Entity>,
    pub total_count: u64,
}

/// The persistence seam. `model` names the `ModelDefinition` the operation
/// targets; the implementation is responsible for knowing how that name
/// maps onto its own storage (table, collection, ...).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch one entity by id, or `Ok(None)` if it does not exist.
    async fn get(&self, model: &str, id: EntityId) -> StorageResult<Option<Entity>>;

    /// Fetch a page of entities matching `plan`.
    async fn list(&self, model: &str, plan: &QueryPlan) -> StorageResult<Page>;

    /// Resolve a relation field for one entity, honoring `plan`'s eager
    /// sub-selection for that path.
    async fn resolve_relation(
        &self,
        model: &str,
        id: EntityId,
        relation_field: &str,
        plan: &QueryPlan,
    ) -> StorageResult<Vec<Entity>>;

    /// Persist a brand-new entity and return it as stored (with any
    /// server-assigned defaults applied).
    async fn create(&self, model: &str, entity: Entity) -> StorageResult<Entity>;

    /// Apply a partial field update to an existing entity and return the
    /// entity as stored afterward.
    async fn update(
        &self,
        model: &str,
        id: EntityId,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> StorageResult<Entity>;

    /// Remove an entity. Idempotent: removing an already-absent entity is
    /// not an error.
    async fn delete(&self, model: &str, id: EntityId) -> StorageResult<()>;

    /// Allocate the next value of a named id-sequence, monotonically
    /// increasing and unique per sequence name.
    async fn next_sequence_value(&self, sequence_name: &str) -> StorageResult<i64>;
}

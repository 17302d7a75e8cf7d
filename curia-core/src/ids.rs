//! Opaque identifiers used throughout the resolver core.
//!
//! The instance resolver is model-driven: the set of entity types is data
//! (`ModelDefinition::name`), not a compile-time type, so a single opaque
//! `EntityId` stands in for all of them. `ResolverId` identifies one
//! resolver instance for the request-scoped cache.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Opaque entity identifier, assigned on first persist and never mutated.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Build an `EntityId` from a UUID (as returned by the storage layer).
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Allocate a fresh, timestamp-sortable id for a new entity.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

/// Process-wide unique handle for one `InstanceResolver`, used to key the
/// per-request instance-lookup cache so two resolvers never collide on the
/// same numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolverId(u64);

static NEXT_RESOLVER_ID: AtomicU64 = AtomicU64::new(1);

impl ResolverId {
    /// Allocate the next resolver id. Called once per `InstanceResolver::new`.
    pub fn next() -> Self {
        Self(NEXT_RESOLVER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ResolverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resolver#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_roundtrips_through_string() {
        let id = EntityId::generate();
        let parsed: EntityId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn resolver_ids_are_distinct_and_monotonic() {
        let a = ResolverId::next();
        let b = ResolverId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }
}

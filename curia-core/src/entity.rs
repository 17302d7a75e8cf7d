//! The entity instance type.
//!
//! Because the element set is declared per `ModelDefinition` rather than
//! fixed at compile time, an entity instance is a `field -> JsonValue` map
//! plus the three always-present bookkeeping fields, rather than a
//! generated Rust struct per type.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::ids::EntityId;

/// One persisted instance of some `ModelDefinition`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub fields: BTreeMap<String, JsonValue>,
}

impl Entity {
    /// Construct a brand-new entity with `created == updated == now`.
    /// `id` is assigned here and never mutated afterward.
    pub fn new(id: EntityId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            created: now,
            updated: now,
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: &str, value: JsonValue) {
        self.fields.insert(field.to_string(), value);
    }

    /// Mark this entity as having just been persisted again: refresh
    /// `updated`, leaving `created` and `id` untouched.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entity_has_equal_created_and_updated() {
        let now = Utc::now();
        let entity = Entity::new(EntityId::generate(), now);
        assert_eq!(entity.created, entity.updated);
    }

    #[test]
    fn touch_refreshes_updated_but_not_created() {
        let t0 = Utc::now();
        let mut entity = Entity::new(EntityId::generate(), t0);
        let t1 = t0 + chrono::Duration::seconds(5);
        entity.touch(t1);
        assert_eq!(entity.created, t0);
        assert_eq!(entity.updated, t1);
        assert!(entity.created <= entity.updated);
    }
}

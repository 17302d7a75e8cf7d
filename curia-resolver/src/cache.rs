//! The request-scoped instance cache: an explicit map keyed by a
//! resolver-unique integer, owned exclusively by one request's call tree.
//! No `Arc`, no lock — this state is mutated only by its own resolver
//! chain.

use curia_core::{Entity, EntityId, ResolverId};
use std::cell::RefCell;
use std::collections::HashMap;

/// Per-GraphQL-request state. `instance_lookup` memoizes
/// `resolveInstanceUsingContext(id)` results for the lifetime of one
/// request so repeated lookups of the same entity within a single
/// operation graph do not re-hit storage.
#[derive(Default)]
pub struct RequestContext {
    instance_lookup: RefCell<HashMap<(ResolverId, EntityId), Entity>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the memoized entity for `(resolver, id)`, if one was stored
    /// earlier in this request.
    pub fn get(&self, resolver: ResolverId, id: EntityId) -> Option<Entity> {
        self.instance_lookup.borrow().get(&(resolver, id)).cloned()
    }

    /// Record an entity lookup so later calls in the same request reuse
    /// it instead of re-fetching.
    pub fn memoize(&self, resolver: ResolverId, entity: Entity) {
        self.instance_lookup
            .borrow_mut()
            .insert((resolver, entity.id), entity);
    }

    /// Drop any memoized copy, e.g. after a mutation invalidates it.
    pub fn invalidate(&self, resolver: ResolverId, id: EntityId) {
        self.instance_lookup.borrow_mut().remove(&(resolver, id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn memoized_entity_is_returned_on_subsequent_lookup() {
        let context = RequestContext::new();
        let resolver = ResolverId::next();
        let entity = Entity::new(EntityId::generate(), Utc::now());
        let id = entity.id;

        assert!(context.get(resolver, id).is_none());
        context.memoize(resolver, entity);
        assert!(context.get(resolver, id).is_some());
    }

    #[test]
    fn different_resolvers_do_not_collide_on_same_entity_id() {
        let context = RequestContext::new();
        let resolver_a = ResolverId::next();
        let resolver_b = ResolverId::next();
        let entity = Entity::new(EntityId::generate(), Utc::now());
        let id = entity.id;

        context.memoize(resolver_a, entity);
        assert!(context.get(resolver_a, id).is_some());
        assert!(context.get(resolver_b, id).is_none());
    }

    #[test]
    fn invalidate_removes_memoized_entry() {
        let context = RequestContext::new();
        let resolver = ResolverId::next();
        let entity = Entity::new(EntityId::generate(), Utc::now());
        let id = entity.id;

        context.memoize(resolver, entity);
        context.invalidate(resolver, id);
        assert!(context.get(resolver, id).is_none());
    }
}

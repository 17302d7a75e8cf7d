//! Fixture validation sets for exercising `completeTask` without a real
//! form/validation-set compiler: a closure-backed `ValidationSet` plus a
//! small registry keyed by `(form, outcome)`.

use curia_core::Entity;
use curia_resolver::{ValidationRegistry, ValidationSet};
use std::collections::HashMap;
use std::sync::Arc;

/// A `ValidationSet` whose predicate is an arbitrary closure over the
/// entity, for tests that need one specific rule without declaring a new
/// type per case.
pub struct PredicateValidationSet {
    predicate: Box<dyn Fn(&Entity) -> bool + Send + Sync>,
    referenced_relations: Vec<String>,
}

impl PredicateValidationSet {
    pub fn new(predicate: impl Fn(&Entity) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
            referenced_relations: Vec::new(),
        }
    }

    pub fn with_referenced_relations(mut self, relations: Vec<String>) -> Self {
        self.referenced_relations = relations;
        self
    }
}

impl ValidationSet for PredicateValidationSet {
    fn evaluate(&self, entity: &Entity) -> bool {
        (self.predicate)(entity)
    }

    fn referenced_relations(&self) -> &[String] {
        &self.referenced_relations
    }
}

/// A `ValidationRegistry` backed by a plain map, for tests that want to
/// register one or two validation sets without writing a compiler.
#[derive(Default)]
pub struct FixtureValidationRegistry {
    sets: HashMap<(String, String), Arc<dyn ValidationSet>>,
}

impl FixtureValidationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_set(mut self, form: &str, outcome: &str, set: Arc<dyn ValidationSet>) -> Self {
        self.sets.insert((form.to_string(), outcome.to_string()), set);
        self
    }
}

impl ValidationRegistry for FixtureValidationRegistry {
    fn lookup(&self, form: &str, outcome: &str) -> Option<Arc<dyn ValidationSet>> {
        self.sets.get(&(form.to_string(), outcome.to_string())).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use curia_core::EntityId;
    use serde_json::Value as JsonValue;

    #[test]
    fn predicate_validation_set_evaluates_the_closure() {
        let set = PredicateValidationSet::new(|entity| entity.get("title").is_some());
        let mut entity = Entity::new(EntityId::generate(), Utc::now());
        assert!(!set.evaluate(&entity));
        entity.set("title", JsonValue::String("hello".to_string()));
        assert!(set.evaluate(&entity));
    }

    #[test]
    fn registry_looks_up_by_form_and_outcome() {
        let registry = FixtureValidationRegistry::new().with_set(
            "curate",
            "accept",
            Arc::new(PredicateValidationSet::new(|_| true)),
        );
        assert!(registry.lookup("curate", "accept").is_some());
        assert!(registry.lookup("curate", "reject").is_none());
    }
}

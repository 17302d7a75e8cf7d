//! An in-memory `Storage` mock: a `Mutex<HashMap>` keyed by `(model, id)`,
//! with a small `WhereClause` evaluator standing in for a real query
//! engine.

use async_trait::async_trait;
use curia_core::{Entity, EntityId, QueryPlan, WhereClause};
use curia_storage::{Page, Storage, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemoryStorage {
    rows: Mutex<HashMap<(String, EntityId), Entity>>,
    sequences: Mutex<HashMap<String, i64>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entity directly, bypassing `create`, for test setup.
    pub fn seed(&self, model: &str, entity: Entity) {
        self.rows.lock().unwrap().insert((model.to_string(), entity.id), entity);
    }
}

fn evaluate(clause: &WhereClause, entity: &Entity) -> bool {
    match clause {
        WhereClause::IsNull { field } => entity.get(field).is_none_or(|v| v.is_null()),
        WhereClause::In { field, values } => entity.get(field).is_some_and(|v| values.contains(v)),
        WhereClause::FalseOrNull { field } => match entity.get(field) {
            None => true,
            Some(v) => v.is_null() || v == &serde_json::Value::Bool(false),
        },
        WhereClause::Eq { field, value } => entity.get(field) == Some(value),
        WhereClause::OwnedBy { field, subject_id } => {
            entity.get(field).and_then(|v| v.as_str()) == Some(subject_id.as_str())
        }
        WhereClause::And(clauses) => clauses.iter().all(|c| evaluate(c, entity)),
        WhereClause::Or(clauses) => clauses.iter().any(|c| evaluate(c, entity)),
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get(&self, model: &str, id: EntityId) -> StorageResult<Option<Entity>> {
        Ok(self.rows.lock().unwrap().get(&(model.to_string(), id)).cloned())
    }

    async fn list(&self, model: &str, plan: &QueryPlan) -> StorageResult<Page> {
        let rows = self.rows.lock().unwrap();
        let mut matching: Vec<Entity> = rows
            .iter()
            .filter(|((row_model, _), _)| row_model == model)
            .map(|(_, entity)| entity)
            .filter(|e| plan.r#where.as_ref().is_none_or(|clause| evaluate(clause, e)))
            .cloned()
            .collect();

        for term in plan.order.iter().rev() {
            matching.sort_by(|a, b| {
                let (av, bv) = (a.get(&term.column), b.get(&term.column));
                let ord = av.map(|v| v.to_string()).cmp(&bv.map(|v| v.to_string()));
                if term.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        let total_count = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(plan.offset as usize)
            .take(plan.first as usize)
            .collect();

        Ok(Page { rows: page, total_count })
    }

    async fn resolve_relation(
        &self,
        _model: &str,
        _id: EntityId,
        _relation_field: &str,
        _plan: &QueryPlan,
    ) -> StorageResult<Vec<Entity>> {
        Ok(Vec::new())
    }

    async fn create(&self, model: &str, entity: Entity) -> StorageResult<Entity> {
        self.rows.lock().unwrap().insert((model.to_string(), entity.id), entity.clone());
        Ok(entity)
    }

    async fn update(
        &self,
        model: &str,
        id: EntityId,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> StorageResult<Entity> {
        let mut rows = self.rows.lock().unwrap();
        let entity = rows
            .get_mut(&(model.to_string(), id))
            .ok_or(StorageError::NotFound)?;
        for (field, value) in fields {
            entity.set(&field, value);
        }
        Ok(entity.clone())
    }

    async fn delete(&self, model: &str, id: EntityId) -> StorageResult<()> {
        self.rows.lock().unwrap().remove(&(model.to_string(), id));
        Ok(())
    }

    async fn next_sequence_value(&self, sequence_name: &str) -> StorageResult<i64> {
        let mut sequences = self.sequences.lock().unwrap();
        let value = sequences.entry(sequence_name.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let storage = InMemoryStorage::new();
        let entity = Entity::new(EntityId::generate(), Utc::now());
        let id = entity.id;
        storage.create("Manuscript", entity).await.unwrap();

        let fetched = storage.get("Manuscript", id).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn sequence_values_are_monotonic() {
        let storage = InMemoryStorage::new();
        let a = storage.next_sequence_value("manuscript_seq").await.unwrap();
        let b = storage.next_sequence_value("manuscript_seq").await.unwrap();
        assert_eq!(b, a + 1);
    }

    #[tokio::test]
    async fn update_on_missing_entity_is_not_found() {
        let storage = InMemoryStorage::new();
        let result = storage.update("Manuscript", EntityId::generate(), serde_json::Map::new()).await;
        assert!(matches!(result, Err(StorageError::NotFound)));
    }
}

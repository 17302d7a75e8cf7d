//! The authorization projector: re-evaluates ACL per row and rewrites each
//! retrieved entity down to its allowed field set.

use curia_core::{AclMatch, Entity};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::introspect::ModelIntrospection;

/// The entity DTO returned to callers: always `id`/`created`/`updated`, the
/// allowed fields present on the entity, and `restricted_fields` for any
/// requested field the caller was not allowed to see.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProjectedEntity {
    pub id: String,
    pub created: chrono::DateTime<chrono::Utc>,
    pub updated: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, JsonValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub restricted_fields: Vec<String>,
}

/// Project one entity for one subject's `read` ACL match against the
/// fields the caller actually requested.
pub fn project_entity(
    introspection: &ModelIntrospection,
    entity: &Entity,
    read_match: &AclMatch,
    requested_fields: &[String],
) -> ProjectedEntity {
    if !read_match.allow {
        return ProjectedEntity {
            id: entity.id.to_string(),
            created: entity.created,
            updated: entity.updated,
            fields: BTreeMap::new(),
            restricted_fields: requested_fields
                .iter()
                .filter(|f| f.as_str() != "id")
                .cloned()
                .collect(),
        };
    }

    let allowed_fields = allowed_field_set(introspection, read_match);

    let mut fields = BTreeMap::new();
    let mut restricted_fields = Vec::new();

    for field in requested_fields {
        if is_always_present(field) {
            continue;
        }
        if allowed_fields.contains(field.as_str()) {
            if let Some(value) = entity.get(field) {
                fields.insert(field.clone(), value.clone());
            }
        } else {
            restricted_fields.push(field.clone());
        }
    }

    ProjectedEntity {
        id: entity.id.to_string(),
        created: entity.created,
        updated: entity.updated,
        fields,
        restricted_fields,
    }
}

fn is_always_present(field: &str) -> bool {
    matches!(
        field,
        "id" | "created" | "updated" | "tasks" | "restrictedFields"
    )
}

/// `allowedReadFields ∩ (match.allowedFields or *)`.
fn allowed_field_set<'a>(
    introspection: &'a ModelIntrospection,
    read_match: &'a AclMatch,
) -> std::collections::HashSet<&'a str> {
    let readable: std::collections::HashSet<&str> = introspection
        .readable_fields
        .iter()
        .map(String::as_str)
        .collect();

    match &read_match.allowed_fields {
        Some(fields) => {
            let restricted: std::collections::HashSet<&str> =
                fields.iter().map(String::as_str).collect();
            readable.intersection(&restricted).copied().collect()
        }
        None => readable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curia_core::{EntityId, ModelDefinition};

    fn sample_entity() -> Entity {
        let now = chrono::Utc::now();
        let mut entity = Entity::new(EntityId::generate(), now);
        entity.set("title", JsonValue::String("hello".into()));
        entity.set("secretCost", JsonValue::from(42));
        entity
    }

    fn sample_introspection() -> ModelIntrospection {
        let model = ModelDefinition::new("Manuscript")
            .with_element(curia_core::ElementDescriptor::scalar("title"))
            .with_element(curia_core::ElementDescriptor::scalar("secretCost"));
        ModelIntrospection::build(&model)
    }

    #[test]
    fn denied_match_restricts_every_field_except_id() {
        let entity = sample_entity();
        let introspection = sample_introspection();
        let requested = vec!["id".to_string(), "title".to_string(), "secretCost".to_string()];

        let projected = project_entity(&introspection, &entity, &AclMatch::deny(), &requested);
        assert!(projected.fields.is_empty());
        assert_eq!(projected.restricted_fields, vec!["title".to_string(), "secretCost".to_string()]);
    }

    #[test]
    fn allowed_fields_restricts_to_intersection() {
        let entity = sample_entity();
        let introspection = sample_introspection();
        let requested = vec!["title".to_string(), "secretCost".to_string()];
        let read_match = AclMatch {
            allow: true,
            allowed_fields: Some(vec!["title".to_string()]),
            ..Default::default()
        };

        let projected = project_entity(&introspection, &entity, &read_match, &requested);
        assert_eq!(projected.fields.get("title"), Some(&JsonValue::String("hello".into())));
        assert_eq!(projected.restricted_fields, vec!["secretCost".to_string()]);
    }

    #[test]
    fn permissive_match_exposes_everything_requested() {
        let entity = sample_entity();
        let introspection = sample_introspection();
        let requested = vec!["title".to_string(), "secretCost".to_string()];

        let projected = project_entity(&introspection, &entity, &AclMatch::permissive(), &requested);
        assert_eq!(projected.fields.len(), 2);
        assert!(projected.restricted_fields.is_empty());
    }
}

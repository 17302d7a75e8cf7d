//! The query planner: builds projection, filtering, ordering, paging, and
//! eager-relation directives from requested fields and list input, then
//! runs them through the model's extension chain.

use curia_core::{
    AclMatch, EagerPath, ElementDescriptor, EntityId, ExtensionChain, OrderTerm, QueryPlan,
    ResolverError, WhereClause,
};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::introspect::ModelIntrospection;

/// Arguments accepted by `list`: `first` defaults to the resolver's
/// configured page size, capped at its configured maximum.
#[derive(Debug, Clone, Default)]
pub struct ListArgs {
    pub first: Option<u32>,
    pub offset: Option<u32>,
    pub filter: BTreeMap<String, JsonValue>,
    pub sorting: BTreeMap<String, bool>,
}

/// Compile a `ListArgs` plus the requested top-level fields into a
/// `QueryPlan`, applying filtering, sorting, ownership scoping, and the
/// model's extension chain.
pub fn plan_query(
    introspection: &ModelIntrospection,
    requested_fields: &[String],
    args: &ListArgs,
    acl_match: &AclMatch,
    subject_id: Option<EntityId>,
    extensions: &ExtensionChain,
    first: u32,
) -> Result<QueryPlan, ResolverError> {
    let projection = project_fields(introspection, requested_fields);
    let mut plan = QueryPlan::new(first, args.offset.unwrap_or(0)).with_projection(projection);

    for (field, descriptor) in eager_relation_fields(introspection, requested_fields) {
        plan = plan.with_eager(eager_path_for(field, descriptor));
    }

    plan = apply_filters(introspection, &args.filter, plan, extensions);
    plan = extensions.apply_whole_filter(plan);
    plan = apply_ownership_scope(acl_match, subject_id, introspection, plan)?;
    plan = apply_sorting(introspection, &args.sorting, plan);
    plan = extensions.apply_listing(plan);

    Ok(plan)
}

/// Projection: top-level fields that are not relations.
fn project_fields(introspection: &ModelIntrospection, requested: &[String]) -> Vec<String> {
    requested
        .iter()
        .filter(|field| introspection.find_relation(field).is_none())
        .cloned()
        .collect()
}

fn eager_relation_fields<'a>(
    introspection: &'a ModelIntrospection,
    requested: &'a [String],
) -> impl Iterator<Item = (&'a str, &'a ElementDescriptor)> {
    requested.iter().filter_map(move |field| {
        introspection
            .find_relation(field)
            .map(|descriptor| (field.as_str(), descriptor))
    })
}

fn eager_path_for(field: &str, descriptor: &ElementDescriptor) -> EagerPath {
    let path = match &descriptor.default_eager {
        Some(sub) => format!("{field}.{sub}"),
        None => field.to_string(),
    };
    EagerPath {
        path,
        sub_fields: Vec::new(),
    }
}

/// Apply the filtering rules: `null` → IS NULL, multi-filter array → IN,
/// scalar `false` → tri-state false-or-null, everything else → equality.
/// Unknown (non-listing-filter) keys are ignored. Per-field extensions run
/// for each filter key in insertion order, short-circuiting on first match.
fn apply_filters(
    introspection: &ModelIntrospection,
    filter: &BTreeMap<String, JsonValue>,
    mut plan: QueryPlan,
    extensions: &ExtensionChain,
) -> QueryPlan {
    for (field, value) in filter {
        let Some(descriptor) = introspection.find_filterable(field) else {
            continue;
        };

        let clause = match value {
            JsonValue::Null => Some(WhereClause::IsNull {
                field: field.clone(),
            }),
            JsonValue::Array(values) if descriptor.listing_filter_multiple => {
                Some(WhereClause::In {
                    field: field.clone(),
                    values: values.clone(),
                })
            }
            JsonValue::Bool(false) => Some(WhereClause::FalseOrNull {
                field: field.clone(),
            }),
            other => Some(WhereClause::Eq {
                field: field.clone(),
                value: other.clone(),
            }),
        };

        if let Some(clause) = clause {
            plan = plan.and_where(clause);
        }
        plan = extensions.apply_field(field, plan);
    }
    plan
}

/// Ownership scoping: if the ACL match's restrictions lack `"all"`, require
/// at least one owner field to equal the subject; reject outright if there
/// is no subject.
fn apply_ownership_scope(
    acl_match: &AclMatch,
    subject_id: Option<EntityId>,
    introspection: &ModelIntrospection,
    plan: QueryPlan,
) -> Result<QueryPlan, ResolverError> {
    if acl_match.allows_all_rows() {
        return Ok(plan);
    }

    let Some(subject_id) = subject_id else {
        return Err(ResolverError::authorization(
            "owner-scoped listing requires an authenticated subject",
        ));
    };

    let owner_clauses: Vec<WhereClause> = introspection
        .owners
        .iter()
        .filter_map(|owner| {
            owner.field.clone().map(|field| WhereClause::OwnedBy {
                field,
                subject_id: subject_id.to_string(),
            })
        })
        .collect();

    if owner_clauses.is_empty() {
        return Err(ResolverError::authorization(
            "owner-scoped listing requires at least one declared owner field",
        ));
    }

    Ok(plan.and_where(WhereClause::Or(owner_clauses)))
}

/// Sorting: listing-sortable fields present in `sorting` with a boolean
/// value; non-boolean entries are already excluded by `sorting`'s
/// `bool`-valued type, and unknown keys are ignored.
fn apply_sorting(
    introspection: &ModelIntrospection,
    sorting: &BTreeMap<String, bool>,
    mut plan: QueryPlan,
) -> QueryPlan {
    for (field, descending) in sorting {
        if introspection.find_sortable(field).is_some() {
            plan = plan.with_order(OrderTerm {
                column: field.clone(),
                descending: *descending,
            });
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use curia_core::{ElementDescriptor, ModelDefinition, Restriction};

    fn sample_introspection() -> ModelIntrospection {
        let model = ModelDefinition::new("Manuscript")
            .with_element(ElementDescriptor::scalar("title").with_listing_sortable())
            .with_element(ElementDescriptor::owner("submitter", "User", "submitterId"))
            .with_element(
                ElementDescriptor::state("phase").with_listing_filter(false),
            )
            .with_element(ElementDescriptor::relation("reviewer", "User"));
        ModelIntrospection::build(&model)
    }

    #[test]
    fn filter_null_becomes_is_null_clause() {
        let introspection = sample_introspection();
        let mut filter = BTreeMap::new();
        filter.insert("phase".to_string(), JsonValue::Null);
        let args = ListArgs {
            filter,
            ..Default::default()
        };
        let extensions = ExtensionChain::new();
        let acl = AclMatch::permissive();

        let plan = plan_query(&introspection, &[], &args, &acl, None, &extensions, 20).unwrap();
        assert_eq!(
            plan.r#where,
            Some(WhereClause::IsNull {
                field: "phase".to_string()
            })
        );
    }

    #[test]
    fn filter_false_becomes_false_or_null() {
        let introspection = sample_introspection();
        let mut filter = BTreeMap::new();
        filter.insert("phase".to_string(), JsonValue::Bool(false));
        let args = ListArgs {
            filter,
            ..Default::default()
        };
        let extensions = ExtensionChain::new();
        let acl = AclMatch::permissive();

        let plan = plan_query(&introspection, &[], &args, &acl, None, &extensions, 20).unwrap();
        assert_eq!(
            plan.r#where,
            Some(WhereClause::FalseOrNull {
                field: "phase".to_string()
            })
        );
    }

    #[test]
    fn unknown_filter_key_is_ignored() {
        let introspection = sample_introspection();
        let mut filter = BTreeMap::new();
        filter.insert("doesNotExist".to_string(), JsonValue::Bool(true));
        let args = ListArgs {
            filter,
            ..Default::default()
        };
        let extensions = ExtensionChain::new();
        let acl = AclMatch::permissive();

        let plan = plan_query(&introspection, &[], &args, &acl, None, &extensions, 20).unwrap();
        assert_eq!(plan.r#where, None);
    }

    #[test]
    fn owner_scoping_rejects_missing_subject() {
        let introspection = sample_introspection();
        let args = ListArgs::default();
        let extensions = ExtensionChain::new();
        let acl = AclMatch {
            allow: true,
            allowed_restrictions: Some(vec![Restriction::Owner]),
            ..Default::default()
        };

        let result = plan_query(&introspection, &[], &args, &acl, None, &extensions, 20);
        assert!(matches!(result, Err(ResolverError::Authorization { .. })));
    }

    #[test]
    fn owner_scoping_adds_disjunction_over_owner_fields() {
        let introspection = sample_introspection();
        let args = ListArgs::default();
        let extensions = ExtensionChain::new();
        let acl = AclMatch {
            allow: true,
            allowed_restrictions: Some(vec![Restriction::Owner]),
            ..Default::default()
        };
        let subject = EntityId::generate();

        let plan = plan_query(&introspection, &[], &args, &acl, Some(subject), &extensions, 20)
            .unwrap();
        match plan.r#where {
            Some(WhereClause::Or(clauses)) => assert_eq!(clauses.len(), 1),
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn relation_fields_are_eager_loaded_not_projected() {
        let introspection = sample_introspection();
        let requested = vec!["title".to_string(), "reviewer".to_string()];
        let args = ListArgs::default();
        let extensions = ExtensionChain::new();
        let acl = AclMatch::permissive();

        let plan = plan_query(&introspection, &requested, &args, &acl, None, &extensions, 20)
            .unwrap();
        assert_eq!(plan.projection, vec!["title".to_string()]);
        assert_eq!(plan.eager.len(), 1);
        assert_eq!(plan.eager[0].path, "reviewer");
    }

    proptest::proptest! {
        #[test]
        fn first_is_always_respected_regardless_of_offset(offset in 0u32..1000) {
            let introspection = sample_introspection();
            let args = ListArgs { offset: Some(offset), ..Default::default() };
            let extensions = ExtensionChain::new();
            let acl = AclMatch::permissive();

            let plan = plan_query(&introspection, &[], &args, &acl, None, &extensions, 20).unwrap();
            proptest::prop_assert_eq!(plan.first, 20);
            proptest::prop_assert_eq!(plan.offset, offset);
        }
    }
}

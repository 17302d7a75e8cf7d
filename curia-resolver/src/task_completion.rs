//! The task completion engine: the richest pipeline. Form/outcome
//! resolution, validation, forced state overlay, sequence/date assignment,
//! variable marshaling, BPM completion.

use curia_core::{
    Action, AclEvaluator, AclMatch, AclTraceSink, Entity, EntityId, ModelDefinition,
    OutcomeDescriptor, OutcomeResult, OutcomeStateValue, ResolverError, TargetSet,
};
use curia_storage::Storage;
use curia_workflow::{marshal_variables, WorkflowClient};
use futures_util::future::try_join_all;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::sync::Arc;

use crate::introspect::ModelIntrospection;
use crate::pubsub::PubSub;

/// A pluggable validation set, supplied alongside the model definition by
/// the (out-of-scope) form/validation-set compiler.
pub trait ValidationSet: Send + Sync {
    /// Whether `entity` satisfies this validation set.
    fn evaluate(&self, entity: &Entity) -> bool;

    /// Relation field names this validation set's predicates reference,
    /// used to compute `eagerResolves` in step 1.
    fn referenced_relations(&self) -> &[String];
}

/// Looks up the validation set for a `(form, outcome)` pair. The compiler
/// that produces these is out of scope; this crate only consumes the
/// trait object.
pub trait ValidationRegistry: Send + Sync {
    fn lookup(&self, form: &str, outcome: &str) -> Option<Arc<dyn ValidationSet>>;
}

/// A registry with no validation sets registered for any form/outcome.
pub struct NoValidations;

impl ValidationRegistry for NoValidations {
    fn lookup(&self, _form: &str, _outcome: &str) -> Option<Arc<dyn ValidationSet>> {
        None
    }
}

/// The closed set of normal returns from `complete_task`: a tagged union,
/// reserving thrown errors for fatal classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCompletionOutcome {
    Success,
    ValidatedEmailRequired,
    ValidationFailed,
}

/// Arguments to `completeTask`. All four identifying fields are required;
/// their absence is a user-input error, not a missing-value default.
#[derive(Debug, Clone, Default)]
pub struct CompleteTaskInput {
    pub id: Option<EntityId>,
    pub task_id: Option<String>,
    pub form: Option<String>,
    pub outcome: Option<String>,
    pub state: JsonMap<String, JsonValue>,
}

/// The authenticated subject, already resolved by the (out-of-scope)
/// identity layer.
#[derive(Debug, Clone)]
pub struct Subject {
    pub id: EntityId,
    pub is_administrator: bool,
    pub email_verified: bool,
}

/// The collaborators `complete_task` needs, gathered into one struct so
/// the pipeline function itself stays a plain value-in, value-out
/// computation over borrowed trait objects.
pub struct TaskCompletionDeps<'a> {
    pub model: &'a ModelDefinition,
    pub introspection: &'a ModelIntrospection,
    pub storage: &'a dyn Storage,
    pub workflow: &'a dyn WorkflowClient,
    pub acl: &'a dyn AclEvaluator,
    pub pubsub: &'a dyn PubSub,
    pub validations: &'a dyn ValidationRegistry,
    pub trace_sink: &'a dyn AclTraceSink,
    pub acl_trace_enabled: bool,
}

fn require<T>(value: Option<T>, field: &str) -> Result<T, ResolverError> {
    value.ok_or_else(|| ResolverError::UserInput(format!("missing required field: {field}")))
}

/// Determine owner status by scanning every declared owner field; any
/// match sets the flag (logical OR across owner fields).
pub(crate) fn is_owner(introspection: &ModelIntrospection, entity: &Entity, subject: &Subject) -> bool {
    introspection.owners.iter().any(|owner| {
        owner
            .field
            .as_ref()
            .and_then(|field| entity.get(field))
            .and_then(JsonValue::as_str)
            .is_some_and(|value| value == subject.id.to_string())
    })
}

fn trace(
    deps: &TaskCompletionDeps<'_>,
    entity_id: Option<EntityId>,
    action: Action,
    targets: &TargetSet,
    owner: bool,
    result: &AclMatch,
) {
    if deps.acl_trace_enabled {
        deps.trace_sink.trace(entity_id, action, targets, owner, result);
    }
}

pub async fn complete_task(
    deps: TaskCompletionDeps<'_>,
    input: CompleteTaskInput,
    subject: Option<Subject>,
) -> Result<TaskCompletionOutcome, ResolverError> {
    let id = require(input.id, "id")?;
    let task_id = require(input.task_id, "taskId")?;
    let form_name = require(input.form, "form")?;
    let outcome_name = require(input.outcome, "outcome")?;

    let form = deps
        .model
        .find_form(&form_name)
        .ok_or_else(|| ResolverError::NotFound(format!("form {form_name} not found")))?;
    let outcome: &OutcomeDescriptor = form
        .outcomes
        .iter()
        .find(|o| o.r#type == outcome_name)
        .ok_or_else(|| ResolverError::NotFound(format!("outcome {outcome_name} not found")))?;
    if outcome.result != OutcomeResult::Complete {
        return Err(ResolverError::Logic(format!(
            "outcome {outcome_name} does not resolve to Complete"
        )));
    }

    // Step 1: resolve validation set, compute eagerResolves (unused beyond
    // documenting intent — the mock Storage has no sub-field projection to
    // restrict).
    let validation_set = deps.validations.lookup(&form_name, &outcome_name);

    // Step 2: concurrently fetch entity and the task list for this business key.
    let business_key = id.to_string();
    let (entity, tasks) = tokio::try_join!(
        async {
            deps.storage
                .get(&deps.model.name, id)
                .await
                .map_err(ResolverError::from)
        },
        async {
            deps.workflow
                .list_tasks(&business_key)
                .await
                .map_err(ResolverError::from)
        }
    )?;
    let mut entity = entity.ok_or_else(|| ResolverError::NotFound("entity not found".to_string()))?;
    let task = tasks
        .into_iter()
        .find(|t| t.id == task_id)
        .ok_or_else(|| ResolverError::NotFound("task not found".to_string()))?;

    // Step 3: access + task ACL.
    let targets = match &subject {
        Some(subject) => {
            TargetSet::for_subject(subject.is_administrator, is_owner(deps.introspection, &entity, subject))
        }
        None => TargetSet::anonymous(),
    };
    let owner_flag = targets.is_owner();

    let access_match = deps.acl.evaluate(&targets, Action::Access, Some(&entity));
    trace(&deps, Some(id), Action::Access, &targets, owner_flag, &access_match);
    if !access_match.allow || (!access_match.allows_all_rows() && !owner_flag) {
        return Err(ResolverError::authorization("access denied"));
    }

    let task_match = deps.acl.evaluate(&targets, Action::Task, Some(&entity));
    trace(&deps, Some(id), Action::Task, &targets, owner_flag, &task_match);
    if !task_match.allow {
        return Err(ResolverError::authorization("task action denied"));
    }

    // Step 4: validated-submitter requirement.
    if outcome.requires_validated_submitter {
        let Some(subject) = subject.as_ref() else {
            return Err(ResolverError::authorization(
                "this outcome requires an authenticated, validated subject",
            ));
        };
        if !subject.email_verified {
            return Ok(TaskCompletionOutcome::ValidatedEmailRequired);
        }
    }

    // Step 5: allowedTasks filtering by task-definition key.
    if let Some(allowed_tasks) = &task_match.allowed_tasks {
        let key_matches = task
            .task_definition_key
            .as_deref()
            .is_some_and(|key| allowed_tasks.iter().any(|allowed| allowed == key));
        if !key_matches {
            return Err(ResolverError::authorization("task not in allowedTasks"));
        }
    }

    // Step 6: validation set evaluation.
    if let Some(validation_set) = &validation_set {
        if !outcome.skip_validations && !validation_set.evaluate(&entity) {
            return Ok(TaskCompletionOutcome::ValidationFailed);
        }
    }

    // Step 7: filtered state = client state ∩ declared state fields, then
    // forced outcome overlay (forced values win).
    let mut filtered_state: JsonMap<String, JsonValue> = input
        .state
        .into_iter()
        .filter(|(field, _)| deps.introspection.state_fields.iter().any(|s| s.field.as_deref() == Some(field)))
        .collect();

    for (field, overlay) in &outcome.state {
        let resolved = match overlay {
            OutcomeStateValue::Enum { enum_name, key } => deps.model.resolve_enum(enum_name, key),
            OutcomeStateValue::Simple(value) => Some(value.clone()),
        };
        if let Some(value) = resolved {
            filtered_state.insert(field.clone(), value);
        }
    }

    let mut changed = !filtered_state.is_empty();
    for (field, value) in &filtered_state {
        entity.set(field, value.clone());
    }

    // Step 8: identifier-sequence assignment, concurrently.
    let pending_sequences: Vec<(&str, &str)> = outcome
        .sequence_assignment
        .iter()
        .filter_map(|field| {
            let is_empty = entity.get(field).map(JsonValue::is_null).unwrap_or(true);
            if !is_empty {
                return None;
            }
            deps.introspection
                .id_sequences
                .iter()
                .find(|d| d.field.as_deref() == Some(field.as_str()))
                .and_then(|d| d.id_sequence.as_deref())
                .map(|sequence_name| (field.as_str(), sequence_name))
        })
        .collect();

    if !pending_sequences.is_empty() {
        let allocations = try_join_all(
            pending_sequences
                .iter()
                .map(|(_, sequence_name)| deps.storage.next_sequence_value(sequence_name)),
        )
        .await
        .map_err(ResolverError::from)?;

        for ((field, _), value) in pending_sequences.iter().zip(allocations) {
            entity.set(field, JsonValue::String(format!("S{value:06}")));
        }
        changed = true;
    }

    // Step 9: date assignment.
    if !outcome.date_assignments.is_empty() {
        let now = chrono::Utc::now();
        for field in &outcome.date_assignments {
            if deps.introspection.datetimes.iter().any(|d| d.field.as_deref() == Some(field.as_str())) {
                entity.set(field, JsonValue::String(now.to_rfc3339()));
                changed = true;
            }
        }
    }

    // Step 10: persist once if anything changed.
    if changed {
        let fields: JsonMap<String, JsonValue> = entity.fields.clone().into_iter().collect();
        entity = deps
            .storage
            .update(&deps.model.name, id, fields)
            .await
            .map_err(ResolverError::from)?;
    }

    // Step 11: complete the task with marshaled variables.
    let variables = marshal_variables(filtered_state);
    deps.workflow
        .complete_task(&task.id, variables)
        .await
        .map_err(ResolverError::from)?;

    // Step 12: publish and return.
    deps.pubsub
        .publish(
            &format!("{}.updated", deps.model.name),
            serde_json::json!({ format!("modified{}", deps.model.name): entity.id.to_string() }),
        )
        .await;

    Ok(TaskCompletionOutcome::Success)
}

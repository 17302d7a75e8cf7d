//! Public operations and lifecycle management: `get`, `list`,
//! `resolveRelation`, `create`, `update`, `destroy`, `restart`,
//! `getTasks`, `completeTask`, wired together as one `InstanceResolver`
//! per model.

use curia_core::{
    Action, AclEvaluator, AclTraceSink, ElementDefault, Entity, EntityId, ExtensionChain,
    ModelDefinition, NoopAclTraceSink, ResolverConfig, ResolverError, ResolverId, TargetSet,
};
use curia_storage::Storage;
use curia_workflow::{marshal_variables, WorkflowClient};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::sync::Arc;

use crate::authz::{project_entity, ProjectedEntity};
use crate::cache::RequestContext;
use crate::introspect::ModelIntrospection;
use crate::planner::{plan_query, ListArgs};
use crate::pubsub::PubSub;
use crate::task_completion::{
    complete_task as run_complete_task, is_owner, CompleteTaskInput, NoValidations, Subject,
    TaskCompletionDeps, TaskCompletionOutcome, ValidationRegistry,
};

/// `pageInfo` returned alongside a `list` result.
#[derive(Debug, Clone, PartialEq)]
pub struct PageInfo {
    pub total_count: u64,
    pub offset: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone)]
pub struct ListResult {
    pub results: Vec<ProjectedEntity>,
    pub page_info: PageInfo,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateInput {
    pub fields: JsonMap<String, JsonValue>,
}

#[derive(Debug, Clone, Default)]
pub struct DestroyInput {
    pub state: JsonMap<String, JsonValue>,
}

#[derive(Debug, Clone, Default)]
pub struct RestartInput {
    pub activity_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GetTasksResult {
    pub tasks: Vec<curia_workflow::TaskSummary>,
}

/// A model-bound, process-scoped singleton: holds no mutable state past
/// construction except its one-time relation-model memoization flag.
/// `introspection` plays that role here.
pub struct InstanceResolver {
    model: ModelDefinition,
    introspection: ModelIntrospection,
    extensions: ExtensionChain,
    acl: Arc<dyn AclEvaluator>,
    storage: Arc<dyn Storage>,
    workflow: Arc<dyn WorkflowClient>,
    pubsub: Arc<dyn PubSub>,
    validations: Arc<dyn ValidationRegistry>,
    trace_sink: Arc<dyn AclTraceSink>,
    config: ResolverConfig,
    resolver_id: ResolverId,
}

impl InstanceResolver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: ModelDefinition,
        extensions: ExtensionChain,
        acl: Arc<dyn AclEvaluator>,
        storage: Arc<dyn Storage>,
        workflow: Arc<dyn WorkflowClient>,
        pubsub: Arc<dyn PubSub>,
        validations: Arc<dyn ValidationRegistry>,
        config: ResolverConfig,
    ) -> Self {
        let introspection = ModelIntrospection::build(&model);
        Self {
            model,
            introspection,
            extensions,
            acl,
            storage,
            workflow,
            pubsub,
            validations,
            trace_sink: Arc::new(NoopAclTraceSink),
            config,
            resolver_id: ResolverId::next(),
        }
    }

    pub fn with_trace_sink(mut self, sink: Arc<dyn AclTraceSink>) -> Self {
        self.trace_sink = sink;
        self
    }

    /// Convenience constructor taking `NoValidations` for models without a
    /// task-completion form.
    pub fn without_validations(
        model: ModelDefinition,
        extensions: ExtensionChain,
        acl: Arc<dyn AclEvaluator>,
        storage: Arc<dyn Storage>,
        workflow: Arc<dyn WorkflowClient>,
        pubsub: Arc<dyn PubSub>,
        config: ResolverConfig,
    ) -> Self {
        Self::new(
            model,
            extensions,
            acl,
            storage,
            workflow,
            pubsub,
            Arc::new(NoValidations),
            config,
        )
    }

    fn targets_for(&self, entity: &Entity, subject: Option<&Subject>) -> TargetSet {
        match subject {
            Some(subject) => TargetSet::for_subject(subject.is_administrator, is_owner(&self.introspection, entity, subject)),
            None => TargetSet::anonymous(),
        }
    }

    fn trace(&self, entity_id: Option<EntityId>, action: Action, targets: &TargetSet, owner: bool, result: &curia_core::AclMatch) {
        if self.config.acl_trace_enabled {
            self.trace_sink.trace(entity_id, action, targets, owner, result);
        }
    }

    async fn resolve_instance(
        &self,
        context: &RequestContext,
        id: EntityId,
    ) -> Result<Entity, ResolverError> {
        if let Some(cached) = context.get(self.resolver_id, id) {
            return Ok(cached);
        }
        let entity = self
            .storage
            .get(&self.model.name, id)
            .await
            .map_err(ResolverError::from)?
            .ok_or_else(|| ResolverError::NotFound("entity not found".to_string()))?;
        context.memoize(self.resolver_id, entity.clone());
        Ok(entity)
    }

    fn check_access(&self, entity: &Entity, targets: &TargetSet, owner: bool) -> Result<(), ResolverError> {
        let access_match = self.acl.evaluate(targets, Action::Access, Some(entity));
        self.trace(Some(entity.id), Action::Access, targets, owner, &access_match);
        if !access_match.allow || (!access_match.allows_all_rows() && !owner) {
            return Err(ResolverError::authorization("access denied"));
        }
        Ok(())
    }

    /// `get(id)`.
    pub async fn get(
        &self,
        context: &RequestContext,
        subject: Option<&Subject>,
        id: EntityId,
        requested_fields: &[String],
    ) -> Result<ProjectedEntity, ResolverError> {
        let entity = self.resolve_instance(context, id).await?;
        let targets = self.targets_for(&entity, subject);
        let owner = targets.is_owner();
        self.check_access(&entity, &targets, owner)?;

        let read_match = self.acl.evaluate(&targets, Action::Read, Some(&entity));
        self.trace(Some(id), Action::Read, &targets, owner, &read_match);
        Ok(project_entity(&self.introspection, &entity, &read_match, requested_fields))
    }

    /// `list(first?, offset?, filter?, sorting?)`.
    pub async fn list(
        &self,
        subject: Option<&Subject>,
        requested_fields: &[String],
        args: ListArgs,
    ) -> Result<ListResult, ResolverError> {
        let anonymous_targets = match subject {
            Some(subject) => TargetSet::for_subject(subject.is_administrator, false),
            None => TargetSet::anonymous(),
        };
        let read_match = self.acl.evaluate(&anonymous_targets, Action::Read, None);
        self.trace(None, Action::Read, &anonymous_targets, false, &read_match);

        let first = self.config.clamp_page_size(args.first);
        let subject_id = subject.map(|s| s.id);
        let plan = plan_query(
            &self.introspection,
            requested_fields,
            &args,
            &read_match,
            subject_id,
            &self.extensions,
            first,
        )?;

        let page = self.storage.list(&self.model.name, &plan).await.map_err(ResolverError::from)?;

        let results = page
            .rows
            .iter()
            .map(|entity| {
                let targets = self.targets_for(entity, subject);
                let owner = targets.is_owner();
                let row_match = self.acl.evaluate(&targets, Action::Read, Some(entity));
                self.trace(Some(entity.id), Action::Read, &targets, owner, &row_match);
                project_entity(&self.introspection, entity, &row_match, requested_fields)
            })
            .collect();

        Ok(ListResult {
            results,
            page_info: PageInfo {
                total_count: page.total_count,
                offset: plan.offset,
                page_size: plan.first,
            },
        })
    }

    /// `resolveRelation` traversal for a single entity's relation field.
    pub async fn resolve_relation(
        &self,
        context: &RequestContext,
        subject: Option<&Subject>,
        id: EntityId,
        relation_field: &str,
    ) -> Result<Vec<Entity>, ResolverError> {
        let entity = self.resolve_instance(context, id).await?;
        let targets = self.targets_for(&entity, subject);
        let owner = targets.is_owner();
        self.check_access(&entity, &targets, owner)?;

        let plan = curia_core::QueryPlan::new(self.config.max_page_size, 0);
        self.storage
            .resolve_relation(&self.model.name, id, relation_field, &plan)
            .await
            .map_err(ResolverError::from)
    }

    /// `create()`.
    pub async fn create(&self, subject: Option<&Subject>) -> Result<Entity, ResolverError> {
        let targets = match subject {
            Some(subject) => TargetSet::for_subject(subject.is_administrator, false),
            None => TargetSet::anonymous(),
        };
        let create_match = self.acl.evaluate(&targets, Action::Create, None);
        self.trace(None, Action::Create, &targets, false, &create_match);
        if !create_match.allow {
            return Err(ResolverError::authorization("create denied"));
        }

        let now = chrono::Utc::now();
        let mut entity = Entity::new(EntityId::generate(), now);

        if let Some(subject) = subject {
            for owner in &self.introspection.owners {
                if let Some(field) = &owner.field {
                    entity.set(field, JsonValue::String(subject.id.to_string()));
                }
            }
        }

        for element in &self.model.elements {
            let Some(field) = &element.field else { continue };
            if entity.get(field).is_some() {
                continue;
            }
            if let Some(default) = &element.default {
                let value = match default {
                    ElementDefault::Enum { name, key } => self.model.resolve_enum(name, key),
                    ElementDefault::Literal(value) => Some(value.clone()),
                };
                if let Some(value) = value {
                    entity.set(field, value);
                }
            }
        }

        let entity = self.storage.create(&self.model.name, entity).await.map_err(ResolverError::from)?;

        if let Some(process_key) = &self.model.process_key {
            let state_variables = marshal_variables(
                self.introspection
                    .state_fields
                    .iter()
                    .filter_map(|s| s.field.as_ref())
                    .filter_map(|field| entity.get(field).map(|v| (field.clone(), v.clone()))),
            );
            self.workflow
                .start_process(process_key, &entity.id.to_string(), None, Some(state_variables))
                .await
                .map_err(ResolverError::from)?;
        }

        self.pubsub
            .publish(
                &format!("{}.created", self.model.name),
                serde_json::json!({ format!("created{}", self.model.name): entity.id.to_string() }),
            )
            .await;

        Ok(entity)
    }

    /// `update(id, ...fields)`.
    pub async fn update(
        &self,
        context: &RequestContext,
        subject: Option<&Subject>,
        id: EntityId,
        input: UpdateInput,
    ) -> Result<Entity, ResolverError> {
        let mut entity = self.resolve_instance(context, id).await?;
        let targets = self.targets_for(&entity, subject);
        let owner = targets.is_owner();
        self.check_access(&entity, &targets, owner)?;

        let write_match = self.acl.evaluate(&targets, Action::Write, Some(&entity));
        self.trace(Some(id), Action::Write, &targets, owner, &write_match);
        if !write_match.allow {
            return Err(ResolverError::authorization("write denied"));
        }

        let allowed_write: std::collections::HashSet<&str> = match &write_match.allowed_fields {
            Some(fields) => {
                let restricted: std::collections::HashSet<&str> =
                    fields.iter().map(String::as_str).collect();
                self.introspection
                    .writable_fields
                    .iter()
                    .map(String::as_str)
                    .filter(|f| restricted.contains(f))
                    .collect()
            }
            None => self.introspection.writable_fields.iter().map(String::as_str).collect(),
        };

        let offending: Vec<String> = input
            .fields
            .keys()
            .filter(|field| !allowed_write.contains(field.as_str()))
            .cloned()
            .collect();
        if !offending.is_empty() {
            return Err(ResolverError::authorization_fields(
                "update touched fields outside the write-allowed set",
                offending,
            ));
        }

        for (field, value) in input.fields {
            entity.set(&field, value);
        }
        entity.touch(chrono::Utc::now());

        let fields: JsonMap<String, JsonValue> = entity.fields.clone().into_iter().collect();
        let entity = self.storage.update(&self.model.name, id, fields).await.map_err(ResolverError::from)?;
        context.invalidate(self.resolver_id, id);
        context.memoize(self.resolver_id, entity.clone());

        self.pubsub
            .publish(
                &format!("{}.updated", self.model.name),
                serde_json::json!({ format!("modified{}", self.model.name): entity.id.to_string() }),
            )
            .await;

        Ok(entity)
    }

    /// `destroy(id, state?)`.
    pub async fn destroy(
        &self,
        context: &RequestContext,
        subject: Option<&Subject>,
        id: EntityId,
        input: DestroyInput,
    ) -> Result<bool, ResolverError> {
        let mut entity = self.resolve_instance(context, id).await?;
        let targets = self.targets_for(&entity, subject);
        let owner = targets.is_owner();
        self.check_access(&entity, &targets, owner)?;

        let destroy_match = self.acl.evaluate(&targets, Action::Destroy, Some(&entity));
        self.trace(Some(id), Action::Destroy, &targets, owner, &destroy_match);
        if !destroy_match.allow {
            return Err(ResolverError::authorization("destroy denied"));
        }

        // State updates are exempt from the write ACL at this terminal
        // transition; non-state keys in `input.state` are silently dropped
        // (decision recorded in DESIGN.md).
        let mut changed = false;
        for (field, value) in input.state {
            if self.introspection.state_fields.iter().any(|s| s.field.as_deref() == Some(field.as_str())) {
                entity.set(&field, value);
                changed = true;
            }
        }

        if changed {
            entity.touch(chrono::Utc::now());
            let fields: JsonMap<String, JsonValue> = entity.fields.clone().into_iter().collect();
            entity = self.storage.update(&self.model.name, id, fields).await.map_err(ResolverError::from)?;
        }
        context.invalidate(self.resolver_id, id);

        // Business key equals the entity id by construction; the delete is
        // idempotent regardless.
        self.workflow
            .delete_process_instance(&entity.id.to_string())
            .await
            .map_err(ResolverError::from)?;

        self.pubsub
            .publish(
                &format!("{}.updated", self.model.name),
                serde_json::json!({ format!("modified{}", self.model.name): entity.id.to_string() }),
            )
            .await;

        Ok(true)
    }

    /// `restart(id)`: resumes an existing entity's process from a given
    /// activity.
    pub async fn restart(
        &self,
        context: &RequestContext,
        subject: Option<&Subject>,
        id: EntityId,
        input: RestartInput,
    ) -> Result<(), ResolverError> {
        let entity = self.resolve_instance(context, id).await?;
        let targets = self.targets_for(&entity, subject);
        let owner = targets.is_owner();
        self.check_access(&entity, &targets, owner)?;

        let Some(process_key) = &self.model.process_key else {
            return Err(ResolverError::Logic("model has no processKey to restart".to_string()));
        };

        let start_instructions = input.activity_id.map(|activity_id| {
            serde_json::json!([{ "type": "startAfterActivity", "activityId": activity_id }])
        });
        let variables = marshal_variables(
            self.introspection
                .state_fields
                .iter()
                .filter_map(|s| s.field.as_ref())
                .filter_map(|field| entity.get(field).map(|v| (field.clone(), v.clone()))),
        );

        self.workflow
            .start_process(process_key, &entity.id.to_string(), start_instructions, Some(variables))
            .await
            .map_err(ResolverError::from)?;

        self.pubsub
            .publish(
                &format!("{}.updated", self.model.name),
                serde_json::json!({ format!("modified{}", self.model.name): entity.id.to_string() }),
            )
            .await;

        Ok(())
    }

    /// `getTasks(id)`.
    pub async fn get_tasks(
        &self,
        context: &RequestContext,
        subject: Option<&Subject>,
        id: EntityId,
    ) -> Result<GetTasksResult, ResolverError> {
        let entity = self.resolve_instance(context, id).await?;
        let targets = self.targets_for(&entity, subject);
        let owner = targets.is_owner();

        let task_match = self.acl.evaluate(&targets, Action::Task, Some(&entity));
        self.trace(Some(id), Action::Task, &targets, owner, &task_match);
        if !task_match.allow {
            return Err(ResolverError::authorization("task listing denied"));
        }

        let tasks = self.workflow.list_tasks(&entity.id.to_string()).await.map_err(ResolverError::from)?;
        let tasks = match &task_match.allowed_tasks {
            Some(allowed) => tasks
                .into_iter()
                .filter(|t| t.task_definition_key.as_deref().is_some_and(|key| allowed.iter().any(|a| a == key)))
                .collect(),
            None => tasks,
        };

        Ok(GetTasksResult { tasks })
    }

    /// `completeTask(id, taskId, form, outcome, state?)`.
    pub async fn complete_task(
        &self,
        subject: Option<Subject>,
        input: CompleteTaskInput,
    ) -> Result<TaskCompletionOutcome, ResolverError> {
        run_complete_task(
            TaskCompletionDeps {
                model: &self.model,
                introspection: &self.introspection,
                storage: self.storage.as_ref(),
                workflow: self.workflow.as_ref(),
                acl: self.acl.as_ref(),
                pubsub: self.pubsub.as_ref(),
                validations: self.validations.as_ref(),
                trace_sink: self.trace_sink.as_ref(),
                acl_trace_enabled: self.config.acl_trace_enabled,
            },
            input,
            subject,
        )
        .await
    }
}

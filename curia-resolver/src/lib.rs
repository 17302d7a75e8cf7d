//! curia-resolver - the generic, model-driven Instance Resolver
//!
//! Given a declarative `ModelDefinition` and an `AclEvaluator` policy,
//! produces consistent implementations of CRUD, listing, relation
//! traversal, and workflow-task completion for every instance type in the
//! system, without per-entity-type generated code.

mod authz;
mod cache;
mod introspect;
mod lifecycle;
mod planner;
mod pubsub;
mod task_completion;

pub use authz::{project_entity, ProjectedEntity};
pub use cache::RequestContext;
pub use introspect::ModelIntrospection;
pub use lifecycle::{
    DestroyInput, GetTasksResult, InstanceResolver, ListResult, PageInfo, RestartInput,
    UpdateInput,
};
pub use planner::{plan_query, ListArgs};
pub use pubsub::{BroadcastPubSub, PubSub, PubSubEvent};
pub use task_completion::{
    CompleteTaskInput, NoValidations, Subject, TaskCompletionDeps, TaskCompletionOutcome,
    ValidationRegistry, ValidationSet,
};

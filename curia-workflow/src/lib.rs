//! The BPM workflow bridge: process start/cancel, task listing, and task
//! completion, behind one pluggable `WorkflowClient` trait. One
//! `#[async_trait]` interface per collaborator, with a `reqwest`-based REST
//! client for the optional HTTP implementation.

use async_trait::async_trait;
use curia_core::ResolverError;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use thiserror::Error;

#[cfg(feature = "http")]
pub mod http;

/// All BPM call failures collapse into this single opaque variant at the
/// trait boundary; the detail is for the crate's own logging only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("business engine error")]
pub struct WorkflowError {
    pub detail: String,
}

impl WorkflowError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

impl From<WorkflowError> for ResolverError {
    fn from(err: WorkflowError) -> Self {
        ResolverError::Engine(err.detail)
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// One task returned by `list_tasks`, in the order the engine reports them.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSummary {
    pub id: String,
    pub name: Option<String>,
    pub process_instance_id: String,
    pub form_key: Option<String>,
    /// The BPM engine's task-definition key, matched against a model's
    /// `allowedTasks`.
    pub task_definition_key: Option<String>,
}

/// The four BPM operations the task-completion and lifecycle code paths
/// require.
#[async_trait]
pub trait WorkflowClient: Send + Sync {
    /// Start a process keyed by `process_definition_key`, correlated to the
    /// entity via `business_key` (the entity id).
    async fn start_process(
        &self,
        process_definition_key: &str,
        business_key: &str,
        start_instructions: Option<JsonValue>,
        variables: Option<BTreeMap<String, JsonValue>>,
    ) -> WorkflowResult<()>;

    /// List tasks for the process instance correlated to `business_key`.
    async fn list_tasks(&self, business_key: &str) -> WorkflowResult<Vec<TaskSummary>>;

    /// Cancel the process instance for `business_key`. Idempotent: calling
    /// this on an already-deleted or never-started instance is not an
    /// error.
    async fn delete_process_instance(&self, business_key: &str) -> WorkflowResult<()>;

    /// Mark `task_id` done with the given variables.
    async fn complete_task(
        &self,
        task_id: &str,
        variables: BTreeMap<String, JsonValue>,
    ) -> WorkflowResult<()>;
}

/// Marshal state-field values into BPM task/process variables: only
/// string, number, and `null` survive; every other JSON type (array,
/// object, bool) is silently dropped.
pub fn marshal_variables(
    fields: impl IntoIterator<Item = (String, JsonValue)>,
) -> BTreeMap<String, JsonValue> {
    fields
        .into_iter()
        .filter(|(_, value)| {
            matches!(
                value,
                JsonValue::String(_) | JsonValue::Number(_) | JsonValue::Null
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marshal_variables_drops_arrays_and_objects() {
        let fields = vec![
            ("title".to_string(), JsonValue::String("hello".into())),
            ("score".to_string(), JsonValue::from(42)),
            ("archivedAt".to_string(), JsonValue::Null),
            ("tags".to_string(), JsonValue::Array(vec![JsonValue::from(1)])),
            (
                "meta".to_string(),
                JsonValue::Object(serde_json::Map::new()),
            ),
            ("flagged".to_string(), JsonValue::Bool(true)),
        ];

        let marshaled = marshal_variables(fields);
        assert_eq!(marshaled.len(), 3);
        assert!(marshaled.contains_key("title"));
        assert!(marshaled.contains_key("score"));
        assert!(marshaled.contains_key("archivedAt"));
        assert!(!marshaled.contains_key("tags"));
        assert!(!marshaled.contains_key("meta"));
        assert!(!marshaled.contains_key("flagged"));
    }
}

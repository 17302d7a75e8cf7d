//! An in-memory `WorkflowClient` mock: `start_process` seeds a task list
//! for the business key, `complete_task` just records which task ids were
//! completed so tests can assert on them.

use async_trait::async_trait;
use curia_workflow::{TaskSummary, WorkflowClient, WorkflowResult};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemoryWorkflowClient {
    tasks_by_business_key: Mutex<HashMap<String, Vec<TaskSummary>>>,
    completed_task_ids: Mutex<Vec<String>>,
    started_business_keys: Mutex<Vec<String>>,
}

impl InMemoryWorkflowClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the task list a subsequent `list_tasks(business_key)` call
    /// will return, as if the BPM engine had already created these tasks
    /// after `start_process`.
    pub fn seed_tasks(&self, business_key: &str, tasks: Vec<TaskSummary>) {
        self.tasks_by_business_key.lock().unwrap().insert(business_key.to_string(), tasks);
    }

    pub fn completed_task_ids(&self) -> Vec<String> {
        self.completed_task_ids.lock().unwrap().clone()
    }

    pub fn started_business_keys(&self) -> Vec<String> {
        self.started_business_keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowClient for InMemoryWorkflowClient {
    async fn start_process(
        &self,
        _process_definition_key: &str,
        business_key: &str,
        _start_instructions: Option<JsonValue>,
        _variables: Option<BTreeMap<String, JsonValue>>,
    ) -> WorkflowResult<()> {
        self.started_business_keys.lock().unwrap().push(business_key.to_string());
        self.tasks_by_business_key
            .lock()
            .unwrap()
            .entry(business_key.to_string())
            .or_default();
        Ok(())
    }

    async fn list_tasks(&self, business_key: &str) -> WorkflowResult<Vec<TaskSummary>> {
        Ok(self
            .tasks_by_business_key
            .lock()
            .unwrap()
            .get(business_key)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_process_instance(&self, business_key: &str) -> WorkflowResult<()> {
        let mut tasks = self.tasks_by_business_key.lock().unwrap();
        let matching_key = tasks
            .keys()
            .find(|key| key.eq_ignore_ascii_case(business_key))
            .cloned();
        if let Some(key) = matching_key {
            tasks.remove(&key);
        }
        Ok(())
    }

    async fn complete_task(&self, task_id: &str, _variables: BTreeMap<String, JsonValue>) -> WorkflowResult<()> {
        self.completed_task_ids.lock().unwrap().push(task_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_tasks_are_returned_by_list_tasks() {
        let client = InMemoryWorkflowClient::new();
        client.seed_tasks(
            "biz-key",
            vec![TaskSummary {
                id: "task-1".to_string(),
                name: Some("Review".to_string()),
                process_instance_id: "proc-1".to_string(),
                form_key: Some("curate".to_string()),
                task_definition_key: Some("review".to_string()),
            }],
        );

        let tasks = client.list_tasks("biz-key").await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "task-1");
    }

    #[tokio::test]
    async fn complete_task_records_the_task_id() {
        let client = InMemoryWorkflowClient::new();
        client.complete_task("task-1", BTreeMap::new()).await.unwrap();
        assert_eq!(client.completed_task_ids(), vec!["task-1".to_string()]);
    }

    #[tokio::test]
    async fn delete_process_instance_matches_business_key_case_insensitively() {
        let client = InMemoryWorkflowClient::new();
        client.seed_tasks(
            "Biz-Key-ABC",
            vec![TaskSummary {
                id: "task-1".to_string(),
                name: None,
                process_instance_id: "proc-1".to_string(),
                form_key: None,
                task_definition_key: None,
            }],
        );

        client.delete_process_instance("biz-key-abc").await.unwrap();

        assert!(!client
            .tasks_by_business_key
            .lock()
            .unwrap()
            .contains_key("Biz-Key-ABC"));
    }
}

//! A `reqwest`-backed `WorkflowClient`: one `reqwest::Client`, a base URL,
//! and one thin method per remote operation. Feature-gated behind `http` so
//! the resolver core never has to depend on `reqwest`.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::{TaskSummary, WorkflowClient, WorkflowError, WorkflowResult};

/// Connection settings for the HTTP-backed BPM client.
#[derive(Debug, Clone)]
pub struct HttpWorkflowConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl HttpWorkflowConfig {
    /// Build from environment variables.
    ///
    /// - `WORKFLOW_BASE_URL`: BPM engine REST base URL (required)
    /// - `WORKFLOW_REQUEST_TIMEOUT_MS`: request timeout in ms (default: 5000)
    pub fn from_env() -> Result<Self, curia_core::ConfigError> {
        let base_url = std::env::var("WORKFLOW_BASE_URL").map_err(|_| {
            curia_core::ConfigError::MissingRequired {
                field: "WORKFLOW_BASE_URL".to_string(),
            }
        })?;

        let timeout_ms = std::env::var("WORKFLOW_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5_000);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

pub struct HttpWorkflowClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpWorkflowClient {
    pub fn new(config: HttpWorkflowConfig) -> Result<Self, WorkflowError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WorkflowError::new(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }
}

#[async_trait]
impl WorkflowClient for HttpWorkflowClient {
    async fn start_process(
        &self,
        process_definition_key: &str,
        business_key: &str,
        start_instructions: Option<JsonValue>,
        variables: Option<BTreeMap<String, JsonValue>>,
    ) -> WorkflowResult<()> {
        let url = format!(
            "{}/process-definition/key/{}/start",
            self.base_url, process_definition_key
        );
        let body = json!({
            "businessKey": business_key,
            "startInstructions": start_instructions,
            "variables": variables.unwrap_or_default(),
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| WorkflowError::new(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WorkflowError::new(format!(
                "startProcess failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn list_tasks(&self, business_key: &str) -> WorkflowResult<Vec<TaskSummary>> {
        let url = format!("{}/task", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("processInstanceBusinessKey", business_key)])
            .send()
            .await
            .map_err(|e| WorkflowError::new(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WorkflowError::new(format!(
                "listTasks failed with status {}",
                response.status()
            )));
        }

        #[derive(serde::Deserialize)]
        struct RawTask {
            id: String,
            name: Option<String>,
            #[serde(rename = "processInstanceId")]
            process_instance_id: String,
            #[serde(rename = "formKey")]
            form_key: Option<String>,
            #[serde(rename = "taskDefinitionKey")]
            task_definition_key: Option<String>,
        }

        let raw: Vec<RawTask> = response
            .json()
            .await
            .map_err(|e| WorkflowError::new(e.to_string()))?;

        Ok(raw
            .into_iter()
            .map(|t| TaskSummary {
                id: t.id,
                name: t.name,
                process_instance_id: t.process_instance_id,
                form_key: t.form_key,
                task_definition_key: t.task_definition_key,
            })
            .collect())
    }

    async fn delete_process_instance(&self, business_key: &str) -> WorkflowResult<()> {
        // `processInstanceBusinessKey` is matched case-insensitively by the
        // engine itself, so the literal key is passed through unmodified.
        let tasks = self.list_tasks(business_key).await?;
        let Some(task) = tasks.first() else {
            // Idempotent: nothing to cancel is success, not an error.
            return Ok(());
        };

        let url = format!("{}/process-instance/{}", self.base_url, task.process_instance_id);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| WorkflowError::new(e.to_string()))?;

        if response.status().is_success() || response.status().as_u16() == 404 {
            Ok(())
        } else {
            Err(WorkflowError::new(format!(
                "deleteProcessInstance failed with status {}",
                response.status()
            )))
        }
    }

    async fn complete_task(
        &self,
        task_id: &str,
        variables: BTreeMap<String, JsonValue>,
    ) -> WorkflowResult<()> {
        let url = format!("{}/task/{}/complete", self.base_url, task_id);
        let wrapped: BTreeMap<String, JsonValue> = variables
            .into_iter()
            .map(|(key, value)| (key, json!({ "value": value })))
            .collect();
        let body = json!({ "variables": wrapped });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| WorkflowError::new(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WorkflowError::new(format!(
                "completeTask failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

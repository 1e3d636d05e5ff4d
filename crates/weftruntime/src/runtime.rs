use crate::executor::{ExecutionResult, RunOptions, WorkflowExecutor};
use crate::sink::LogSink;
use crate::validator;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use weftcore::{NodeRegistry, Value, WorkflowDsl, WorkflowError};

/// Configuration for the runtime
#[derive(Clone, Default)]
pub struct RuntimeConfig {
    /// Cancel runs that exceed this duration
    pub execution_timeout: Option<Duration>,
    /// Sink used when a run's options do not name one
    pub log_sink: Option<Arc<dyn LogSink>>,
}

impl RuntimeConfig {
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }
}

/// Main entry point for validating and executing workflows
pub struct FlowRuntime {
    executor: Arc<WorkflowExecutor>,
    config: RuntimeConfig,
    workflows: Arc<RwLock<HashMap<String, WorkflowDsl>>>,
}

impl FlowRuntime {
    /// Create a new runtime with a pre-configured registry
    pub fn with_registry(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        Self {
            executor: Arc::new(WorkflowExecutor::new(registry)),
            config,
            workflows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        self.executor.registry()
    }

    pub fn validate(&self, workflow: &WorkflowDsl) -> Vec<String> {
        validator::validate(workflow, self.registry())
    }

    /// Register a workflow under its `meta.id`
    pub async fn register_workflow(&self, workflow: WorkflowDsl) -> Result<String, WorkflowError> {
        let id = workflow
            .meta
            .id
            .clone()
            .ok_or_else(|| WorkflowError::Invalid("workflow has no meta.id".to_string()))?;
        let mut workflows = self.workflows.write().await;
        workflows.insert(id.clone(), workflow);
        Ok(id)
    }

    /// Execute a registered workflow by id
    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        inputs: Value,
        secrets: HashMap<String, String>,
        options: RunOptions,
    ) -> ExecutionResult {
        let workflow = self.workflows.read().await.get(workflow_id).cloned();
        match workflow {
            Some(workflow) => self.execute(&workflow, inputs, secrets, options).await,
            None => ExecutionResult::rejected(WorkflowError::NotFound(workflow_id.to_string()).to_string()),
        }
    }

    /// Execute a workflow directly (without registration).
    ///
    /// The configured execution timeout and log sink apply unless the
    /// options already carry their own.
    pub async fn execute(
        &self,
        workflow: &WorkflowDsl,
        inputs: Value,
        secrets: HashMap<String, String>,
        mut options: RunOptions,
    ) -> ExecutionResult {
        if options.log_sink.is_none() {
            options.log_sink = self.config.log_sink.clone();
        }
        if options.timeout.is_none() {
            options.timeout = self.config.execution_timeout;
        }

        self.executor
            .run_workflow(workflow, inputs, secrets, options)
            .await
    }
}

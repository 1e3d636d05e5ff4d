use crate::resolver::{build_execution_order, resolve_node_inputs, resolve_params};
use crate::sink::LogSink;
use crate::state::ExecutionState;
use crate::validator;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use weftcore::{
    ExecutionId, LogEntry, NodeContext, NodeError, NodeOutput, NodeRegistry, ResolveError, Value,
    WorkflowDsl, WorkflowError, WorkflowNode,
};

/// How long a single log sink write may take before it is abandoned
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle notification: `(node_id, node_type)`
pub type NodeCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Per-run collaborators and hooks
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Correlation id passed to the log sink; defaults to `meta.id`
    pub workflow_id: Option<String>,
    pub log_sink: Option<Arc<dyn LogSink>>,
    pub on_node_start: Option<NodeCallback>,
    pub on_node_complete: Option<NodeCallback>,
    /// Caller-owned token; a fresh one is created when absent
    pub cancellation: Option<CancellationToken>,
    /// Cancel the run once this much time has passed
    pub timeout: Option<Duration>,
    /// Upper bound on each sink write; [`DEFAULT_SINK_TIMEOUT`] when absent
    pub sink_timeout: Option<Duration>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn on_node_start(mut self, callback: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.on_node_start = Some(Arc::new(callback));
        self
    }

    pub fn on_node_complete(
        mut self,
        callback: impl Fn(&str, &str) + Send + Sync + 'static,
    ) -> Self {
        self.on_node_complete = Some(Arc::new(callback));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_sink_timeout(mut self, timeout: Duration) -> Self {
        self.sink_timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Error,
}

/// Result of workflow execution
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    /// Outputs of every node that completed, including before a failure
    pub outputs: HashMap<String, HashMap<String, Value>>,
    pub execution_id: ExecutionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogEntry>,
}

impl ExecutionResult {
    pub(crate) fn rejected(message: String) -> Self {
        Self {
            status: ExecutionStatus::Error,
            outputs: HashMap::new(),
            execution_id: ExecutionId::new_v4(),
            error: Some(message),
            logs: Vec::new(),
        }
    }

    fn from_state(state: ExecutionState) -> Self {
        let logs = state.log_entries();
        let status = if state.error.is_some() {
            ExecutionStatus::Error
        } else {
            ExecutionStatus::Success
        };
        Self {
            status,
            outputs: state.outputs,
            execution_id: state.execution_id,
            error: state.error,
            logs,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Value a node emitted on one of its output handles
    pub fn output(&self, node_id: &str, handle: &str) -> Option<&Value> {
        self.outputs.get(node_id).and_then(|o| o.get(handle))
    }
}

#[derive(Debug, Error)]
enum NodeFailure {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Node(#[from] NodeError),
}

/// Runs workflows one node at a time in topological order
pub struct WorkflowExecutor {
    registry: Arc<NodeRegistry>,
}

impl WorkflowExecutor {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Execute a workflow and return its result.
    ///
    /// Never fails: validation, resolution and node errors all end up in
    /// [`ExecutionResult::error`].
    #[instrument(skip_all, fields(workflow = %workflow.meta.name))]
    pub async fn run_workflow(
        &self,
        workflow: &WorkflowDsl,
        inputs: Value,
        secrets: HashMap<String, String>,
        options: RunOptions,
    ) -> ExecutionResult {
        let errors = validator::validate(workflow, &self.registry);
        if !errors.is_empty() {
            error!("Workflow failed validation: {:?}", errors);
            return ExecutionResult::rejected(errors.join("; "));
        }

        let order = match build_execution_order(&workflow.nodes, &workflow.edges) {
            Ok(order) => order,
            Err(e) => return ExecutionResult::rejected(e.to_string()),
        };

        let mut state = ExecutionState::new(inputs, secrets);
        let cancellation = options.cancellation.clone().unwrap_or_default();
        let workflow_id = options
            .workflow_id
            .clone()
            .or_else(|| workflow.meta.id.clone())
            .unwrap_or_default();
        let start_time = Instant::now();
        let timed_out = Arc::new(AtomicBool::new(false));
        let timer = options
            .timeout
            .map(|after| spawn_deadline(after, cancellation.clone(), timed_out.clone()));

        info!(
            execution_id = %state.execution_id,
            "Starting workflow execution with {} nodes: {:?}",
            order.len(),
            order
        );

        for node_id in &order {
            let Some(node) = workflow.find_node(node_id) else {
                state.error = Some(WorkflowError::NodeNotFound(node_id.clone()).to_string());
                break;
            };

            if let Some(callback) = &options.on_node_start {
                callback(&node.id, &node.node_type);
            }

            let node_start = Instant::now();
            let result = self.execute_node(node, workflow, &state, &cancellation).await;
            let duration_ms = node_start.elapsed().as_millis() as u64;
            let logs = serde_json::to_value(state.node_log_entries(&node.id)).unwrap_or_default();

            match result {
                Ok(output) => {
                    info!("Node {} completed in {}ms", node.id, duration_ms);
                    let record = json!({
                        "status": "success",
                        "nodeType": node.node_type,
                        "durationMs": duration_ms,
                        "logs": logs,
                        "outputs": serde_json::to_value(&output.outputs).unwrap_or_default(),
                    });
                    state.merge_outputs(&node.id, output.outputs);
                    if let Some(callback) = &options.on_node_complete {
                        callback(&node.id, &node.node_type);
                    }
                    write_record(&options, &workflow_id, &state, &node.id, record, &cancellation)
                        .await;
                }
                Err(e) => {
                    let e = match (e, options.timeout) {
                        (NodeFailure::Node(NodeError::Cancelled), Some(after))
                            if timed_out.load(Ordering::SeqCst) =>
                        {
                            NodeFailure::Node(NodeError::Timeout {
                                millis: after.as_millis() as u64,
                            })
                        }
                        (e, _) => e,
                    };
                    error!("Node {} failed: {}", node.id, e);
                    let record = json!({
                        "status": "error",
                        "nodeType": node.node_type,
                        "durationMs": duration_ms,
                        "logs": logs,
                        "error": e.to_string(),
                    });
                    state.error = Some(format!("Node {} failed: {}", node.id, e));
                    write_record(&options, &workflow_id, &state, &node.id, record, &cancellation)
                        .await;
                    break;
                }
            }
        }

        if let Some(timer) = timer {
            timer.abort();
        }

        info!(
            execution_id = %state.execution_id,
            success = state.error.is_none(),
            "Workflow finished in {}ms",
            start_time.elapsed().as_millis()
        );

        ExecutionResult::from_state(state)
    }

    async fn execute_node(
        &self,
        node: &WorkflowNode,
        workflow: &WorkflowDsl,
        state: &ExecutionState,
        cancellation: &CancellationToken,
    ) -> Result<NodeOutput, NodeFailure> {
        let params = resolve_params(&node.params, state)?;
        let inputs = resolve_node_inputs(node, &workflow.edges, state);

        let definition = self
            .registry
            .get(&node.node_type)
            .ok_or_else(|| WorkflowError::UnknownNodeType(node.node_type.clone()))?;

        if cancellation.is_cancelled() {
            return Err(NodeError::Cancelled.into());
        }

        let ctx = NodeContext {
            node_id: node.id.clone(),
            inputs,
            params,
            workflow_inputs: state.inputs.clone(),
            logger: state.logger_for(&node.id),
            cancellation: cancellation.clone(),
        };

        let output = tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(NodeError::Cancelled),
            result = definition.execute(ctx) => result,
        }?;

        Ok(output)
    }
}

fn spawn_deadline(
    after: Duration,
    cancellation: CancellationToken,
    timed_out: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(after) => {
                warn!("Execution exceeded {:?}, cancelling", after);
                timed_out.store(true, Ordering::SeqCst);
                cancellation.cancel();
            }
            _ = cancellation.cancelled() => {}
        }
    })
}

/// Hand one record to the sink without letting it stall the run.
///
/// The write is abandoned when it outlives the sink timeout, or when the run
/// is cancelled while it is still pending.
async fn write_record(
    options: &RunOptions,
    workflow_id: &str,
    state: &ExecutionState,
    node_id: &str,
    record: serde_json::Value,
    cancellation: &CancellationToken,
) {
    let Some(sink) = &options.log_sink else {
        return;
    };
    let limit = options.sink_timeout.unwrap_or(DEFAULT_SINK_TIMEOUT);
    let write = sink.write_log(workflow_id, state.execution_id, node_id, record);

    tokio::select! {
        biased;
        outcome = tokio::time::timeout(limit, write) => match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Log sink rejected record for node {}: {}", node_id, e),
            Err(_) => warn!("Log sink timed out after {:?} on node {}", limit, node_id),
        },
        _ = cancellation.cancelled() => {
            warn!("Run cancelled while the log sink was writing node {}", node_id);
        }
    }
}

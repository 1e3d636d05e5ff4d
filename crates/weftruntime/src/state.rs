use std::collections::HashMap;
use std::sync::Arc;
use weftcore::{ExecutionId, LogBuffer, LogEntry, NodeLogger, Value};

/// Run-scoped accumulator of node outputs, inputs, secrets and logs.
///
/// Owned by exactly one execution and dropped when it finishes.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub execution_id: ExecutionId,
    /// Output maps of completed nodes, keyed by node id
    pub outputs: HashMap<String, HashMap<String, Value>>,
    pub inputs: Arc<Value>,
    pub secrets: HashMap<String, String>,
    pub logs: LogBuffer,
    pub error: Option<String>,
}

impl ExecutionState {
    pub fn new(inputs: Value, secrets: HashMap<String, String>) -> Self {
        Self {
            execution_id: ExecutionId::new_v4(),
            outputs: HashMap::new(),
            inputs: Arc::new(inputs),
            secrets,
            logs: LogBuffer::default(),
            error: None,
        }
    }

    /// Logger that appends to this run's log buffer
    pub fn logger_for(&self, node_id: &str) -> NodeLogger {
        NodeLogger::new(self.execution_id, node_id, self.logs.clone())
    }

    pub fn merge_outputs(&mut self, node_id: &str, outputs: HashMap<String, Value>) {
        self.outputs
            .entry(node_id.to_string())
            .or_default()
            .extend(outputs);
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.logs
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn node_log_entries(&self, node_id: &str) -> Vec<LogEntry> {
        self.log_entries()
            .into_iter()
            .filter(|e| e.node_id == node_id)
            .collect()
    }
}

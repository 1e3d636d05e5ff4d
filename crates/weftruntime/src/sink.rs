use async_trait::async_trait;
use serde::Serialize;
use std::sync::Mutex;
use weftcore::{ExecutionId, FlowError};

/// Durable destination for per-node execution records.
///
/// The executor calls this once for every node it runs. Failures are logged
/// and never affect the run.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn write_log(
        &self,
        workflow_id: &str,
        execution_id: ExecutionId,
        node_id: &str,
        data: serde_json::Value,
    ) -> weftcore::Result<()>;
}

/// A record captured by [`MemoryLogSink`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkRecord {
    pub workflow_id: String,
    pub execution_id: ExecutionId,
    pub node_id: String,
    pub data: serde_json::Value,
}

/// Keeps every record in memory
#[derive(Default)]
pub struct MemoryLogSink {
    records: Mutex<Vec<SinkRecord>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SinkRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn write_log(
        &self,
        workflow_id: &str,
        execution_id: ExecutionId,
        node_id: &str,
        data: serde_json::Value,
    ) -> weftcore::Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| FlowError::Sink("memory sink lock poisoned".to_string()))?;
        records.push(SinkRecord {
            workflow_id: workflow_id.to_string(),
            execution_id,
            node_id: node_id.to_string(),
            data,
        });
        Ok(())
    }
}

/// Writes records as `tracing` events under the `weft::sink` target
pub struct TracingLogSink;

#[async_trait]
impl LogSink for TracingLogSink {
    async fn write_log(
        &self,
        workflow_id: &str,
        execution_id: ExecutionId,
        node_id: &str,
        data: serde_json::Value,
    ) -> weftcore::Result<()> {
        let line = serde_json::to_string(&data)?;
        tracing::info!(
            target: "weft::sink",
            workflow_id,
            %execution_id,
            node_id,
            "{}",
            line
        );
        Ok(())
    }
}

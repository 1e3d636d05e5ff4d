//! Core abstractions for the weft workflow engine
//!
//! This crate provides the workflow document model, the dynamic `Value`
//! type, the `Node` capability trait and the node registry. Nothing here
//! spawns tasks; cancellation is a `tokio-util` token the caller owns.

mod dsl;
mod error;
mod log;
mod node;
mod registry;
mod value;

pub use dsl::{
    DataType, IoSchema, ParamValue, WorkflowDsl, WorkflowEdge, WorkflowMeta, WorkflowNode,
    WorkflowStatus, DSL_VERSION, WEBHOOK_PAYLOAD_KEY,
};
pub use error::{FlowError, NodeError, ResolveError, WorkflowError};
pub use log::{ExecutionId, LogBuffer, LogEntry, LogLevel, NodeLogger};
pub use node::{Node, NodeContext, NodeDescriptor, NodeOutput, ParamDescriptor, ParamKind};
pub use registry::NodeRegistry;
pub use value::Value;

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;

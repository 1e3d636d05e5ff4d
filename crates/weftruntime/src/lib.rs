//! Workflow execution runtime
//!
//! This crate provides the resolver, validator and executor that run a
//! workflow document against runtime inputs and secrets, plus the
//! `FlowRuntime` facade and log sinks.

mod executor;
pub mod resolver;
mod runtime;
mod sink;
mod state;
pub mod validator;

pub use executor::{
    ExecutionResult, ExecutionStatus, NodeCallback, RunOptions, WorkflowExecutor,
    DEFAULT_SINK_TIMEOUT,
};
pub use resolver::{
    build_execution_order, find_dependencies, find_dependent_nodes, has_cycle,
    resolve_node_inputs, resolve_params,
};
pub use runtime::{FlowRuntime, RuntimeConfig};
pub use sink::{LogSink, MemoryLogSink, SinkRecord, TracingLogSink};
pub use state::ExecutionState;
pub use validator::validate;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Log sink error: {0}")]
    Sink(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Missing required parameter: {0}")]
    MissingParam(String),

    #[error("Invalid type for '{field}': expected {expected}, got {actual}")]
    InvalidType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Cancelled")]
    Cancelled,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Invalid workflow: {0}")]
    Invalid(String),

    #[error("Workflow contains cycles")]
    CyclicDependency,

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),
}

/// Failures while turning `ParamValue`s into concrete values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("secret not found: {0}")]
    SecretNotFound(String),
}

use crate::{IoSchema, NodeError, NodeLogger, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Core trait that all executable node types implement
#[async_trait]
pub trait Node: Send + Sync {
    /// Unique type identifier (e.g., "text-input", "http-request")
    fn node_type(&self) -> &str;

    /// Catalog information: category, handles and parameter schema.
    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::new(self.node_type(), "general")
    }

    /// Execute the node with resolved inputs and parameters
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError>;
}

/// Execution context passed to each node
#[derive(Clone)]
pub struct NodeContext {
    /// Id of the node instance within the workflow
    pub node_id: String,

    /// Values delivered over incoming edges, keyed by target handle
    pub inputs: HashMap<String, Value>,

    /// Resolved parameters
    pub params: HashMap<String, Value>,

    /// The workflow's runtime inputs, read-only
    pub workflow_inputs: Arc<Value>,

    pub logger: NodeLogger,

    /// Shared by every node of the run
    pub cancellation: CancellationToken,
}

impl NodeContext {
    /// Context with no inputs or params, logging into a private buffer.
    pub fn new(node_id: impl Into<String>) -> Self {
        let node_id = node_id.into();
        Self {
            logger: NodeLogger::detached(node_id.clone()),
            node_id,
            inputs: HashMap::new(),
            params: HashMap::new(),
            workflow_inputs: Arc::new(Value::Null),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_workflow_inputs(mut self, inputs: Value) -> Self {
        self.workflow_inputs = Arc::new(inputs);
        self
    }

    /// Get required input or return error
    pub fn require_input(&self, name: &str) -> Result<&Value, NodeError> {
        self.inputs
            .get(name)
            .ok_or_else(|| NodeError::MissingInput(name.to_string()))
    }

    /// Get required parameter or return error
    pub fn require_param(&self, name: &str) -> Result<&Value, NodeError> {
        self.params
            .get(name)
            .ok_or_else(|| NodeError::MissingParam(name.to_string()))
    }

    pub fn require_param_str(&self, name: &str) -> Result<&str, NodeError> {
        let value = self.require_param(name)?;
        value.as_str().ok_or_else(|| NodeError::InvalidType {
            field: name.to_string(),
            expected: "string".to_string(),
            actual: value.type_name().to_string(),
        })
    }

    /// Get param with default
    pub fn get_param_or(&self, name: &str, default: Value) -> Value {
        self.params.get(name).cloned().unwrap_or(default)
    }

    /// Resolved input if connected, otherwise the param of the same name.
    pub fn input_or_param(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name).or_else(|| self.params.get(name))
    }
}

/// Output from node execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    /// Output handle values
    pub outputs: HashMap<String, Value>,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, handle: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(handle.into(), value.into());
        self
    }

    pub fn get(&self, handle: &str) -> Option<&Value> {
        self.outputs.get(handle)
    }
}

impl From<HashMap<String, Value>> for NodeOutput {
    fn from(outputs: HashMap<String, Value>) -> Self {
        Self { outputs }
    }
}

/// Catalog entry describing a node type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    pub id: String,
    pub category: String,
    pub description: String,
    pub inputs: BTreeMap<String, IoSchema>,
    pub outputs: BTreeMap<String, IoSchema>,
    /// Editor rendering hints; execution ignores these
    pub params_schema: BTreeMap<String, ParamDescriptor>,
}

impl NodeDescriptor {
    pub fn new(id: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            description: String::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            params_schema: BTreeMap::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn input(mut self, name: impl Into<String>, schema: IoSchema) -> Self {
        self.inputs.insert(name.into(), schema);
        self
    }

    pub fn output(mut self, name: impl Into<String>, schema: IoSchema) -> Self {
        self.outputs.insert(name.into(), schema);
        self
    }

    pub fn param(mut self, name: impl Into<String>, param: ParamDescriptor) -> Self {
        self.params_schema.insert(name.into(), param);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub label: String,
    pub kind: ParamKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamDescriptor {
    pub fn new(label: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            label: label.into(),
            kind,
            required: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Widget the editor should render for a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Text,
    Textarea,
    Number,
    Boolean,
    Secret,
    Json,
    Select(Vec<String>),
}

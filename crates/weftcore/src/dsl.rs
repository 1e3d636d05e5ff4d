use crate::{FlowError, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DSL_VERSION: &str = "1.0";

/// Runtime input key under which trigger payloads (webhooks) are seeded.
///
/// A caller that receives a webhook places the request as
/// `{ "__webhook__": { "body": .., "headers": .., "query": .. } }` in the
/// workflow inputs; `webhook-trigger` nodes read it from there.
pub const WEBHOOK_PAYLOAD_KEY: &str = "__webhook__";

/// Complete workflow document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDsl {
    #[serde(default = "default_dsl_version")]
    pub dsl_version: String,
    pub meta: WorkflowMeta,
    #[serde(default)]
    pub inputs: BTreeMap<String, IoSchema>,
    #[serde(default)]
    pub outputs: BTreeMap<String, IoSchema>,
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub edges: Vec<WorkflowEdge>,
}

fn default_dsl_version() -> String {
    DSL_VERSION.to_string()
}

impl WorkflowDsl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            dsl_version: default_dsl_version(),
            meta: WorkflowMeta {
                id: None,
                name: name.into(),
                version: "0.1.0".to_string(),
                status: WorkflowStatus::Draft,
            },
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            secrets: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, FlowError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.meta.id = Some(id.into());
        self
    }

    pub fn add_node(&mut self, node: WorkflowNode) -> String {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Connect `source.source_handle` to `target.target_handle`.
    pub fn connect(
        &mut self,
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) {
        let source = source.into();
        let target = target.into();
        let id = format!("e{}-{}-{}", self.edges.len() + 1, source, target);
        self.edges.push(WorkflowEdge {
            id,
            source,
            source_handle: source_handle.into(),
            target,
            target_handle: target_handle.into(),
        });
    }

    pub fn find_node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub status: WorkflowStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Published,
}

/// Node instance in a workflow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub inputs: BTreeMap<String, IoSchema>,
    #[serde(default)]
    pub outputs: BTreeMap<String, IoSchema>,
}

impl WorkflowNode {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            label: None,
            params: BTreeMap::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn with_static(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_param(name, ParamValue::Static { value: value.into() })
    }

    pub fn with_secret(self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.with_param(name, ParamValue::Secret { key: key.into() })
    }

    pub fn with_input(self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.with_param(name, ParamValue::Input { path: path.into() })
    }
}

/// Parameter value: a literal, a secret reference, or a workflow input path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamValue {
    Static { value: Value },
    Secret {
        #[serde(rename = "ref")]
        key: String,
    },
    Input { path: String },
}

/// Directed data-flow connection between two node handles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEdge {
    pub id: String,
    pub source: String,
    pub source_handle: String,
    pub target: String,
    pub target_handle: String,
}

/// Declared shape of an input or output handle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IoSchema {
    #[serde(rename = "type", default)]
    pub data_type: DataType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl IoSchema {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            required: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    #[default]
    Any,
}

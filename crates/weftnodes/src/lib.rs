//! Standard node library
//!
//! Collection of built-in nodes for common operations

mod control;
mod http;
mod input;
mod llm;
mod transform;

pub use control::{ConditionNode, DelayNode, LogNode};
pub use http::HttpRequestNode;
pub use input::{NumberInputNode, TextInputNode, WebhookTriggerNode};
pub use llm::LlmChatNode;
pub use transform::{JsonParseNode, JsonStringifyNode, TemplateNode};

use std::sync::Arc;
use weftcore::{NodeError, NodeRegistry, Value};

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut NodeRegistry) {
    registry.register(Arc::new(TextInputNode));
    registry.register(Arc::new(NumberInputNode));
    registry.register(Arc::new(WebhookTriggerNode));
    registry.register(Arc::new(TemplateNode));
    registry.register(Arc::new(JsonParseNode));
    registry.register(Arc::new(JsonStringifyNode));
    registry.register(Arc::new(ConditionNode));
    registry.register(Arc::new(DelayNode));
    registry.register(Arc::new(LogNode));
    registry.register(Arc::new(HttpRequestNode::new()));
    registry.register(Arc::new(LlmChatNode::new()));
}

/// Registry pre-populated with every standard node
pub fn standard_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    register_all(&mut registry);
    registry
}

pub(crate) fn invalid_type(field: &str, expected: &str, actual: &Value) -> NodeError {
    NodeError::InvalidType {
        field: field.to_string(),
        expected: expected.to_string(),
        actual: actual.type_name().to_string(),
    }
}

use crate::invalid_type;
use async_trait::async_trait;
use weftcore::{
    DataType, IoSchema, Node, NodeContext, NodeDescriptor, NodeError, NodeOutput, ParamDescriptor,
    ParamKind, Value, WEBHOOK_PAYLOAD_KEY,
};

/// Emits a configured string
pub struct TextInputNode;

#[async_trait]
impl Node for TextInputNode {
    fn node_type(&self) -> &str {
        "text-input"
    }

    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::new(self.node_type(), "input")
            .describe("Provide a text value")
            .output("value", IoSchema::new(DataType::String))
            .param("value", ParamDescriptor::new("Text", ParamKind::Textarea).default_value(""))
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let value = match ctx.get_param_or("value", Value::from("")) {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };

        Ok(NodeOutput::new().with_output("value", value))
    }
}

/// Emits a configured number
pub struct NumberInputNode;

#[async_trait]
impl Node for NumberInputNode {
    fn node_type(&self) -> &str {
        "number-input"
    }

    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::new(self.node_type(), "input")
            .describe("Provide a numeric value")
            .output("value", IoSchema::new(DataType::Number))
            .param("value", ParamDescriptor::new("Number", ParamKind::Number).default_value(0.0))
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let value = match ctx.get_param_or("value", Value::Number(0.0)) {
            Value::Number(n) => n,
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| invalid_type("value", "number", &Value::String(s)))?,
            other => return Err(invalid_type("value", "number", &other)),
        };

        Ok(NodeOutput::new().with_output("value", value))
    }
}

/// Exposes the webhook payload seeded under [`WEBHOOK_PAYLOAD_KEY`]
pub struct WebhookTriggerNode;

#[async_trait]
impl Node for WebhookTriggerNode {
    fn node_type(&self) -> &str {
        "webhook-trigger"
    }

    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::new(self.node_type(), "input")
            .describe("Start a workflow from an incoming webhook request")
            .output("payload", IoSchema::new(DataType::Object).describe("The full request"))
            .output("body", IoSchema::new(DataType::Any))
            .output("headers", IoSchema::new(DataType::Object))
            .output("query", IoSchema::new(DataType::Object))
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let payload = ctx
            .workflow_inputs
            .get(WEBHOOK_PAYLOAD_KEY)
            .cloned()
            .unwrap_or(Value::Null);

        if payload.is_null() {
            ctx.logger.warn("No webhook payload in workflow inputs");
        }

        let field = |name: &str| payload.get(name).cloned().unwrap_or(Value::Null);
        let body = field("body");
        let headers = field("headers");
        let query = field("query");

        Ok(NodeOutput::new()
            .with_output("body", body)
            .with_output("headers", headers)
            .with_output("query", query)
            .with_output("payload", payload))
    }
}

use crate::invalid_type;
use async_trait::async_trait;
use weftcore::{
    DataType, IoSchema, Node, NodeContext, NodeDescriptor, NodeError, NodeOutput, ParamDescriptor,
    ParamKind, Value,
};

/// Fill `{{name}}` placeholders from inputs (or params)
pub struct TemplateNode;

impl TemplateNode {
    fn lookup<'a>(ctx: &'a NodeContext, key: &str) -> Option<&'a Value> {
        let (head, rest) = match key.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (key, None),
        };
        let root = ctx.input_or_param(head)?;
        match rest {
            Some(path) => root.get_path(path),
            None => Some(root),
        }
    }

    fn render(ctx: &NodeContext, template: &str) -> String {
        let mut rendered = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start + 2..].find("}}") else {
                break;
            };
            rendered.push_str(&rest[..start]);
            let key = rest[start + 2..start + 2 + len].trim();
            match Self::lookup(ctx, key) {
                Some(value) => rendered.push_str(&value.to_string()),
                None => ctx.logger.warn(format!("Template variable '{}' is not set", key)),
            }
            rest = &rest[start + 2 + len + 2..];
        }

        rendered.push_str(rest);
        rendered
    }
}

#[async_trait]
impl Node for TemplateNode {
    fn node_type(&self) -> &str {
        "template"
    }

    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::new(self.node_type(), "transform")
            .describe("Render text with {{variable}} placeholders")
            .output("text", IoSchema::new(DataType::String))
            .param(
                "template",
                ParamDescriptor::new("Template", ParamKind::Textarea).required(),
            )
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let template = ctx.require_param_str("template")?;
        let text = Self::render(&ctx, template);

        Ok(NodeOutput::new().with_output("text", text))
    }
}

/// Parse JSON string to Value
pub struct JsonParseNode;

#[async_trait]
impl Node for JsonParseNode {
    fn node_type(&self) -> &str {
        "json-parse"
    }

    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::new(self.node_type(), "transform")
            .describe("Parse JSON string")
            .input("json", IoSchema::new(DataType::String).required())
            .output("parsed", IoSchema::new(DataType::Any))
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let input = ctx.require_input("json")?;
        let text = input.as_str().ok_or_else(|| invalid_type("json", "string", input))?;

        let parsed: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| NodeError::ExecutionFailed(format!("JSON parse error: {}", e)))?;

        Ok(NodeOutput::new().with_output("parsed", parsed))
    }
}

/// Stringify Value to JSON
pub struct JsonStringifyNode;

#[async_trait]
impl Node for JsonStringifyNode {
    fn node_type(&self) -> &str {
        "json-stringify"
    }

    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::new(self.node_type(), "transform")
            .describe("Convert value to JSON string")
            .input("value", IoSchema::new(DataType::Any).required())
            .output("json", IoSchema::new(DataType::String))
            .param(
                "pretty",
                ParamDescriptor::new("Pretty print", ParamKind::Boolean).default_value(false),
            )
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let value = ctx.require_input("value")?.to_json();
        let pretty = ctx
            .get_param_or("pretty", Value::Bool(false))
            .as_bool()
            .unwrap_or(false);

        let json = if pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        }
        .map_err(|e| NodeError::ExecutionFailed(format!("JSON stringify error: {}", e)))?;

        Ok(NodeOutput::new().with_output("json", json))
    }
}

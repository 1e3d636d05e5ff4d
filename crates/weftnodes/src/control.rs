use async_trait::async_trait;
use tokio::time::{sleep, Duration};
use weftcore::{
    DataType, IoSchema, LogLevel, Node, NodeContext, NodeDescriptor, NodeError, NodeOutput,
    ParamDescriptor, ParamKind, Value,
};

/// Evaluates a value against an expected one, or by truthiness
pub struct ConditionNode;

#[async_trait]
impl Node for ConditionNode {
    fn node_type(&self) -> &str {
        "condition"
    }

    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::new(self.node_type(), "control")
            .describe("Test a value; outputs the boolean result and passes the value on")
            .input("value", IoSchema::new(DataType::Any).required())
            .output("result", IoSchema::new(DataType::Boolean))
            .output("value", IoSchema::new(DataType::Any))
            .param("equals", ParamDescriptor::new("Equals", ParamKind::Json))
            .param(
                "negate",
                ParamDescriptor::new("Negate", ParamKind::Boolean).default_value(false),
            )
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let value = ctx
            .input_or_param("value")
            .cloned()
            .ok_or_else(|| NodeError::MissingInput("value".to_string()))?;

        let matched = match ctx.params.get("equals") {
            Some(expected) => &value == expected,
            None => value.is_truthy(),
        };
        let negate = ctx.params.get("negate").and_then(Value::as_bool).unwrap_or(false);
        let result = matched != negate;

        ctx.logger.debug(format!("Condition evaluated to {}", result));

        Ok(NodeOutput::new()
            .with_output("result", result)
            .with_output("value", value))
    }
}

/// Delay execution for a specified duration
pub struct DelayNode;

#[async_trait]
impl Node for DelayNode {
    fn node_type(&self) -> &str {
        "delay"
    }

    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::new(self.node_type(), "control")
            .describe("Wait before passing inputs through")
            .param(
                "ms",
                ParamDescriptor::new("Milliseconds", ParamKind::Number).default_value(1000.0),
            )
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let delay_ms = ctx
            .params
            .get("ms")
            .and_then(Value::as_f64)
            .unwrap_or(1000.0)
            .max(0.0) as u64;

        ctx.logger.info(format!("Delaying for {}ms", delay_ms));

        tokio::select! {
            _ = sleep(Duration::from_millis(delay_ms)) => {}
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
        }

        Ok(NodeOutput::from(ctx.inputs))
    }
}

/// Writes a message to the execution log
pub struct LogNode;

#[async_trait]
impl Node for LogNode {
    fn node_type(&self) -> &str {
        "log"
    }

    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::new(self.node_type(), "control")
            .describe("Logs input values for debugging")
            .input("message", IoSchema::new(DataType::Any))
            .output("message", IoSchema::new(DataType::String))
            .param(
                "level",
                ParamDescriptor::new(
                    "Level",
                    ParamKind::Select(vec![
                        "debug".into(),
                        "info".into(),
                        "warn".into(),
                        "error".into(),
                    ]),
                )
                .default_value("info"),
            )
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let message = ctx
            .input_or_param("message")
            .map(Value::to_string)
            .unwrap_or_else(|| "(no message)".to_string());

        let level = match ctx.params.get("level").and_then(Value::as_str) {
            Some("debug") => LogLevel::Debug,
            Some("warn") => LogLevel::Warn,
            Some("error") => LogLevel::Error,
            _ => LogLevel::Info,
        };
        ctx.logger.log(level, message.clone());

        for (key, value) in &ctx.inputs {
            if key != "message" {
                ctx.logger.debug(format!("  {}: {}", key, value));
            }
        }

        Ok(NodeOutput::new().with_output("message", message))
    }
}

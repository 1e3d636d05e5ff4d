use crate::invalid_type;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use weftcore::{
    DataType, IoSchema, Node, NodeContext, NodeDescriptor, NodeError, NodeOutput, ParamDescriptor,
    ParamKind, Value,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completion against an OpenAI-compatible endpoint
pub struct LlmChatNode {
    client: reqwest::Client,
}

impl LlmChatNode {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Use a preconfigured client (proxies, timeouts, TLS)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for LlmChatNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for LlmChatNode {
    fn node_type(&self) -> &str {
        "llm-chat"
    }

    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::new(self.node_type(), "ai")
            .describe("Send a prompt to an OpenAI-compatible chat model")
            .input("prompt", IoSchema::new(DataType::String).required())
            .output("text", IoSchema::new(DataType::String))
            .output("usage", IoSchema::new(DataType::Object))
            .param("apiKey", ParamDescriptor::new("API key", ParamKind::Secret).required())
            .param(
                "model",
                ParamDescriptor::new("Model", ParamKind::Text).default_value(DEFAULT_MODEL),
            )
            .param(
                "baseUrl",
                ParamDescriptor::new("Base URL", ParamKind::Text).default_value(DEFAULT_BASE_URL),
            )
            .param("system", ParamDescriptor::new("System prompt", ParamKind::Textarea))
            .param("temperature", ParamDescriptor::new("Temperature", ParamKind::Number))
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let prompt = ctx
            .input_or_param("prompt")
            .ok_or_else(|| NodeError::MissingInput("prompt".to_string()))?;
        let prompt = prompt.as_str().ok_or_else(|| invalid_type("prompt", "string", prompt))?;
        let api_key = ctx.require_param_str("apiKey")?;

        let model = ctx
            .params
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_MODEL);
        let base_url = ctx
            .params
            .get("baseUrl")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = ctx.params.get("system").and_then(Value::as_str) {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: prompt });

        let body = ChatRequest {
            model,
            messages,
            temperature: ctx.params.get("temperature").and_then(Value::as_f64),
        };

        ctx.logger.info(format!("Calling model {}", model));

        let request = self
            .client
            .post(format!("{}/chat/completions", base_url))
            .bearer_auth(api_key)
            .json(&body);

        let response = tokio::select! {
            result = request.send() => result
                .map_err(|e| NodeError::ExecutionFailed(format!("LLM request failed: {}", e)))?,
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
        };

        let status = response.status();
        if !status.is_success() {
            let detail = tokio::select! {
                result = response.text() => result.unwrap_or_default(),
                _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
            };
            return Err(NodeError::ExecutionFailed(format!(
                "LLM returned {}: {}",
                status.as_u16(),
                detail
            )));
        }

        let parsed: ChatResponse = tokio::select! {
            result = response.json::<ChatResponse>() => result
                .map_err(|e| NodeError::ExecutionFailed(format!("Invalid LLM response: {}", e)))?,
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
        };

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| NodeError::ExecutionFailed("LLM response had no content".to_string()))?;

        let usage = parsed.usage.map(Value::from).unwrap_or(Value::Null);

        Ok(NodeOutput::new()
            .with_output("text", text)
            .with_output("model", parsed.model.unwrap_or_else(|| model.to_string()))
            .with_output("usage", usage))
    }
}

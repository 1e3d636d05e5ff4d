use crate::invalid_type;
use async_trait::async_trait;
use std::collections::BTreeMap;
use weftcore::{
    DataType, IoSchema, Node, NodeContext, NodeDescriptor, NodeError, NodeOutput, ParamDescriptor,
    ParamKind, Value,
};

/// HTTP request node
pub struct HttpRequestNode {
    client: reqwest::Client,
}

impl HttpRequestNode {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Use a preconfigured client (proxies, timeouts, TLS)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build_request(&self, ctx: &NodeContext) -> Result<reqwest::RequestBuilder, NodeError> {
        let url = ctx
            .input_or_param("url")
            .ok_or_else(|| NodeError::MissingParam("url".to_string()))?;
        let url = url.as_str().ok_or_else(|| invalid_type("url", "string", url))?;

        let method_value = ctx.get_param_or("method", Value::String("GET".to_string()));
        let method = method_value.as_str().unwrap_or("GET").to_uppercase();

        ctx.logger.info(format!("{} {}", method, url));

        let mut request = match method.as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "PATCH" => self.client.patch(url),
            "DELETE" => self.client.delete(url),
            _ => return Err(NodeError::Configuration(format!("Unsupported method: {}", method))),
        };

        if let Some(Value::Object(headers)) = ctx.params.get("headers") {
            for (key, value) in headers {
                if let Some(val_str) = value.as_str() {
                    request = request.header(key, val_str);
                }
            }
        }

        if let Some(token) = ctx.params.get("token").and_then(Value::as_str) {
            request = request.bearer_auth(token);
        }

        if let Some(body) = ctx.input_or_param("body") {
            request = match body {
                Value::Null => request,
                Value::String(text) => request.body(text.clone()),
                other => request.json(&other.to_json()),
            };
        }

        Ok(request)
    }
}

impl Default for HttpRequestNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for HttpRequestNode {
    fn node_type(&self) -> &str {
        "http-request"
    }

    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::new(self.node_type(), "integration")
            .describe("Make HTTP requests")
            .input("url", IoSchema::new(DataType::String))
            .input("body", IoSchema::new(DataType::Any))
            .output("status", IoSchema::new(DataType::Number))
            .output("ok", IoSchema::new(DataType::Boolean))
            .output("body", IoSchema::new(DataType::String))
            .output("json", IoSchema::new(DataType::Any).describe("Body parsed as JSON, or null"))
            .output("headers", IoSchema::new(DataType::Object))
            .param("url", ParamDescriptor::new("URL", ParamKind::Text))
            .param(
                "method",
                ParamDescriptor::new(
                    "Method",
                    ParamKind::Select(vec![
                        "GET".into(),
                        "POST".into(),
                        "PUT".into(),
                        "PATCH".into(),
                        "DELETE".into(),
                    ]),
                )
                .default_value("GET"),
            )
            .param("headers", ParamDescriptor::new("Headers", ParamKind::Json))
            .param("token", ParamDescriptor::new("Bearer token", ParamKind::Secret))
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let request = self.build_request(&ctx)?;

        let response = tokio::select! {
            result = request.send() => result
                .map_err(|e| NodeError::ExecutionFailed(format!("HTTP request failed: {}", e)))?,
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
        };

        let status = response.status();
        let headers_map: BTreeMap<String, Value> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_str().unwrap_or("").to_string())))
            .collect();

        let body_text = tokio::select! {
            result = response.text() => result
                .map_err(|e| NodeError::ExecutionFailed(format!("Failed to read response: {}", e)))?,
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
        };

        let json = serde_json::from_str::<serde_json::Value>(&body_text)
            .map(Value::from)
            .unwrap_or(Value::Null);

        ctx.logger.info(format!("Response status: {}", status.as_u16()));

        Ok(NodeOutput::new()
            .with_output("status", status.as_u16() as f64)
            .with_output("ok", status.is_success())
            .with_output("body", body_text)
            .with_output("json", json)
            .with_output("headers", Value::Object(headers_map)))
    }
}

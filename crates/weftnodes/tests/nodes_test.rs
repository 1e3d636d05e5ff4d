// crates/weftnodes/tests/nodes_test.rs

use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use weftcore::{LogLevel, Node, NodeContext, NodeError, Value, WEBHOOK_PAYLOAD_KEY};
use weftnodes::{
    ConditionNode, DelayNode, HttpRequestNode, JsonParseNode, JsonStringifyNode, LlmChatNode,
    LogNode, NumberInputNode, TemplateNode, TextInputNode, WebhookTriggerNode,
};

/// Serve a single canned HTTP/1.1 response on a local port.
///
/// Returns the base URL and a handle resolving to the raw request text.
async fn serve_once(status: &str, extra_headers: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n{}",
        status,
        body.len(),
        extra_headers,
        body
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    (base_url, handle)
}

fn local_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&raw).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if raw.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&raw).to_string()
}

#[test]
fn test_register_all_covers_every_category() {
    let registry = weftnodes::standard_registry();

    assert_eq!(registry.len(), 11);
    let groups = registry.list_by_category();
    for category in ["input", "transform", "control", "integration", "ai"] {
        assert!(groups.contains_key(category), "missing category {}", category);
    }
    assert!(registry.contains("text-input"));
    assert!(registry.contains("llm-chat"));
}

#[tokio::test]
async fn test_text_input_emits_param() {
    let ctx = NodeContext::new("input1").with_param("value", "Hello, World!");

    let output = TextInputNode.execute(ctx).await.unwrap();

    assert_eq!(output.get("value"), Some(&Value::from("Hello, World!")));
}

#[tokio::test]
async fn test_text_input_defaults_to_empty_string() {
    let output = TextInputNode.execute(NodeContext::new("t")).await.unwrap();

    assert_eq!(output.get("value"), Some(&Value::from("")));
}

#[tokio::test]
async fn test_number_input_parses_numeric_strings() {
    let ctx = NodeContext::new("n").with_param("value", "42.5");
    let output = NumberInputNode.execute(ctx).await.unwrap();
    assert_eq!(output.get("value"), Some(&Value::Number(42.5)));

    let ctx = NodeContext::new("n").with_param("value", "abc");
    let err = NumberInputNode.execute(ctx).await.unwrap_err();
    assert!(matches!(err, NodeError::InvalidType { .. }));
}

#[tokio::test]
async fn test_webhook_trigger_reads_reserved_channel() {
    let inputs = Value::from(json!({
        WEBHOOK_PAYLOAD_KEY: {
            "body": { "event": "push" },
            "headers": { "x-token": "abc" },
            "query": {}
        }
    }));
    let ctx = NodeContext::new("hook").with_workflow_inputs(inputs);

    let output = WebhookTriggerNode.execute(ctx).await.unwrap();

    assert_eq!(
        output.get("body").and_then(|b| b.get("event")),
        Some(&Value::from("push"))
    );
    assert_eq!(
        output.get("headers").and_then(|h| h.get("x-token")),
        Some(&Value::from("abc"))
    );
    assert!(output.get("payload").map(|p| p.get("body").is_some()).unwrap_or(false));
}

#[tokio::test]
async fn test_webhook_trigger_without_payload_warns() {
    let ctx = NodeContext::new("hook");
    let logger = ctx.logger.clone();

    let output = WebhookTriggerNode.execute(ctx).await.unwrap();

    assert_eq!(output.get("payload"), Some(&Value::Null));
    assert_eq!(logger.entries()[0].level, LogLevel::Warn);
}

#[tokio::test]
async fn test_template_fills_inputs_and_nested_paths() {
    let ctx = NodeContext::new("tpl")
        .with_param("template", "Hi {{ name }}, you are {{user.age}}{{missing}}!")
        .with_input("name", "Ada")
        .with_input("user", Value::from(json!({ "age": 36 })));
    let logger = ctx.logger.clone();

    let output = TemplateNode.execute(ctx).await.unwrap();

    assert_eq!(output.get("text"), Some(&Value::from("Hi Ada, you are 36!")));
    assert_eq!(logger.entries().len(), 1);
}

#[tokio::test]
async fn test_template_keeps_unterminated_braces() {
    let ctx = NodeContext::new("tpl").with_param("template", "open {{ never closed");

    let output = TemplateNode.execute(ctx).await.unwrap();

    assert_eq!(output.get("text"), Some(&Value::from("open {{ never closed")));
}

#[tokio::test]
async fn test_json_parse_and_stringify() {
    let ctx = NodeContext::new("p").with_input("json", r#"{"a": [1, 2]}"#);
    let parsed = JsonParseNode.execute(ctx).await.unwrap();
    let value = parsed.get("parsed").cloned().unwrap();
    assert_eq!(value, Value::from(json!({ "a": [1, 2] })));

    let ctx = NodeContext::new("s").with_input("value", value);
    let output = JsonStringifyNode.execute(ctx).await.unwrap();
    assert_eq!(output.get("json"), Some(&Value::from(r#"{"a":[1,2]}"#)));
}

#[tokio::test]
async fn test_json_parse_rejects_invalid_text() {
    let ctx = NodeContext::new("p").with_input("json", "{nope");

    let err = JsonParseNode.execute(ctx).await.unwrap_err();

    assert!(matches!(err, NodeError::ExecutionFailed(msg) if msg.contains("JSON parse error")));
}

#[tokio::test]
async fn test_condition_equals_and_truthiness() {
    let ctx = NodeContext::new("c")
        .with_input("value", "yes")
        .with_param("equals", "yes");
    let output = ConditionNode.execute(ctx).await.unwrap();
    assert_eq!(output.get("result"), Some(&Value::Bool(true)));
    assert_eq!(output.get("value"), Some(&Value::from("yes")));

    let ctx = NodeContext::new("c")
        .with_input("value", 0.0)
        .with_param("negate", true);
    let output = ConditionNode.execute(ctx).await.unwrap();
    assert_eq!(output.get("result"), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn test_delay_passes_inputs_through() {
    let ctx = NodeContext::new("d")
        .with_param("ms", 5.0)
        .with_input("data", "kept");

    let output = DelayNode.execute(ctx).await.unwrap();

    assert_eq!(output.get("data"), Some(&Value::from("kept")));
}

#[tokio::test]
async fn test_delay_observes_cancellation() {
    let ctx = NodeContext::new("d").with_param("ms", 60_000.0);
    let token = ctx.cancellation.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), DelayNode.execute(ctx))
        .await
        .expect("delay should stop on cancellation");

    assert_eq!(result.unwrap_err(), NodeError::Cancelled);
}

#[tokio::test]
async fn test_log_writes_entry_at_requested_level() {
    let ctx = NodeContext::new("log")
        .with_input("message", "something happened")
        .with_param("level", "warn");
    let logger = ctx.logger.clone();

    let output = LogNode.execute(ctx).await.unwrap();

    assert_eq!(output.get("message"), Some(&Value::from("something happened")));
    let entries = logger.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].level, LogLevel::Warn);
    assert_eq!(entries[0].message, "something happened");
}

#[tokio::test]
async fn test_http_request_requires_url() {
    let err = HttpRequestNode::new()
        .execute(NodeContext::new("h"))
        .await
        .unwrap_err();

    assert_eq!(err, NodeError::MissingParam("url".to_string()));
}

#[tokio::test]
async fn test_http_request_rejects_unknown_method() {
    let ctx = NodeContext::new("h")
        .with_param("url", "http://localhost:1")
        .with_param("method", "BREW");

    let err = HttpRequestNode::new().execute(ctx).await.unwrap_err();

    assert!(matches!(err, NodeError::Configuration(msg) if msg.contains("BREW")));
}

#[tokio::test]
async fn test_http_request_aborts_when_already_cancelled() {
    let ctx = NodeContext::new("h").with_param("url", "http://10.255.255.1:81/");
    ctx.cancellation.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), HttpRequestNode::new().execute(ctx))
        .await
        .expect("request should stop on cancellation");

    assert!(result.is_err());
}

#[tokio::test]
async fn test_llm_chat_requires_api_key() {
    let ctx = NodeContext::new("ai").with_input("prompt", "hello");

    let err = LlmChatNode::new().execute(ctx).await.unwrap_err();

    assert_eq!(err, NodeError::MissingParam("apiKey".to_string()));
}

#[tokio::test]
async fn test_llm_chat_requires_prompt() {
    let ctx = NodeContext::new("ai").with_param("apiKey", "k");

    let err = LlmChatNode::new().execute(ctx).await.unwrap_err();

    assert_eq!(err, NodeError::MissingInput("prompt".to_string()));
}

#[tokio::test]
async fn test_http_request_maps_response_fields() {
    let (base_url, server) = serve_once(
        "201 Created",
        "Content-Type: application/json\r\nX-Trace: abc\r\n",
        r#"{"ok": true, "items": [1, 2]}"#,
    )
    .await;
    let ctx = NodeContext::new("h")
        .with_param("url", format!("{}/things", base_url))
        .with_param("method", "post")
        .with_param("headers", Value::from(json!({ "X-Custom": "1" })))
        .with_param("token", "secret-token")
        .with_input("body", Value::from(json!({ "name": "widget" })));

    let output = HttpRequestNode::with_client(local_client())
        .execute(ctx)
        .await
        .unwrap();

    assert_eq!(output.get("status"), Some(&Value::Number(201.0)));
    assert_eq!(output.get("ok"), Some(&Value::Bool(true)));
    assert_eq!(
        output.get("body"),
        Some(&Value::from(r#"{"ok": true, "items": [1, 2]}"#))
    );
    assert_eq!(
        output.get("json"),
        Some(&Value::from(json!({ "ok": true, "items": [1, 2] })))
    );
    assert_eq!(
        output.get("headers").and_then(|h| h.get("x-trace")),
        Some(&Value::from("abc"))
    );

    let request = server.await.unwrap().to_lowercase();
    assert!(request.starts_with("post /things http/1.1"));
    assert!(request.contains("x-custom: 1"));
    assert!(request.contains("authorization: bearer secret-token"));
    assert!(request.contains(r#"{"name":"widget"}"#));
}

#[tokio::test]
async fn test_http_request_reports_non_json_error_status() {
    let (base_url, _server) = serve_once("404 Not Found", "", "no such thing").await;
    let ctx = NodeContext::new("h").with_param("url", base_url);

    let output = HttpRequestNode::with_client(local_client())
        .execute(ctx)
        .await
        .unwrap();

    assert_eq!(output.get("status"), Some(&Value::Number(404.0)));
    assert_eq!(output.get("ok"), Some(&Value::Bool(false)));
    assert_eq!(output.get("body"), Some(&Value::from("no such thing")));
    assert_eq!(output.get("json"), Some(&Value::Null));
}

#[tokio::test]
async fn test_llm_chat_parses_completion() {
    let (base_url, server) = serve_once(
        "200 OK",
        "Content-Type: application/json\r\n",
        r#"{"model":"m-1","choices":[{"message":{"role":"assistant","content":"hi there"}}],"usage":{"total_tokens":7}}"#,
    )
    .await;
    let ctx = NodeContext::new("ai")
        .with_input("prompt", "hello")
        .with_param("apiKey", "k-123")
        .with_param("baseUrl", format!("{}/", base_url))
        .with_param("system", "be brief");

    let output = LlmChatNode::with_client(local_client())
        .execute(ctx)
        .await
        .unwrap();

    assert_eq!(output.get("text"), Some(&Value::from("hi there")));
    assert_eq!(output.get("model"), Some(&Value::from("m-1")));
    assert_eq!(
        output.get("usage").and_then(|u| u.get("total_tokens")),
        Some(&Value::Number(7.0))
    );

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /chat/completions HTTP/1.1"));
    assert!(request.to_lowercase().contains("authorization: bearer k-123"));
    assert!(request.contains(r#""role":"system","content":"be brief""#));
    assert!(request.contains(r#""role":"user","content":"hello""#));
}

#[tokio::test]
async fn test_llm_chat_fails_on_error_status() {
    let (base_url, _server) = serve_once("503 Service Unavailable", "", "overloaded").await;
    let ctx = NodeContext::new("ai")
        .with_input("prompt", "hello")
        .with_param("apiKey", "k")
        .with_param("baseUrl", base_url);

    let err = LlmChatNode::with_client(local_client())
        .execute(ctx)
        .await
        .unwrap_err();

    assert!(
        matches!(&err, NodeError::ExecutionFailed(msg) if msg.contains("503") && msg.contains("overloaded")),
        "unexpected error: {}",
        err
    );
}

#[tokio::test]
async fn test_llm_chat_rejects_empty_choices() {
    let (base_url, _server) = serve_once("200 OK", "", r#"{"choices":[]}"#).await;
    let ctx = NodeContext::new("ai")
        .with_input("prompt", "hello")
        .with_param("apiKey", "k")
        .with_param("baseUrl", base_url);

    let err = LlmChatNode::with_client(local_client())
        .execute(ctx)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        NodeError::ExecutionFailed("LLM response had no content".to_string())
    );
}

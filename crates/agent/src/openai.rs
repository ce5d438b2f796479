//! Client for OpenAI-compatible `/chat/completions` endpoints (OpenAI, Ollama).

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use dimodel_core::config::{LlmConfig, LlmProvider};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::conversation::{Message, Role, ToolCall};
use crate::llm::{AssistantTurn, CompletionRequest, LlmClient};

const RETRY_BASE_DELAY_MS: u64 = 250;
const RETRY_MAX_DELAY_MS: u64 = 8_000;

pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    max_retries: u32,
}

enum Attempt {
    Retry(anyhow::Error),
    Fail(anyhow::Error),
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        if config.provider == LlmProvider::OpenAi && !config.has_api_key() {
            bail!("llm.api_key is required for the openai provider (set DIMODEL_LLM_API_KEY)");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("could not build http client")?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send_once(&self, body: &Value) -> Result<Value, Attempt> {
        let mut request = self.http.post(&self.endpoint).json(body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|error| Attempt::Retry(anyhow!(error).context("chat completion request failed")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let error = anyhow!("chat completion returned {status}: {detail}");
            return Err(if is_retryable(status) { Attempt::Retry(error) } else { Attempt::Fail(error) });
        }

        response
            .json::<Value>()
            .await
            .map_err(|error| Attempt::Fail(anyhow!(error).context("chat completion response was not JSON")))
    }
}

/// Exponential backoff from 500ms, capped so a long retry budget stays bounded.
pub fn retry_delay(attempt: u32) -> Duration {
    let delay = RETRY_BASE_DELAY_MS.saturating_mul(1u64 << attempt.min(16));
    Duration::from_millis(delay.min(RETRY_MAX_DELAY_MS))
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<AssistantTurn> {
        let body = build_request_body(&self.model, request);
        let mut attempt = 0u32;

        loop {
            debug!(
                event_name = "agent.llm.request",
                model = %self.model,
                messages = request.messages.len(),
                attempt,
                "sending chat completion"
            );
            match self.send_once(&body).await {
                Ok(response) => return parse_response(&response),
                Err(Attempt::Retry(error)) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "agent.llm.retry",
                        attempt,
                        max_retries = self.max_retries,
                        error = %error,
                        "retrying chat completion"
                    );
                    tokio::time::sleep(retry_delay(attempt)).await;
                }
                Err(Attempt::Retry(error)) | Err(Attempt::Fail(error)) => return Err(error),
            }
        }
    }
}

pub fn build_request_body(model: &str, request: CompletionRequest<'_>) -> Value {
    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(model.to_string()));
    body.insert(
        "messages".to_string(),
        Value::Array(request.messages.iter().map(encode_message).collect()),
    );

    if !request.tools.is_empty() {
        let tools = request
            .tools
            .iter()
            .map(|spec| {
                json!({
                    "type": "function",
                    "function": {
                        "name": spec.name,
                        "description": spec.description,
                        "parameters": spec.parameters,
                    }
                })
            })
            .collect();
        body.insert("tools".to_string(), Value::Array(tools));
    }

    Value::Object(body)
}

pub fn encode_message(message: &Message) -> Value {
    match message.role {
        Role::System | Role::User => {
            json!({ "role": message.role.as_str(), "content": message.content })
        }
        Role::Assistant => {
            let content =
                if message.content.is_empty() && !message.tool_calls.is_empty() {
                    Value::Null
                } else {
                    Value::String(message.content.clone())
                };
            let mut encoded = json!({ "role": "assistant", "content": content });
            if !message.tool_calls.is_empty() {
                encoded["tool_calls"] =
                    Value::Array(message.tool_calls.iter().map(encode_tool_call).collect());
            }
            encoded
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
            "content": message.content,
        }),
    }
}

fn encode_tool_call(call: &ToolCall) -> Value {
    let arguments = match &call.arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    };
    json!({
        "id": call.id,
        "type": "function",
        "function": { "name": call.name, "arguments": arguments },
    })
}

/// Reads the first choice. Argument strings that are not valid JSON are kept
/// as a JSON string so the tool reports the problem to the model.
pub fn parse_response(body: &Value) -> Result<AssistantTurn> {
    let message = body
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| anyhow!("chat completion response has no choices"))?;

    let content = message.get("content").and_then(Value::as_str).unwrap_or_default().to_string();

    let mut tool_calls = Vec::new();
    if let Some(raw_calls) = message.get("tool_calls").and_then(Value::as_array) {
        for (index, raw_call) in raw_calls.iter().enumerate() {
            let function = raw_call
                .get("function")
                .ok_or_else(|| anyhow!("tool call {index} has no function"))?;
            let name = function
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("tool call {index} has no function name"))?;
            let id = raw_call
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("call_{index}"));
            let arguments = match function.get("arguments") {
                Some(Value::String(raw)) if raw.trim().is_empty() => json!({}),
                Some(Value::String(raw)) => {
                    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
                }
                Some(other) => other.clone(),
                None => json!({}),
            };
            tool_calls.push(ToolCall { id, name: name.to_string(), arguments });
        }
    }

    Ok(AssistantTurn { content, tool_calls })
}

#[cfg(test)]
mod tests {
    use dimodel_core::config::{AppConfig, LlmProvider};
    use serde_json::json;

    use std::time::Duration;

    use super::{
        build_request_body, encode_message, parse_response, retry_delay, OpenAiCompatibleClient,
    };
    use crate::conversation::{Message, ToolCall};
    use crate::llm::CompletionRequest;
    use crate::tools::ToolRegistry;

    #[test]
    fn request_body_carries_messages_and_function_tools() {
        let messages = vec![Message::system("be helpful"), Message::user("what stage tables?")];
        let tools = ToolRegistry::data_model().specs();
        let body = build_request_body(
            "gpt-4o-mini",
            CompletionRequest { messages: &messages, tools: &tools },
        );

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][1], json!({"role": "user", "content": "what stage tables?"}));
        assert_eq!(body["tools"].as_array().map(Vec::len), Some(5));
        assert_eq!(body["tools"][4]["type"], "function");
        assert_eq!(body["tools"][4]["function"]["name"], "add_table_with_columns");
        assert_eq!(body["tools"][4]["function"]["parameters"]["required"][0], "layer_name");
    }

    #[test]
    fn request_body_omits_empty_tool_list() {
        let messages = vec![Message::user("hi")];
        let body = build_request_body("m", CompletionRequest { messages: &messages, tools: &[] });

        assert!(body.get("tools").is_none());
    }

    #[test]
    fn assistant_tool_calls_encode_arguments_as_strings() {
        let message = Message::assistant(
            "",
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "add_table_with_columns".to_string(),
                arguments: json!({"layer_name": "stage"}),
            }],
        );

        let encoded = encode_message(&message);
        assert!(encoded["content"].is_null());
        assert_eq!(encoded["tool_calls"][0]["function"]["arguments"], r#"{"layer_name":"stage"}"#);
    }

    #[test]
    fn tool_result_encodes_call_id() {
        let encoded = encode_message(&Message::tool("call_1", "get_stage_tables_with_columns", "[]"));

        assert_eq!(encoded, json!({"role": "tool", "tool_call_id": "call_1", "content": "[]"}));
    }

    #[test]
    fn parses_text_and_tool_calls() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "call_a", "type": "function",
                         "function": {"name": "get_source_tables_with_columns", "arguments": "{}"}},
                        {"id": "call_b", "type": "function",
                         "function": {"name": "add_table_with_columns", "arguments": "{not json"}}
                    ]
                }
            }]
        });

        let turn = parse_response(&body).expect("parse");
        assert!(turn.content.is_empty());
        assert_eq!(turn.tool_calls.len(), 2);
        assert_eq!(turn.tool_calls[0].arguments, json!({}));
        assert_eq!(turn.tool_calls[1].arguments, json!("{not json"));
    }

    #[test]
    fn retry_delay_doubles_then_caps() {
        assert_eq!(retry_delay(1), Duration::from_millis(500));
        assert_eq!(retry_delay(3), Duration::from_millis(2_000));
        assert_eq!(retry_delay(10), Duration::from_secs(8));

        let total = (1..=10).map(retry_delay).sum::<Duration>();
        assert!(total <= Duration::from_secs(60));
    }

    #[test]
    fn missing_choices_is_an_error() {
        assert!(parse_response(&json!({"error": {"message": "bad key"}})).is_err());
    }

    #[test]
    fn openai_provider_requires_api_key() {
        let config = AppConfig::default();
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);

        let result = OpenAiCompatibleClient::from_config(&config.llm);
        assert!(matches!(result, Err(ref error) if error.to_string().contains("llm.api_key")));
    }

    #[test]
    fn ollama_provider_builds_endpoint_without_key() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Ollama;
        config.llm.base_url = "http://localhost:11434/v1/".to_string();

        let client = OpenAiCompatibleClient::from_config(&config.llm).expect("client");
        assert_eq!(client.endpoint(), "http://localhost:11434/v1/chat/completions");
    }
}

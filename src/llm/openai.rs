//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；使用 function tools 传递工具集。
//! 请求 / 回复使用自定义 JSON 结构（byot），只取本项目需要的字段。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::Client;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::{LlmError, PolicyClient, PolicyReply, Role, ToolCall, ToolSpec, Turn};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// OpenAI 兼容客户端：持有 Client 与 model 名
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    request_timeout: Duration,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>, request_timeout_secs: u64) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_default();

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            request_timeout: Duration::from_secs(request_timeout_secs),
            usage: TokenUsage::new(),
        }
    }

    fn build_request(&self, system: &str, turns: &[Turn], tools: &[ToolSpec]) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": system })];
        messages.extend(turns.iter().map(to_wire_message));

        let mut request = json!({
            "model": self.model,
            "messages": messages,
        });
        if !tools.is_empty() {
            request["tools"] = Value::Array(
                tools
                    .iter()
                    .map(|t| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect(),
            );
        }
        request
    }
}

fn to_wire_message(turn: &Turn) -> Value {
    match turn.role {
        Role::User => json!({ "role": "user", "content": turn.content }),
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": turn.tool_call_id.clone().unwrap_or_default(),
            "content": turn.content,
        }),
        Role::Assistant => {
            let mut msg = json!({ "role": "assistant", "content": turn.content });
            if !turn.tool_calls.is_empty() {
                msg["tool_calls"] = Value::Array(
                    turn.tool_calls
                        .iter()
                        .map(|c| {
                            let arguments = match &c.arguments {
                                Value::String(raw) => raw.clone(),
                                other => other.to_string(),
                            };
                            json!({
                                "id": c.id,
                                "type": "function",
                                "function": { "name": c.name, "arguments": arguments },
                            })
                        })
                        .collect(),
                );
            }
            msg
        }
    }
}

/// arguments 为 JSON 字符串；为空视为 {}，无法解析时保留原文交给工具参数校验
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn into_reply(response: ChatResponse) -> Result<PolicyReply, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Decode("response has no choices".to_string()))?;
    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|c| {
            // 部分兼容后端不返回 id；补一个，保证结果能按 id 写回
            let id = if c.id.is_empty() {
                format!("call_{}", uuid::Uuid::new_v4().simple())
            } else {
                c.id
            };
            ToolCall::new(id, c.function.name, parse_arguments(&c.function.arguments))
        })
        .collect();
    Ok(PolicyReply {
        text: choice.message.content.unwrap_or_default(),
        tool_calls,
    })
}

fn map_error(err: OpenAIError) -> LlmError {
    let message = err.to_string();
    match &err {
        OpenAIError::ApiError(_) => {
            let lower = message.to_lowercase();
            if lower.contains("rate limit") || lower.contains("429") {
                LlmError::RateLimited(message)
            } else if lower.contains("api key") || lower.contains("unauthorized") || lower.contains("401") {
                LlmError::Auth(message)
            } else {
                LlmError::Api(message)
            }
        }
        OpenAIError::JSONDeserialize(..) => LlmError::Decode(message),
        _ => LlmError::Network(message),
    }
}

#[async_trait]
impl PolicyClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn converse(
        &self,
        system: &str,
        turns: &[Turn],
        tools: &[ToolSpec],
    ) -> Result<PolicyReply, LlmError> {
        let request = self.build_request(system, turns, tools);
        tracing::debug!(model = %self.model, turns = turns.len(), tools = tools.len(), "policy request");

        let response: ChatResponse = tokio::time::timeout(
            self.request_timeout,
            self.client.chat().create_byot(request),
        )
        .await
        .map_err(|_| LlmError::Network(format!("request timed out after {:?}", self.request_timeout)))?
        .map_err(map_error)?;

        if let Some(usage) = &response.usage {
            self.usage.add(usage.prompt_tokens, usage.completion_tokens);
        }

        into_reply(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new(Some("http://localhost:9"), "test-model", Some("sk-test"), 5)
    }

    #[test]
    fn test_request_includes_function_tools() {
        let tools = vec![ToolSpec {
            name: "click".into(),
            description: "Click".into(),
            parameters: json!({"type": "object"}),
        }];
        let req = client().build_request("sys", &[Turn::user("<html>")], &tools);
        assert_eq!(req["model"], "test-model");
        assert_eq!(req["messages"][0]["role"], "system");
        assert_eq!(req["messages"][1]["content"], "<html>");
        assert_eq!(req["tools"][0]["type"], "function");
        assert_eq!(req["tools"][0]["function"]["name"], "click");
    }

    #[test]
    fn test_request_omits_empty_tools() {
        let req = client().build_request("sys", &[], &[]);
        assert!(req.get("tools").is_none());
    }

    #[test]
    fn test_assistant_and_tool_turns_wire_format() {
        let call = ToolCall::new("call_1", "click", json!({"selector": "css=a"}));
        let turns = vec![
            Turn::assistant("", vec![call]),
            Turn::tool("call_1", "# Page"),
        ];
        let req = client().build_request("sys", &turns, &[]);
        let assistant = &req["messages"][1];
        assert_eq!(assistant["tool_calls"][0]["id"], "call_1");
        assert_eq!(
            assistant["tool_calls"][0]["function"]["arguments"],
            "{\"selector\":\"css=a\"}"
        );
        assert_eq!(req["messages"][2]["role"], "tool");
        assert_eq!(req["messages"][2]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_into_reply_parses_tool_calls() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "type": "function", "function": {"name": "click", "arguments": "{\"selector\":\"#x\"}"}},
                        {"id": "b", "type": "function", "function": {"name": "go_back", "arguments": ""}},
                        {"id": "c", "type": "function", "function": {"name": "click", "arguments": "{broken"}}
                    ]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2}
        }))
        .unwrap();
        let reply = into_reply(response).unwrap();
        assert_eq!(reply.text, "");
        assert_eq!(reply.tool_calls.len(), 3);
        assert_eq!(reply.tool_calls[0].arguments, json!({"selector": "#x"}));
        assert_eq!(reply.tool_calls[1].arguments, json!({}));
        assert_eq!(reply.tool_calls[2].arguments, Value::String("{broken".into()));
    }

    #[test]
    fn test_into_reply_synthesizes_missing_ids() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": "",
                    "tool_calls": [
                        {"function": {"name": "get_state"}},
                        {"function": {"name": "get_state"}}
                    ]
                }
            }]
        }))
        .unwrap();
        let reply = into_reply(response).unwrap();
        let ids: Vec<&str> = reply.tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert!(ids.iter().all(|id| id.starts_with("call_")));
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_into_reply_without_choices_is_decode_error() {
        let response: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(into_reply(response), Err(LlmError::Decode(_))));
    }
}

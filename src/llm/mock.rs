//! Mock / 脚本化策略客户端（无需 API）
//!
//! - MockPolicyClient：未配置 API Key 时使用，只回一段文本、不提出工具调用，运行会立即结束
//! - ScriptedPolicy：按顺序回放预置回复，并记录每次收到的请求，便于测试断言

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmError, PolicyClient, PolicyReply, ToolSpec, Turn};

#[derive(Debug, Default)]
pub struct MockPolicyClient;

#[async_trait]
impl PolicyClient for MockPolicyClient {
    async fn converse(
        &self,
        _system: &str,
        turns: &[Turn],
        tools: &[ToolSpec],
    ) -> Result<PolicyReply, LlmError> {
        let chars = turns.last().map(|t| t.content.chars().count()).unwrap_or(0);
        Ok(PolicyReply::text(format!(
            "Mock policy: received {chars} characters and {} tools; no API key configured, stopping.",
            tools.len()
        )))
    }
}

/// 一次被记录的请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system: String,
    pub turns: Vec<Turn>,
    pub tool_names: Vec<String>,
}

/// 回放队列中的一项：正常回复或策略错误
pub type ScriptedReply = Result<PolicyReply, LlmError>;

#[derive(Debug, Default)]
pub struct ScriptedPolicy {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedPolicy {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = ScriptedReply>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 已收到的全部请求（按时间顺序）
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PolicyClient for ScriptedPolicy {
    async fn converse(
        &self,
        system: &str,
        turns: &[Turn],
        tools: &[ToolSpec],
    ) -> Result<PolicyReply, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                system: system.to_string(),
                turns: turns.to_vec(),
                tool_names: tools.iter().map(|t| t.name.clone()).collect(),
            });
        }
        self.replies
            .lock()
            .map_err(|e| LlmError::Api(e.to_string()))?
            .pop_front()
            .unwrap_or(Err(LlmError::Exhausted))
    }
}

//! 对话会话：面向决策策略的适配层
//!
//! 独占对话轮次；prompt 提交新内容，feed 把一批工具结果写回并取下一轮回复。
//! feed 前校验结果与上一轮待处理调用一一对应且顺序一致，保证不遗漏、不重复。

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::AgentError;
use crate::llm::{LlmError, PolicyClient, PolicyReply, ToolCall, ToolSpec, Turn};
use crate::tools::ToolResult;

/// 每轮 follow-up 时模型可见的工具集
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolVisibility {
    /// 每次都附带完整工具集
    EveryTurn,
    /// 只在首个 prompt 附带
    FirstTurnOnly,
}

/// 已校验的策略回复：调用 id 非空且唯一
#[derive(Debug, Clone)]
pub struct Response {
    text: String,
    calls: Vec<ToolCall>,
}

impl Response {
    fn from_reply(reply: PolicyReply) -> Result<Self, AgentError> {
        let mut seen = HashSet::new();
        for call in &reply.tool_calls {
            if call.id.is_empty() {
                return Err(AgentError::MalformedResponse(format!(
                    "tool call '{}' has no id",
                    call.name
                )));
            }
            if !seen.insert(call.id.clone()) {
                return Err(AgentError::MalformedResponse(format!(
                    "duplicate tool call id '{}'",
                    call.id
                )));
            }
        }
        Ok(Self {
            text: reply.text,
            calls: reply.tool_calls,
        })
    }

    pub fn text_summary(&self) -> &str {
        &self.text
    }

    /// 按模型提出的顺序
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        &self.calls
    }
}

pub struct ConversationSession {
    policy: Arc<dyn PolicyClient>,
    turns: Vec<Turn>,
    tools: Vec<ToolSpec>,
    visibility: ToolVisibility,
    /// 上一轮回复中尚未 feed 的调用 id（按顺序）
    pending: Vec<String>,
}

impl ConversationSession {
    pub fn new(policy: Arc<dyn PolicyClient>, visibility: ToolVisibility) -> Self {
        Self {
            policy,
            turns: Vec::new(),
            tools: Vec::new(),
            visibility,
            pending: Vec::new(),
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.policy.token_usage()
    }

    /// 提交一段内容（首轮为页面状态）并取回复
    pub async fn prompt(
        &mut self,
        system: &str,
        content: &str,
        available_tools: &[ToolSpec],
    ) -> Result<Response, AgentError> {
        if !self.pending.is_empty() {
            return Err(AgentError::MalformedResponse(format!(
                "{} tool call(s) still unresolved",
                self.pending.len()
            )));
        }
        self.tools = available_tools.to_vec();
        self.turns.push(Turn::user(content));
        let tools = self.tools.clone();
        self.exchange(system, &tools).await
    }

    /// 写回一批工具结果（必须与待处理调用一一对应、顺序一致）并取下一轮回复
    pub async fn feed(&mut self, results: &[ToolResult], system: &str) -> Result<Response, AgentError> {
        let fed: Vec<&str> = results.iter().map(ToolResult::call_id).collect();
        if fed != self.pending.iter().map(String::as_str).collect::<Vec<_>>() {
            return Err(AgentError::MalformedResponse(format!(
                "tool results {:?} do not match pending calls {:?}",
                fed, self.pending
            )));
        }
        self.pending.clear();
        for result in results {
            self.turns.push(Turn::tool(result.call_id(), result.content()));
        }
        let tools = match self.visibility {
            ToolVisibility::EveryTurn => self.tools.clone(),
            ToolVisibility::FirstTurnOnly => Vec::new(),
        };
        self.exchange(system, &tools).await
    }

    async fn exchange(&mut self, system: &str, tools: &[ToolSpec]) -> Result<Response, AgentError> {
        let reply = self
            .policy
            .converse(system, &self.turns, tools)
            .await
            .map_err(|e| match e {
                LlmError::Decode(msg) => AgentError::MalformedResponse(msg),
                other => AgentError::PolicyUnavailable(other),
            })?;
        let response = Response::from_reply(reply)?;
        tracing::debug!(
            text_chars = response.text.len(),
            calls = response.calls.len(),
            "policy response"
        );
        self.turns.push(Turn::assistant(
            response.text.clone(),
            response.calls.clone(),
        ));
        self.pending = response.calls.iter().map(|c| c.id.clone()).collect();
        Ok(response)
    }
}

//! 决策策略客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock / Scripted）实现 PolicyClient：给定 system、对话轮次与工具集，返回文本和工具调用。

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::{PolicyReply, ToolSpec, Turn};

/// 策略调用错误；上层统一视为 PolicyUnavailable，不自动重试
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("API error: {0}")]
    Api(String),

    /// 回复结构无法解析（无 choices 等）
    #[error("undecodable reply: {0}")]
    Decode(String),

    /// 脚本化客户端没有更多回复
    #[error("no more scripted replies")]
    Exhausted,
}

#[async_trait]
pub trait PolicyClient: Send + Sync {
    async fn converse(
        &self,
        system: &str,
        turns: &[Turn],
        tools: &[ToolSpec],
    ) -> Result<PolicyReply, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

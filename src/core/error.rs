//! 错误类型
//!
//! 两层：`ToolError` 是单次工具调用的失败（转成失败的 ToolResult 回传给模型，不中断循环）；
//! `AgentError` 是终止本次运行的致命错误（策略不可用、回复格式错误、初始化失败）。

use thiserror::Error;

use crate::actuator::ActuatorError;
use crate::llm::LlmError;

/// 单次工具调用失败的分类；由 ToolRegistry 边界产生，作为数据回传给决策策略
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Timed out waiting for {target}")]
    ActuatorTimeout { target: String },

    #[error("Selector matched {count} elements, expected exactly one: {target}")]
    AmbiguousTarget { target: String, count: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Actuator failure: {0}")]
    Actuator(String),
}

impl ToolError {
    /// 审计日志中的 outcome 字段
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::UnknownOperation(_) => "unknown_operation",
            ToolError::InvalidArguments { .. } => "invalid_arguments",
            ToolError::ActuatorTimeout { .. } => "timeout",
            ToolError::AmbiguousTarget { .. } => "ambiguous",
            ToolError::NotFound(_) => "not_found",
            ToolError::Actuator(_) => "error",
        }
    }

    /// 由 actuator 错误映射；target 为选择器或操作名
    pub fn from_actuator(err: ActuatorError, target: &str) -> Self {
        match err {
            ActuatorError::Timeout => ToolError::ActuatorTimeout {
                target: target.to_string(),
            },
            ActuatorError::Ambiguous { count } => ToolError::AmbiguousTarget {
                target: target.to_string(),
                count,
            },
            ActuatorError::NotFound(what) => ToolError::NotFound(what),
            ActuatorError::Failed(msg) => ToolError::Actuator(msg),
        }
    }
}

/// 终止本次运行的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 决策策略（LLM）调用失败：网络 / 鉴权 / 限流；不做自动重试
    #[error("Policy unavailable: {0}")]
    PolicyUnavailable(#[from] LlmError),

    #[error("Malformed policy response: {0}")]
    MalformedResponse(String),

    /// 初始化阶段无法读取页面状态等
    #[error("Actuator error: {0}")]
    Actuator(#[from] ActuatorError),
}

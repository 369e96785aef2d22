//! 循环阶段与终止原因

use serde::Serialize;

/// Orchestrator 状态机阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    Init,
    AwaitingResponse,
    HasCalls,
    Confirming,
    Executing,
    Done,
}

/// 正常结束的原因（致命错误走 AgentError）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// 模型不再提出工具调用
    Completed,
    /// 操作员拒绝、无效输入或输入结束
    Declined,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Completed => write!(f, "completed"),
            Termination::Declined => write!(f, "declined"),
        }
    }
}

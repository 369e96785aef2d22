//! Agent 编排器：主控循环
//!
//! INIT -> AWAITING_RESPONSE -> HAS_CALLS -> CONFIRMING -> EXECUTING -> AWAITING_RESPONSE ... -> DONE
//!
//! 独占页面执行器、动作历史与确认闸门；同一时刻只有一个挂起点（模型往返 / 页面操作 / 确认输入）。
//! 一批调用按模型提出的顺序逐个执行，结果按同一顺序写回。

use serde::Serialize;

use crate::actuator::snapshot::START_LABEL;
use crate::actuator::Actuator;
use crate::core::{ActionHistory, AgentError, ConfirmationGate, HistoryEntry, LoopPhase, Termination};
use crate::llm::{ConversationSession, Response};
use crate::tools::registry::capture_best_effort;
use crate::tools::{ToolRegistry, ToolResult};

/// 文本日志预览最大字符数
const TEXT_PREVIEW_CHARS: usize = 300;

/// 运行结束时交给调用方的报告
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub summary: String,
    pub history: Vec<HistoryEntry>,
    pub termination: Termination,
    /// 实际执行的批次数
    pub batches: usize,
    /// (prompt_tokens, completion_tokens, total_tokens)
    pub token_usage: (u64, u64, u64),
}

pub struct Orchestrator {
    actuator: Box<dyn Actuator>,
    registry: ToolRegistry,
    session: ConversationSession,
    gate: ConfirmationGate,
    history: ActionHistory,
    system_prompt: String,
    start_url: Option<String>,
    phase: LoopPhase,
}

impl Orchestrator {
    pub fn new(
        actuator: Box<dyn Actuator>,
        registry: ToolRegistry,
        session: ConversationSession,
        gate: ConfirmationGate,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            actuator,
            registry,
            session,
            gate,
            history: ActionHistory::new(),
            system_prompt: system_prompt.into(),
            start_url: None,
            phase: LoopPhase::Init,
        }
    }

    /// INIT 阶段先导航到该地址；未设置时直接读取当前页面
    pub fn with_start_url(mut self, url: impl Into<String>) -> Self {
        self.start_url = Some(url.into());
        self
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn history(&self) -> &ActionHistory {
        &self.history
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    fn transition(&mut self, next: LoopPhase) {
        tracing::debug!(from = ?self.phase, to = ?next, "phase");
        self.phase = next;
    }

    /// 驱动整个循环直到 DONE；策略不可用或回复格式错误时返回 Err
    pub async fn run(&mut self) -> Result<RunReport, AgentError> {
        self.transition(LoopPhase::Init);
        let state = match self.start_url.clone() {
            Some(url) => self.actuator.navigate(&url).await?,
            None => self.actuator.current_state().await?,
        };
        capture_best_effort(self.actuator.as_mut(), START_LABEL).await;

        let tools = self.registry.specs();
        tracing::info!(url = %state.url, tools = tools.len(), "making initial query to policy");
        let mut response = self
            .session
            .prompt(&self.system_prompt, &state.render(), &tools)
            .await?;
        log_response(&response);
        self.transition(LoopPhase::AwaitingResponse);

        let mut batches = 0usize;
        let termination = loop {
            let calls = response.pending_tool_calls().to_vec();
            if calls.is_empty() {
                break Termination::Completed;
            }
            self.transition(LoopPhase::HasCalls);

            self.transition(LoopPhase::Confirming);
            if !self.gate.confirm().await {
                tracing::info!(batches, "operator declined, stopping");
                break Termination::Declined;
            }

            self.transition(LoopPhase::Executing);
            let mut results: Vec<ToolResult> = Vec::with_capacity(calls.len());
            for call in &calls {
                let result = self
                    .registry
                    .execute(self.actuator.as_mut(), &mut self.history, call)
                    .await;
                results.push(result);
            }
            batches += 1;
            capture_best_effort(self.actuator.as_mut(), "step").await;

            let failed = results.iter().filter(|r| !r.success()).count();
            tracing::info!(batch = batches, calls = results.len(), failed, "batch executed");

            response = self.session.feed(&results, &self.system_prompt).await?;
            log_response(&response);
            self.transition(LoopPhase::AwaitingResponse);
        };

        self.transition(LoopPhase::Done);
        capture_best_effort(self.actuator.as_mut(), "final").await;

        Ok(RunReport {
            summary: response.text_summary().to_string(),
            history: self.history.entries().to_vec(),
            termination,
            batches,
            token_usage: self.session.token_usage(),
        })
    }

    /// 关闭执行器（页面 / 浏览器）
    pub async fn shutdown(mut self) -> Result<(), AgentError> {
        self.actuator.close().await?;
        Ok(())
    }
}

fn log_response(response: &Response) {
    let text = response.text_summary();
    let preview: String = text.chars().take(TEXT_PREVIEW_CHARS).collect();
    let names: Vec<&str> = response
        .pending_tool_calls()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    tracing::info!(text = %preview, calls = ?names, "policy response");
}

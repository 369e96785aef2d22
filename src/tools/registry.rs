//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找。
//! execute 在固定超时内调用工具，把所有失败转为结构化的 ToolResult；每次调用写入一条历史并输出 JSON 审计日志。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::timeout;

use crate::actuator::Actuator;
use crate::core::{ActionHistory, ToolError};
use crate::llm::{ToolCall, ToolSpec};

/// 截图本身的超时（与工具超时独立）
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（模型按此名调用）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 是否改变页面状态；为 true 时每次调用后截图留档
    fn is_mutating(&self) -> bool {
        false
    }

    /// 写入历史的参数摘要
    fn summarize(&self, _args: &Value) -> String {
        String::new()
    }

    async fn execute(&self, actuator: &mut dyn Actuator, args: Value) -> Result<String, ToolError>;
}

/// 把 JSON 参数反序列化为工具的参数结构；缺少必填字段等返回 InvalidArguments
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() {
        serde_json::json!({})
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

/// 一次工具调用的结果；创建后不可修改
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    call_id: String,
    name: String,
    outcome: Result<String, ToolError>,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            outcome: Ok(output.into()),
        }
    }

    pub fn failed(call_id: impl Into<String>, name: impl Into<String>, error: ToolError) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            outcome: Err(error),
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error(&self) -> Option<&ToolError> {
        self.outcome.as_ref().err()
    }

    /// 回传给模型的文本：成功为工具输出，失败为 "Error: ..."
    pub fn content(&self) -> String {
        match &self.outcome {
            Ok(output) => output.clone(),
            Err(e) => format!("Error: {e}"),
        }
    }
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，执行时施加统一超时
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    deadline: Duration,
    max_result_chars: usize,
}

impl ToolRegistry {
    pub fn new(deadline: Duration) -> Self {
        Self {
            tools: HashMap::new(),
            deadline,
            max_result_chars: usize::MAX,
        }
    }

    pub fn with_max_result_chars(mut self, max_result_chars: usize) -> Self {
        self.max_result_chars = max_result_chars;
        self
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// 暴露给模型的工具描述（按名称排序，保证每轮一致）
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tool_names()
            .into_iter()
            .filter_map(|name| {
                self.tools.get(&name).map(|tool| ToolSpec {
                    description: tool.description().to_string(),
                    parameters: tool.parameters_schema(),
                    name,
                })
            })
            .collect()
    }

    /// 执行一次工具调用；失败不会向上传播，而是成为 success=false 的 ToolResult
    pub async fn execute(
        &self,
        actuator: &mut dyn Actuator,
        history: &mut ActionHistory,
        call: &ToolCall,
    ) -> ToolResult {
        let start = Instant::now();

        let Some(tool) = self.get(&call.name) else {
            let seq = history.record(&call.name, &args_preview(&call.arguments), false);
            let err = ToolError::UnknownOperation(call.name.clone());
            audit(&call.name, seq, Err(&err), start, &call.arguments);
            return ToolResult::failed(&call.id, &call.name, err);
        };

        let summary = tool.summarize(&call.arguments);
        let target = if summary.is_empty() {
            call.name.clone()
        } else {
            summary.clone()
        };

        let outcome = match timeout(self.deadline, tool.execute(actuator, call.arguments.clone())).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::ActuatorTimeout { target }),
        };

        if tool.is_mutating() {
            capture_best_effort(actuator, tool.name()).await;
        }

        let seq = history.record(tool.name(), &summary, outcome.is_ok());
        audit(tool.name(), seq, outcome.as_ref().map(|_| ()), start, &call.arguments);

        match outcome {
            Ok(output) => ToolResult::ok(&call.id, tool.name(), truncate(output, self.max_result_chars)),
            Err(e) => {
                tracing::warn!(tool = %tool.name(), error = %e, "tool failed");
                ToolResult::failed(&call.id, tool.name(), e)
            }
        }
    }
}

/// 截图失败只记日志，不影响调用结果
pub async fn capture_best_effort(actuator: &mut dyn Actuator, label: &str) {
    match timeout(SNAPSHOT_TIMEOUT, actuator.capture_snapshot(label)).await {
        Ok(Ok(path)) => tracing::debug!(label, path = %path.display(), "snapshot"),
        Ok(Err(e)) => tracing::warn!(label, error = %e, "snapshot failed"),
        Err(_) => tracing::warn!(label, "snapshot timed out"),
    }
}

fn audit(tool: &str, seq: usize, result: Result<(), &ToolError>, start: Instant, args: &Value) {
    let (ok, outcome) = match result {
        Ok(()) => (true, "ok"),
        Err(e) => (false, e.kind()),
    };
    let audit = serde_json::json!({
        "event": "tool_audit",
        "seq": seq,
        "tool": tool,
        "ok": ok,
        "outcome": outcome,
        "duration_ms": start.elapsed().as_millis() as u64,
        "args_preview": args_preview(args),
    });
    tracing::info!(audit = %audit, "tool");
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

fn truncate(output: String, max_chars: usize) -> String {
    if output.chars().count() > max_chars {
        output.chars().take(max_chars).collect::<String>() + "\n...[truncated]"
    } else {
        output
    }
}

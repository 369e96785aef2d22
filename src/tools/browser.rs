//! 浏览器工具集：click / go_back / get_state
//!
//! 参数结构由 schemars 生成 JSON Schema 暴露给模型；返回值统一为当前页面状态文本。

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::Value;

use crate::actuator::{Actuator, Selector};
use crate::core::ToolError;
use crate::tools::{parse_args, Tool};

/// click 的参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ClickArgs {
    /// CSS 或 XPath 选择器，建议加前缀 `css=` / `xpath=`；必须恰好匹配一个元素
    pub selector: String,
    /// 所点击元素的简短说明（仅用于日志）
    #[serde(default)]
    pub description: String,
}

/// 无参数工具的参数：只接受 JSON 对象（null 视为 {}）
#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoArgs {}

/// schemars 的根 schema 转为 function parameters（去掉 $schema / title）
pub fn args_schema<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| {
        serde_json::json!({ "type": "object", "properties": {} })
    });
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    schema
}

pub struct ClickTool;

#[async_trait]
impl Tool for ClickTool {
    fn name(&self) -> &str {
        "click"
    }

    fn description(&self) -> &str {
        "Given a CSS or XPATH selector, click on that element and return the HTML of the resulting page. \
         For clarity, prefix with `css=` or `xpath=`."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<ClickArgs>()
    }

    fn is_mutating(&self) -> bool {
        true
    }

    fn summarize(&self, args: &Value) -> String {
        args.get("selector")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    async fn execute(&self, actuator: &mut dyn Actuator, args: Value) -> Result<String, ToolError> {
        let args: ClickArgs = parse_args(self.name(), args)?;
        if args.selector.trim().is_empty() {
            return Err(ToolError::InvalidArguments {
                tool: self.name().to_string(),
                reason: "selector must not be empty".to_string(),
            });
        }
        tracing::debug!(selector = %args.selector, description = %args.description, "clicking");
        let state = actuator
            .click(&Selector::parse(&args.selector))
            .await
            .map_err(|e| ToolError::from_actuator(e, &args.selector))?;
        Ok(state.render())
    }
}

pub struct GoBackTool;

#[async_trait]
impl Tool for GoBackTool {
    fn name(&self) -> &str {
        "go_back"
    }

    fn description(&self) -> &str {
        "Go back one page and return its HTML."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<NoArgs>()
    }

    fn is_mutating(&self) -> bool {
        true
    }

    async fn execute(&self, actuator: &mut dyn Actuator, args: Value) -> Result<String, ToolError> {
        let NoArgs {} = parse_args(self.name(), args)?;
        tracing::debug!("going back");
        let state = actuator
            .go_back()
            .await
            .map_err(|e| ToolError::from_actuator(e, self.name()))?;
        Ok(state.render())
    }
}

pub struct GetStateTool;

#[async_trait]
impl Tool for GetStateTool {
    fn name(&self) -> &str {
        "get_state"
    }

    fn description(&self) -> &str {
        "Get the current page HTML without changing anything."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<NoArgs>()
    }

    async fn execute(&self, actuator: &mut dyn Actuator, args: Value) -> Result<String, ToolError> {
        let NoArgs {} = parse_args(self.name(), args)?;
        let state = actuator
            .current_state()
            .await
            .map_err(|e| ToolError::from_actuator(e, self.name()))?;
        crate::tools::registry::capture_best_effort(actuator, "state").await;
        Ok(state.render())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::actuator::{MemoryActuator, MemoryPage};
    use crate::core::ActionHistory;
    use crate::llm::ToolCall;
    use crate::tools::ToolRegistry;
    use serde_json::json;

    const HOME: &str = "https://www.oberlin.edu/";
    const CS: &str = "https://www.oberlin.edu/arts-and-sciences/departments/computer-science";

    fn site() -> MemoryActuator {
        MemoryActuator::new(MemoryPage::new(HOME, "Oberlin", "<a href=cs>Computer Science</a>"))
            .page(MemoryPage::new(CS, "Computer Science", "<h2>Faculty</h2>"))
            .link(HOME, "css=a[href=cs]", CS)
            .ambiguous(HOME, "css=a", 12)
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new(Duration::from_millis(200));
        registry.register(ClickTool);
        registry.register(GoBackTool);
        registry.register(GetStateTool);
        registry
    }

    #[test]
    fn test_click_schema_requires_selector() {
        let schema = ClickTool.parameters_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["selector"]));
        assert!(schema["properties"]["description"].is_object());
        assert!(schema.get("$schema").is_none());
    }

    #[tokio::test]
    async fn test_click_navigates_and_records_selector() {
        let mut act = site();
        let log = act.snapshot_log();
        let mut history = ActionHistory::new();
        let call = ToolCall::new("c1", "click", json!({"selector": "css=a[href=cs]", "description": "CS link"}));
        let result = registry().execute(&mut act, &mut history, &call).await;
        assert!(result.success());
        assert!(result.content().contains("<h2>Faculty</h2>"));
        assert_eq!(history.entries()[0].summary, "css=a[href=cs]");
        assert_eq!(*log.lock().unwrap(), vec!["click".to_string()]);
    }

    #[tokio::test]
    async fn test_ambiguous_selector() {
        let mut act = site();
        let mut history = ActionHistory::new();
        let call = ToolCall::new("c1", "click", json!({"selector": "a"}));
        let result = registry().execute(&mut act, &mut history, &call).await;
        assert_eq!(
            result.error(),
            Some(&ToolError::AmbiguousTarget { target: "a".into(), count: 12 })
        );
    }

    #[tokio::test]
    async fn test_go_back_without_history_not_found() {
        let mut act = site();
        let mut history = ActionHistory::new();
        let call = ToolCall::new("b1", "go_back", json!({}));
        let result = registry().execute(&mut act, &mut history, &call).await;
        assert!(matches!(result.error(), Some(ToolError::NotFound(_))));
        assert_eq!(history.entries()[0].summary, "");
    }

    #[tokio::test]
    async fn test_same_call_twice_same_classification() {
        let mut act = site();
        let mut history = ActionHistory::new();
        let registry = registry();
        let missing = ToolCall::new("m", "click", json!({"selector": "#missing"}));
        let first = registry.execute(&mut act, &mut history, &missing).await;
        let second = registry.execute(&mut act, &mut history, &missing).await;
        assert_eq!(first.success(), second.success());
        assert_eq!(first.error().map(ToolError::kind), Some("timeout"));
        assert_eq!(second.error().map(ToolError::kind), Some("timeout"));

        let state = ToolCall::new("s", "get_state", json!(null));
        let first = registry.execute(&mut act, &mut history, &state).await;
        let second = registry.execute(&mut act, &mut history, &state).await;
        assert!(first.success() && second.success());
        assert_eq!(history.len(), 4);
    }

    #[tokio::test]
    async fn test_no_arg_tools_reject_non_object_arguments() {
        let mut act = site();
        let mut history = ActionHistory::new();
        let registry = registry();
        let go = ToolCall::new("c1", "click", json!({"selector": "css=a[href=cs]"}));
        assert!(registry.execute(&mut act, &mut history, &go).await.success());

        for (name, args) in [
            ("get_state", Value::String("{broken".into())),
            ("get_state", json!([1, 2])),
            ("go_back", Value::String("{broken".into())),
        ] {
            let call = ToolCall::new("x", name, args);
            let result = registry.execute(&mut act, &mut history, &call).await;
            assert!(
                matches!(result.error(), Some(ToolError::InvalidArguments { .. })),
                "{name}: {:?}",
                result.error()
            );
        }

        // go_back 未执行：仍停留在 CS 页面
        let state = ToolCall::new("s", "get_state", json!({}));
        let result = registry.execute(&mut act, &mut history, &state).await;
        assert!(result.content().contains("<h2>Faculty</h2>"));
    }

    #[test]
    fn test_no_arg_schema_is_object() {
        assert_eq!(GoBackTool.parameters_schema()["type"], "object");
        assert_eq!(GetStateTool.parameters_schema()["type"], "object");
    }

    #[tokio::test]
    async fn test_snapshot_failure_does_not_fail_click() {
        let mut act = site().failing_snapshots();
        let mut history = ActionHistory::new();
        let call = ToolCall::new("c1", "click", json!({"selector": "css=a[href=cs]"}));
        let result = registry().execute(&mut act, &mut history, &call).await;
        assert!(result.success());
    }
}

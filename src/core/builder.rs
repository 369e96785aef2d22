//! Agent 构建器：由配置组装 Orchestrator 的各个组件

use std::sync::Arc;
use std::time::Duration;

use crate::actuator::Actuator;
use crate::config::{load_system_prompt, AppConfig};
use crate::core::{ConfirmationGate, OperatorInput, Orchestrator};
use crate::llm::{ConversationSession, MockPolicyClient, OpenAiClient, PolicyClient, ToolVisibility};
use crate::tools::browser_registry;

/// 根据配置与环境变量选择策略后端（OpenAI 兼容 / Mock）
pub fn create_policy_from_config(cfg: &AppConfig) -> Arc<dyn PolicyClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let api_key = std::env::var("OPENAI_API_KEY").ok();

    match (provider.as_str(), api_key) {
        ("mock", _) => {
            tracing::info!("Using Mock policy");
            Arc::new(MockPolicyClient)
        }
        (_, Some(key)) => {
            tracing::info!(model = %cfg.llm.model, base_url = ?cfg.llm.base_url, "Using OpenAI-compatible policy");
            Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                Some(&key),
                cfg.llm.timeouts.request,
            ))
        }
        (_, None) => {
            tracing::warn!("No API key set or provider unknown, using Mock policy");
            Arc::new(MockPolicyClient)
        }
    }
}

pub struct AgentBuilder {
    config: AppConfig,
    policy: Option<Arc<dyn PolicyClient>>,
    system_prompt: Option<String>,
}

impl AgentBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            policy: None,
            system_prompt: None,
        }
    }

    /// 覆盖策略客户端（默认按配置创建）
    pub fn with_policy(mut self, policy: Arc<dyn PolicyClient>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn build(self, actuator: Box<dyn Actuator>, input: Box<dyn OperatorInput>) -> Orchestrator {
        let cfg = self.config;
        let policy = self
            .policy
            .unwrap_or_else(|| create_policy_from_config(&cfg));
        let visibility = if cfg.llm.resend_tools_each_turn {
            ToolVisibility::EveryTurn
        } else {
            ToolVisibility::FirstTurnOnly
        };
        let registry = browser_registry(
            Duration::from_secs(cfg.browser.action_timeout_secs),
            cfg.agent.max_result_chars,
        );
        let system_prompt = self
            .system_prompt
            .unwrap_or_else(|| load_system_prompt(&cfg));

        Orchestrator::new(
            actuator,
            registry,
            ConversationSession::new(policy, visibility),
            ConfirmationGate::with_skip_budget(input, cfg.agent.initial_skip),
            system_prompt,
        )
        .with_start_url(cfg.app.start_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{MemoryActuator, MemoryPage};
    use crate::core::{ScriptedInput, Termination};
    use crate::llm::{PolicyReply, ScriptedPolicy, ToolCall};
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_provider_stops_immediately() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        cfg.app.start_url = "https://a.test/".to_string();
        let act = MemoryActuator::new(MemoryPage::new("https://a.test/", "Home", "<p/>"));

        let mut orch = AgentBuilder::new(cfg).build(Box::new(act), Box::new(ScriptedInput::default()));
        let report = orch.run().await.unwrap();
        assert_eq!(report.termination, Termination::Completed);
        assert!(report.summary.starts_with("Mock policy"));
        assert!(report.history.is_empty());
    }

    #[tokio::test]
    async fn test_initial_skip_from_config() {
        let mut cfg = AppConfig::default();
        cfg.agent.initial_skip = 1;
        cfg.app.start_url = "https://a.test/".to_string();
        let act = MemoryActuator::new(MemoryPage::new("https://a.test/", "Home", "<p/>"));
        let state = || ToolCall::new(uuid::Uuid::new_v4().to_string(), "get_state", json!({}));
        let policy = Arc::new(ScriptedPolicy::new(vec![
            Ok(PolicyReply::with_calls("", vec![state()])),
            Ok(PolicyReply::with_calls("", vec![state()])),
        ]));

        // 预算 1：第一批自动放行，第二批读取输入时 EOF -> 拒绝
        let mut orch = AgentBuilder::new(cfg)
            .with_policy(policy)
            .with_system_prompt("sys")
            .build(Box::new(act), Box::new(ScriptedInput::default()));
        let report = orch.run().await.unwrap();
        assert_eq!(report.termination, Termination::Declined);
        assert_eq!(report.batches, 1);
        assert_eq!(report.history.len(), 1);
    }
}

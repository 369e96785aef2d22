//! 执行器（Actuator）：智能体实际操作的外部系统（这里是一个浏览器页面）
//!
//! - **chrome**: Headless Chrome 实现（feature "browser"）
//! - **lane**: 阻塞调用串行通道（chrome 使用）
//! - **memory**: 内存中的页面图，用于测试与离线运行
//! - **snapshot**: 截图文件命名

#[cfg(feature = "browser")]
pub mod chrome;
pub mod lane;
pub mod memory;
pub mod snapshot;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[cfg(feature = "browser")]
pub use chrome::ChromeActuator;
pub use lane::BlockingLane;
pub use memory::{MemoryActuator, MemoryPage};
pub use snapshot::SnapshotNamer;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActuatorError {
    #[error("operation timed out")]
    Timeout,

    #[error("selector matched {count} elements")]
    Ambiguous { count: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Failed(String),
}

/// 页面状态快照（返回给模型的内容）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageState {
    pub url: String,
    pub title: String,
    /// body 的 inner HTML
    pub content: String,
}

impl PageState {
    /// 拼成喂给模型的文本
    pub fn render(&self) -> String {
        format!("# {}\nURL: {}\n\n{}", self.title, self.url, self.content)
    }
}

/// 元素选择器：`css=` / `xpath=` 前缀，无前缀按 CSS 处理
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix("xpath=") {
            Selector::XPath(rest.trim().to_string())
        } else if let Some(rest) = raw.strip_prefix("css=") {
            Selector::Css(rest.trim().to_string())
        } else if raw.starts_with("//") {
            Selector::XPath(raw.to_string())
        } else {
            Selector::Css(raw.to_string())
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Css(s) => write!(f, "css={s}"),
            Selector::XPath(s) => write!(f, "xpath={s}"),
        }
    }
}

/// 页面执行器：会话期间由 Orchestrator 独占
#[async_trait]
pub trait Actuator: Send {
    async fn navigate(&mut self, url: &str) -> Result<PageState, ActuatorError>;

    async fn current_state(&mut self) -> Result<PageState, ActuatorError>;

    async fn click(&mut self, selector: &Selector) -> Result<PageState, ActuatorError>;

    async fn go_back(&mut self) -> Result<PageState, ActuatorError>;

    /// 截图留档；调用方按 best-effort 处理失败
    async fn capture_snapshot(&mut self, label: &str) -> Result<PathBuf, ActuatorError>;

    async fn close(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }
}

//! 内存页面图：按 URL 存页面，按（当前页, 选择器）存链接
//!
//! 不解析 HTML；未登记的选择器视为等待超时，登记为 ambiguous 的选择器返回多元素错误，
//! 登记为 stall 的选择器永不返回（用于验证调用方的超时）。

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::actuator::{Actuator, ActuatorError, PageState, Selector};

#[derive(Debug, Clone)]
pub struct MemoryPage {
    pub url: String,
    pub title: String,
    pub content: String,
}

impl MemoryPage {
    pub fn new(url: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
        }
    }

    fn state(&self) -> PageState {
        PageState {
            url: self.url.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
        }
    }
}

#[derive(Debug, Clone)]
enum Link {
    To(String),
    Ambiguous(usize),
    Stall,
}

pub struct MemoryActuator {
    pages: HashMap<String, MemoryPage>,
    links: HashMap<(String, String), Link>,
    current: String,
    back_stack: Vec<String>,
    fail_snapshots: bool,
    snapshots: Arc<Mutex<Vec<String>>>,
}

impl MemoryActuator {
    pub fn new(start: MemoryPage) -> Self {
        let current = start.url.clone();
        let mut pages = HashMap::new();
        pages.insert(start.url.clone(), start);
        Self {
            pages,
            links: HashMap::new(),
            current,
            back_stack: Vec::new(),
            fail_snapshots: false,
            snapshots: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn page(mut self, page: MemoryPage) -> Self {
        self.pages.insert(page.url.clone(), page);
        self
    }

    pub fn link(mut self, from: &str, selector: &str, to: &str) -> Self {
        self.links
            .insert(Self::key(from, selector), Link::To(to.to_string()));
        self
    }

    pub fn ambiguous(mut self, from: &str, selector: &str, count: usize) -> Self {
        self.links.insert(Self::key(from, selector), Link::Ambiguous(count));
        self
    }

    pub fn stall(mut self, from: &str, selector: &str) -> Self {
        self.links.insert(Self::key(from, selector), Link::Stall);
        self
    }

    /// 截图一律失败（验证 best-effort 行为）
    pub fn failing_snapshots(mut self) -> Self {
        self.fail_snapshots = true;
        self
    }

    /// 已截图的 label 记录（actuator 移交给 Orchestrator 后仍可查看）
    pub fn snapshot_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.snapshots)
    }

    fn key(from: &str, selector: &str) -> (String, String) {
        (from.to_string(), Selector::parse(selector).to_string())
    }

    fn state_of(&self, url: &str) -> Result<PageState, ActuatorError> {
        self.pages
            .get(url)
            .map(MemoryPage::state)
            .ok_or_else(|| ActuatorError::NotFound(format!("page {url}")))
    }

    fn known_pages(&self) -> HashSet<&str> {
        self.pages.keys().map(String::as_str).collect()
    }
}

#[async_trait]
impl Actuator for MemoryActuator {
    async fn navigate(&mut self, url: &str) -> Result<PageState, ActuatorError> {
        if !self.known_pages().contains(url) {
            return Err(ActuatorError::Failed(format!("Navigate failed: no page at {url}")));
        }
        let previous = std::mem::replace(&mut self.current, url.to_string());
        self.back_stack.push(previous);
        self.state_of(url)
    }

    async fn current_state(&mut self) -> Result<PageState, ActuatorError> {
        self.state_of(&self.current)
    }

    async fn click(&mut self, selector: &Selector) -> Result<PageState, ActuatorError> {
        let key = (self.current.clone(), selector.to_string());
        match self.links.get(&key).cloned() {
            Some(Link::To(target)) => {
                let previous = std::mem::replace(&mut self.current, target.clone());
                self.back_stack.push(previous);
                self.state_of(&target)
            }
            Some(Link::Ambiguous(count)) => Err(ActuatorError::Ambiguous { count }),
            Some(Link::Stall) => std::future::pending().await,
            None => Err(ActuatorError::Timeout),
        }
    }

    async fn go_back(&mut self) -> Result<PageState, ActuatorError> {
        let previous = self
            .back_stack
            .pop()
            .ok_or_else(|| ActuatorError::NotFound("no previous page".to_string()))?;
        self.current = previous;
        self.state_of(&self.current)
    }

    async fn capture_snapshot(&mut self, label: &str) -> Result<PathBuf, ActuatorError> {
        if self.fail_snapshots {
            return Err(ActuatorError::Failed("screenshot unavailable".to_string()));
        }
        let mut log = self
            .snapshots
            .lock()
            .map_err(|e| ActuatorError::Failed(e.to_string()))?;
        log.push(label.to_string());
        Ok(PathBuf::from(format!("memory/{:03}-{}.png", log.len(), label)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> MemoryActuator {
        MemoryActuator::new(MemoryPage::new("https://a.test/", "Home", "<a id=cs>CS</a>"))
            .page(MemoryPage::new("https://a.test/cs", "CS", "<ul>faculty</ul>"))
            .link("https://a.test/", "#cs", "https://a.test/cs")
            .ambiguous("https://a.test/", "a", 4)
    }

    #[tokio::test]
    async fn test_click_and_back() {
        let mut act = site();
        let state = act.click(&Selector::parse("css=#cs")).await.unwrap();
        assert_eq!(state.url, "https://a.test/cs");
        let state = act.go_back().await.unwrap();
        assert_eq!(state.url, "https://a.test/");
        assert_eq!(
            act.go_back().await,
            Err(ActuatorError::NotFound("no previous page".to_string()))
        );
    }

    #[tokio::test]
    async fn test_missing_and_ambiguous() {
        let mut act = site();
        assert_eq!(
            act.click(&Selector::parse("#nope")).await,
            Err(ActuatorError::Timeout)
        );
        assert_eq!(
            act.click(&Selector::parse("a")).await,
            Err(ActuatorError::Ambiguous { count: 4 })
        );
        assert_eq!(act.current_state().await.unwrap().title, "Home");
    }

    #[tokio::test]
    async fn test_snapshot_log_shared() {
        let mut act = site();
        let log = act.snapshot_log();
        act.capture_snapshot("click").await.unwrap();
        act.capture_snapshot("step").await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["click".to_string(), "step".to_string()]);
    }
}

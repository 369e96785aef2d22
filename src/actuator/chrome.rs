//! Headless Chrome 执行器
//!
//! 需启用 feature "browser" 且系统已安装 Chrome/Chromium。
//! headless_chrome 为同步 API，所有页面操作经 BlockingLane 放到 spawn_blocking 中串行执行。
//! 每个阶段（轮询 / 等待跳转）都按单次操作超时分配预算，操作总能在外层超时前返回。

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};

use crate::actuator::{Actuator, ActuatorError, BlockingLane, PageState, Selector, SnapshotNamer};
use crate::config::BrowserSection;

/// 选择器轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// 点击 / 后退后等待页面开始跳转的时间
const SETTLE_DELAY: Duration = Duration::from_millis(300);

pub struct ChromeActuator {
    // 持有 Browser 以保持进程存活
    _browser: Browser,
    lane: BlockingLane<Tab>,
    deadline: Duration,
    snapshots: SnapshotNamer,
}

/// 把单次操作超时拆成 (选择器轮询, 等待跳转) 两段预算：轮询占 3/5，
/// 剩余的一半用于等待跳转，其余留给读取页面
fn click_budgets(deadline: Duration) -> (Duration, Duration) {
    let poll = deadline * 3 / 5;
    let settle = deadline.saturating_sub(poll) / 2;
    (poll, settle)
}

fn failed(context: &str) -> impl Fn(anyhow::Error) -> ActuatorError + '_ {
    move |e| ActuatorError::Failed(format!("{context}: {e}"))
}

impl ChromeActuator {
    /// 启动浏览器并打开一个标签页（阻塞调用，调用方应放在 spawn_blocking 中）
    pub fn launch(cfg: &BrowserSection, snapshots: SnapshotNamer) -> Result<Self, ActuatorError> {
        let options = LaunchOptions::default_builder()
            .headless(cfg.headless)
            .window_size(Some((cfg.window_width, cfg.window_height)))
            .build()
            .map_err(|e| ActuatorError::Failed(format!("Invalid launch options: {e}")))?;
        let browser = Browser::new(options).map_err(failed("Chrome launch failed"))?;
        let tab = browser.new_tab().map_err(failed("Browser tab failed"))?;
        let deadline = Duration::from_secs(cfg.action_timeout_secs);
        tab.set_default_timeout(deadline);

        tracing::info!(
            headless = cfg.headless,
            width = cfg.window_width,
            height = cfg.window_height,
            "chrome launched"
        );

        Ok(Self {
            _browser: browser,
            lane: BlockingLane::new(tab),
            deadline,
            snapshots,
        })
    }

    fn read_state(tab: &Tab) -> Result<PageState, ActuatorError> {
        let url = tab.get_url();
        let title = tab.get_title().map_err(failed("Get title failed"))?;
        let content = tab
            .evaluate("document.body ? document.body.innerHTML : ''", false)
            .map_err(failed("Get content failed"))?
            .value
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        Ok(PageState { url, title, content })
    }

    /// 在 budget 内等待可能发生的跳转；超时不算失败（点击已生效，页面可能没有跳转）
    fn settle(tab: &Tab, budget: Duration, deadline: Duration) {
        let delay = SETTLE_DELAY.min(budget);
        std::thread::sleep(delay);
        tab.set_default_timeout(budget.saturating_sub(delay));
        if let Err(e) = tab.wait_until_navigated() {
            tracing::debug!(error = %e, "navigation wait ended early");
        }
        tab.set_default_timeout(deadline);
    }

    /// 轮询直到恰好匹配一个元素并点击；多于一个立即报 Ambiguous，超过 deadline 报 Timeout
    fn click_blocking(tab: &Tab, selector: &Selector, deadline: Duration) -> Result<(), ActuatorError> {
        let started = Instant::now();
        loop {
            let found = match selector {
                Selector::Css(css) => tab.find_elements(css),
                Selector::XPath(xpath) => tab.find_elements_by_xpath(xpath),
            };
            if let Ok(elements) = found {
                match elements.len() {
                    0 => {}
                    1 => {
                        elements[0].click().map_err(failed("Click failed"))?;
                        return Ok(());
                    }
                    count => return Err(ActuatorError::Ambiguous { count }),
                }
            }
            if started.elapsed() >= deadline {
                return Err(ActuatorError::Timeout);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

#[async_trait]
impl Actuator for ChromeActuator {
    async fn navigate(&mut self, url: &str) -> Result<PageState, ActuatorError> {
        let url = url.to_string();
        tracing::info!(url = %url, "browser navigate");
        self.lane
            .run(move |tab| {
                tab.navigate_to(&url).map_err(failed("Navigate failed"))?;
                tab.wait_until_navigated()
                    .map_err(failed("Page load failed"))?;
                Self::read_state(tab)
            })
            .await
    }

    async fn current_state(&mut self) -> Result<PageState, ActuatorError> {
        self.lane.run(|tab| Self::read_state(tab)).await
    }

    async fn click(&mut self, selector: &Selector) -> Result<PageState, ActuatorError> {
        let selector = selector.clone();
        let deadline = self.deadline;
        self.lane
            .run(move |tab| {
                let (poll, settle) = click_budgets(deadline);
                Self::click_blocking(tab, &selector, poll)?;
                Self::settle(tab, settle, deadline);
                Self::read_state(tab)
            })
            .await
    }

    async fn go_back(&mut self) -> Result<PageState, ActuatorError> {
        let deadline = self.deadline;
        self.lane
            .run(move |tab| {
                let depth = tab
                    .evaluate("window.history.length", false)
                    .map_err(failed("History lookup failed"))?
                    .value
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                let before = tab.get_url();
                if depth <= 1 {
                    return Err(ActuatorError::NotFound("no previous page".to_string()));
                }
                tab.evaluate("window.history.back()", false)
                    .map_err(failed("Go back failed"))?;
                let (_, settle) = click_budgets(deadline);
                Self::settle(tab, settle, deadline);
                let state = Self::read_state(tab)?;
                // history.length 不会因后退而减少；地址未变即已在第一条记录
                if state.url == before {
                    return Err(ActuatorError::NotFound("no previous page".to_string()));
                }
                Ok(state)
            })
            .await
    }

    async fn capture_snapshot(&mut self, label: &str) -> Result<PathBuf, ActuatorError> {
        let path = self.snapshots.next_path(label);
        let target = path.clone();
        self.lane
            .run(move |tab| {
                let png = tab
                    .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
                    .map_err(failed("Screenshot failed"))?;
                std::fs::write(&target, png)
                    .map_err(|e| ActuatorError::Failed(format!("Write {}: {e}", target.display())))
            })
            .await?;
        tracing::info!(path = %path.display(), "screenshot saved");
        Ok(path)
    }

    async fn close(&mut self) -> Result<(), ActuatorError> {
        self.lane
            .run(|tab| {
                tab.close(true).map_err(failed("Close tab failed"))?;
                Ok(())
            })
            .await
    }
}

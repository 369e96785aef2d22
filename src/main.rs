//! Bee Browse - 网页导航智能体
//!
//! 入口：初始化日志、加载配置、启动浏览器执行器并运行主控循环，结束时输出最终回复与动作历史。
//!
//! 用法：`bee-browse [CONFIG.toml | START_URL]`

use std::path::PathBuf;

use anyhow::{bail, Context};
use bee_browse::actuator::{Actuator, SnapshotNamer};
use bee_browse::config::{load_config, AppConfig};
use bee_browse::core::{AgentBuilder, StdinInput};
use bee_browse::{observability, report};

/// 唯一的位置参数：已存在的文件或 .toml 视为配置路径，否则视为起始 URL
enum Target {
    Config(PathBuf),
    StartUrl(String),
}

fn parse_target() -> anyhow::Result<Option<Target>> {
    let mut args = std::env::args().skip(1);
    let first = args.next();
    if args.next().is_some() {
        bail!("Usage: bee-browse [CONFIG.toml | START_URL]");
    }
    Ok(first.map(|arg| {
        let path = PathBuf::from(&arg);
        if path.is_file() || arg.ends_with(".toml") {
            Target::Config(path)
        } else {
            Target::StartUrl(arg)
        }
    }))
}

#[cfg(feature = "browser")]
async fn launch_actuator(cfg: &AppConfig, snapshots: SnapshotNamer) -> anyhow::Result<Box<dyn Actuator>> {
    let section = cfg.browser.clone();
    let chrome = tokio::task::spawn_blocking(move || {
        bee_browse::actuator::ChromeActuator::launch(&section, snapshots)
    })
    .await
    .context("Browser launch task panicked")?
    .context("Failed to launch headless Chrome")?;
    Ok(Box::new(chrome))
}

#[cfg(not(feature = "browser"))]
async fn launch_actuator(_cfg: &AppConfig, _snapshots: SnapshotNamer) -> anyhow::Result<Box<dyn Actuator>> {
    bail!("bee-browse was built without a browser; rebuild with `--features browser`")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let target = parse_target()?;
    let config_path = match &target {
        Some(Target::Config(path)) => Some(path.clone()),
        _ => None,
    };
    let mut cfg = load_config(config_path).context("Failed to load config")?;
    if let Some(Target::StartUrl(url)) = target {
        cfg.app.start_url = url;
    }

    let run_id = uuid::Uuid::new_v4();
    tracing::info!(%run_id, start_url = %cfg.app.start_url, model = %cfg.llm.model, "Starting browse agent");

    let snapshots = SnapshotNamer::new(&cfg.app.screenshots_dir);
    snapshots
        .ensure_dir()
        .with_context(|| format!("Failed to create {}", snapshots.dir().display()))?;
    let actuator = launch_actuator(&cfg, snapshots).await?;

    let report_path = cfg.app.report_path.clone();
    let mut orchestrator = AgentBuilder::new(cfg).build(actuator, Box::new(StdinInput::new()));

    let outcome = orchestrator.run().await;
    if let Err(e) = orchestrator.shutdown().await {
        tracing::warn!(error = %e, "Failed to close browser");
    }
    let run = outcome.context("Agent run failed")?;

    print!("{}", report::render_text(&run));
    if let Some(path) = report_path {
        report::write_json(&run, &path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        tracing::info!(%run_id, path = %path.display(), "Report written");
    }
    Ok(())
}

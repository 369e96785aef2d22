//! 运行报告：最终回复 + 动作历史（文本输出与可选 JSON 文件）

use std::fmt::Write as _;
use std::path::Path;

use crate::core::RunReport;

/// 终端输出格式
pub fn render_text(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Final response:\n{}\n", report.summary);
    let _ = writeln!(out, "Steps taken:");
    for entry in &report.history {
        let mark = if entry.succeeded { "" } else { " (failed)" };
        let _ = writeln!(out, "- {}: {}{}", entry.operation, entry.summary, mark);
    }
    out
}

/// 附带终止原因与时间戳的 JSON 报告
pub fn write_json(report: &RunReport, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
}

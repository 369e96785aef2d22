//! 动作历史：按执行顺序追加的只读账本
//!
//! 每次工具调用（无论成功与否）写入一条 HistoryEntry；序号从 1 开始单调递增，条目一经写入不再修改或删除。

use chrono::{DateTime, Local};
use serde::Serialize;

/// 单条历史记录
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub seq: usize,
    pub operation: String,
    /// 参数摘要（click 为选择器，go_back / get_state 为空）
    pub summary: String,
    pub succeeded: bool,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Default)]
pub struct ActionHistory {
    entries: Vec<HistoryEntry>,
}

impl ActionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条记录并返回其序号
    pub fn record(&mut self, operation: &str, summary: &str, succeeded: bool) -> usize {
        let seq = self.entries.len() + 1;
        self.entries.push(HistoryEntry {
            seq,
            operation: operation.to_string(),
            summary: summary.to_string(),
            succeeded,
            timestamp: Local::now(),
        });
        seq
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 运行结束时交出全部记录（用于报告）
    pub fn into_entries(self) -> Vec<HistoryEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_one_based_and_monotonic() {
        let mut history = ActionHistory::new();
        assert!(history.is_empty());
        assert_eq!(history.record("click", "css=a", true), 1);
        assert_eq!(history.record("go_back", "", false), 2);
        assert_eq!(history.record("get_state", "", true), 3);

        let seqs: Vec<usize> = history.entries().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(history.entries()[0].summary, "css=a");
        assert!(!history.entries()[1].succeeded);
    }

    #[test]
    fn test_timestamps_non_decreasing() {
        let mut history = ActionHistory::new();
        history.record("click", "a", true);
        history.record("click", "b", true);
        let entries = history.into_entries();
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }
}

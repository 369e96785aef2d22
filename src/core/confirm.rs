//! 人工确认闸门
//!
//! 每批工具调用执行前询问是否继续；回答一个数字 N 表示接下来 N 次自动放行（skip 预算）。
//! 无终端 / 输入结束时视为拒绝，不会崩溃。

use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};

pub const CONFIRM_PROMPT: &str = "Continue? (Y/n or number to skip) > ";

/// 操作员输入源：读取一行；Ok(None) 表示输入结束（EOF）
#[async_trait]
pub trait OperatorInput: Send {
    async fn read_line(&mut self, prompt: &str) -> std::io::Result<Option<String>>;
}

/// 标准输入：先输出提示，再读取一行
pub struct StdinInput {
    reader: BufReader<Stdin>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperatorInput for StdinInput {
    async fn read_line(&mut self, prompt: &str) -> std::io::Result<Option<String>> {
        {
            let mut out = std::io::stdout();
            out.write_all(prompt.as_bytes())?;
            out.flush()?;
        }
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            Ok(None)
        } else {
            Ok(Some(line))
        }
    }
}

/// 预置应答（测试与非交互运行）；用完即视为 EOF
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            reads: Arc::default(),
        }
    }

    /// 读取计数（含 EOF）；交给闸门后仍可观察
    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }
}

#[async_trait]
impl OperatorInput for ScriptedInput {
    async fn read_line(&mut self, _prompt: &str) -> std::io::Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.lines.pop_front())
    }
}

/// 解析一行应答；None 表示 EOF
///
/// n 开头 -> 停止；非负整数 N -> 继续并设置新预算；空或 y 开头 -> 继续；其它 -> 视为无效并停止
pub fn parse_answer(line: Option<&str>) -> (bool, u32) {
    let Some(line) = line else {
        return (false, 0);
    };
    let answer = line.trim().to_lowercase();
    if answer.starts_with('n') {
        return (false, 0);
    }
    if !answer.is_empty() && answer.chars().all(|c| c.is_ascii_digit()) {
        return match answer.parse::<u32>() {
            Ok(n) => (true, n),
            Err(_) => (false, 0),
        };
    }
    if answer.is_empty() || answer.starts_with('y') {
        return (true, 0);
    }
    (false, 0)
}

/// 确认状态：只由 ConfirmationGate 修改；整个运行期间不重置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfirmationState {
    pub skip_count: u32,
}

pub struct ConfirmationGate {
    state: ConfirmationState,
    input: Box<dyn OperatorInput>,
}

impl ConfirmationGate {
    pub fn new(input: Box<dyn OperatorInput>) -> Self {
        Self::with_skip_budget(input, 0)
    }

    pub fn with_skip_budget(input: Box<dyn OperatorInput>, skip_count: u32) -> Self {
        Self {
            state: ConfirmationState { skip_count },
            input,
        }
    }

    pub fn state(&self) -> ConfirmationState {
        self.state
    }

    /// 预算 > 0 时直接放行并减一；否则读取一行应答
    pub async fn decide(&mut self, current_skip_count: u32) -> (bool, u32) {
        if current_skip_count > 0 {
            return (true, current_skip_count - 1);
        }
        match self.input.read_line(CONFIRM_PROMPT).await {
            Ok(line) => parse_answer(line.as_deref()),
            Err(e) => {
                tracing::warn!(error = %e, "confirmation read failed, declining");
                (false, 0)
            }
        }
    }

    /// 以当前状态调用 decide 并写回新预算
    pub async fn confirm(&mut self) -> bool {
        let (go_on, skip_count) = self.decide(self.state.skip_count).await;
        tracing::debug!(go_on, skip_count, "confirmation decided");
        self.state.skip_count = skip_count;
        go_on
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate_with(lines: Vec<&str>) -> (ConfirmationGate, Arc<AtomicUsize>) {
        let input = ScriptedInput::new(lines);
        let reads = input.read_counter();
        (ConfirmationGate::new(Box::new(input)), reads)
    }

    #[tokio::test]
    async fn test_skip_budget_auto_continues_without_input() {
        let (mut gate, reads) = gate_with(vec!["n"]);
        assert_eq!(gate.decide(3).await, (true, 2));
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_decline() {
        let (mut gate, _) = gate_with(vec!["n"]);
        assert_eq!(gate.decide(0).await, (false, 0));
    }

    #[tokio::test]
    async fn test_number_sets_new_budget() {
        let (mut gate, _) = gate_with(vec!["5"]);
        assert_eq!(gate.decide(0).await, (true, 5));
    }

    #[tokio::test]
    async fn test_end_of_input_declines() {
        let (mut gate, reads) = gate_with(vec![]);
        assert_eq!(gate.decide(0).await, (false, 0));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parse_answer_forms() {
        assert_eq!(parse_answer(Some("\n")), (true, 0));
        assert_eq!(parse_answer(Some("Y")), (true, 0));
        assert_eq!(parse_answer(Some("yes please")), (true, 0));
        assert_eq!(parse_answer(Some("No")), (false, 0));
        assert_eq!(parse_answer(Some(" 12 \n")), (true, 12));
        assert_eq!(parse_answer(Some("0")), (true, 0));
        assert_eq!(parse_answer(Some("-3")), (false, 0));
        assert_eq!(parse_answer(Some("maybe")), (false, 0));
        assert_eq!(parse_answer(Some("99999999999999999999")), (false, 0));
        assert_eq!(parse_answer(None), (false, 0));
    }

    #[tokio::test]
    async fn test_confirm_threads_budget() {
        let (mut gate, reads) = gate_with(vec!["2", "n"]);
        assert!(gate.confirm().await);
        assert_eq!(gate.state().skip_count, 2);
        assert!(gate.confirm().await);
        assert!(gate.confirm().await);
        assert_eq!(gate.state().skip_count, 0);
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert!(!gate.confirm().await);
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_initial_skip_budget() {
        let mut gate = ConfirmationGate::with_skip_budget(Box::new(ScriptedInput::default()), 1);
        assert!(gate.confirm().await);
        assert!(!gate.confirm().await);
    }
}

//! 核心编排层：错误、动作历史、确认闸门、状态机与主控循环

pub mod builder;
pub mod confirm;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod state;

pub use builder::{create_policy_from_config, AgentBuilder};
pub use confirm::{parse_answer, ConfirmationGate, ConfirmationState, OperatorInput, ScriptedInput, StdinInput};
pub use error::{AgentError, ToolError};
pub use history::{ActionHistory, HistoryEntry};
pub use orchestrator::{Orchestrator, RunReport};
pub use state::{LoopPhase, Termination};

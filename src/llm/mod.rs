//! 决策策略层：客户端抽象与实现（OpenAI 兼容 / Mock / Scripted）以及对话会话

pub mod mock;
pub mod openai;
pub mod session;
pub mod traits;
pub mod types;

pub use mock::{MockPolicyClient, RecordedRequest, ScriptedPolicy, ScriptedReply};
pub use openai::{OpenAiClient, TokenUsage};
pub use session::{ConversationSession, Response, ToolVisibility};
pub use traits::{LlmError, PolicyClient};
pub use types::{PolicyReply, Role, ToolCall, ToolSpec, Turn};

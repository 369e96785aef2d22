//! Bee Browse - LLM 驱动的网页导航智能体
//!
//! 模块划分：
//! - **actuator**: 页面执行器抽象与实现（Headless Chrome / 内存页面图）、截图命名
//! - **config**: 应用配置加载（TOML + 环境变量）与 system prompt
//! - **core**: 主控循环、确认闸门、动作历史、错误类型
//! - **llm**: 决策策略客户端（OpenAI 兼容 / Mock / Scripted）与对话会话
//! - **observability**: 日志初始化
//! - **report**: 运行报告输出
//! - **tools**: 工具注册表与浏览器工具集（click / go_back / get_state）

pub mod actuator;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod report;
pub mod tools;

pub use crate::core::{Orchestrator, RunReport, Termination};

//! AutoDev - 可中断、可人工审阅、可恢复的 TDD 编码智能体
//!
//! 模块划分：
//! - **agent**: 沙箱准备、提示词、动作目录与引擎组装
//! - **config**: 应用配置加载（TOML + 环境变量）与 EngineSettings 校验
//! - **core**: 错误类型、会话租约
//! - **engine**: 执行引擎（step / resume 状态机、运行循环）
//! - **llm**: LLM 客户端抽象、文本工具协议、OpenAI 兼容实现、Mock、限流与重试
//! - **memory**: 对话消息与工具调用
//! - **observability**: tracing 日志初始化
//! - **review**: 决定、审阅策略、中断/恢复边界结构与 ReviewCollector
//! - **session**: 会话状态与检查点存储
//! - **tools**: 动作目录、执行器、沙箱工具与子 Agent
//! - **ui**: 终端流式渲染与标准输入审阅

pub mod agent;
pub mod config;
pub mod core;
pub mod engine;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod review;
pub mod session;
pub mod tools;
pub mod ui;

pub use engine::{ExecutionEngine, StepInput, StepObserver, StepResult};

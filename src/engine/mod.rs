//! 执行引擎：可中断、可恢复的单步状态机
//!
//! 一次 step 要么是新消息（会话未挂起），要么是对挂起动作的决定（会话已挂起）。
//! 运行循环在模型提出需要审阅的动作时停下：写入检查点并返回 Interrupted；
//! 恢复时按决定执行/拒绝这些动作，然后继续向模型要下一步。

pub mod step;

use crate::memory::Message;
use crate::review::{Decision, Interrupt};
use crate::session::Session;

pub use step::ExecutionEngine;

/// step 的两种调用形态
#[derive(Clone, Debug, PartialEq)]
pub enum StepInput {
    /// 新消息（通常是一条 user 消息）
    Messages(Vec<Message>),
    /// 对上一次 Interrupted 中挂起动作的决定，顺序一一对应
    Resume(Vec<Decision>),
}

impl StepInput {
    pub fn user(text: impl Into<String>) -> Self {
        StepInput::Messages(vec![Message::user(text)])
    }

    pub fn is_resume(&self) -> bool {
        matches!(self, StepInput::Resume(_))
    }
}

/// step 的结果
#[derive(Clone, Debug, PartialEq)]
pub enum StepResult {
    /// 模型不再提出工具调用
    Finished,
    /// 遇到需要审阅的动作，会话已挂起并写入检查点
    Interrupted(Interrupt),
}

impl StepResult {
    pub fn is_finished(&self) -> bool {
        matches!(self, StepResult::Finished)
    }

    pub fn interrupt(&self) -> Option<&Interrupt> {
        match self {
            StepResult::Interrupted(i) => Some(i),
            StepResult::Finished => None,
        }
    }
}

/// 每次向会话追加消息后回调；流式输出通过 session.drain_new() 取新增消息
pub trait StepObserver: Send {
    fn on_append(&mut self, session: &mut Session);
}

/// 不做任何事的观察者（子 Agent、测试）
#[derive(Debug, Default)]
pub struct NoopObserver;

impl StepObserver for NoopObserver {
    fn on_append(&mut self, _session: &mut Session) {}
}

//! 记忆层：对话消息模型（历史本身由 Session 持有）

pub mod conversation;

pub use conversation::{Message, Role, ToolCall};

//! LLM 客户端抽象
//!
//! 模型接口：generate(system, history, actions) -> ModelTurn。
//! 必须对重试幂等：重试/限流以装饰器形式包在外层，引擎本身不做退避。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::{Message, ToolCall};
use crate::tools::ActionDescriptor;

/// 模型调用错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error: {0}")]
    Api(String),

    /// 模型输出不符合工具调用格式
    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// 可重试的瞬时错误；Api 错误（鉴权失败、模型不存在等）重试无意义
    pub fn is_transient(&self) -> bool {
        !matches!(self, LlmError::Api(_))
    }
}

/// 模型的一次回复：可选文本 + 有序的工具调用
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl ModelTurn {
    /// 纯文本回复（结束本轮）
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
        }
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 基于完整历史与可用动作生成下一步
    async fn generate(
        &self,
        system: &str,
        history: &[Message],
        actions: &[ActionDescriptor],
    ) -> Result<ModelTurn, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

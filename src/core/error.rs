//! Agent 错误类型
//!
//! 按处理方式分为四类：
//! - 配置错误（UnknownAction / MissingPolicy / Config）：启动或首次使用时即失败，不做降级
//! - 协议错误（InvalidResumeState / DecisionCountMismatch / DecisionNotAllowed / SessionBusy）：
//!   拒绝本次调用，会话状态保持不变
//! - 工具错误（ToolExecutionFailed / ToolTimeout / PathEscape）：由引擎转成 tool 消息文本，循环继续
//! - 运行错误（ModelUnavailable / StepBudgetExceeded / Checkpoint）：向调用方传播

use thiserror::Error;

use crate::llm::LlmError;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("No review policy registered for action: {0}")]
    MissingPolicy(String),

    #[error("Config error: {0}")]
    Config(String),

    /// 会话未挂起却尝试恢复，或已挂起却提交新消息
    #[error("Invalid resume state for session {session_id}: {reason}")]
    InvalidResumeState { session_id: String, reason: String },

    #[error("Decision count mismatch: expected {expected}, got {actual}")]
    DecisionCountMismatch { expected: usize, actual: usize },

    #[error("Decision '{decision}' is not allowed for action '{action}'")]
    DecisionNotAllowed { action: String, decision: String },

    /// 同一会话已有进行中的调用
    #[error("Session is busy: {0}")]
    SessionBusy(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(#[from] LlmError),

    #[error("Step budget exceeded ({budget} steps)")]
    StepBudgetExceeded { budget: usize },

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Path escape attempt: {0}")]
    PathEscape(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// 审阅过程中用户中断（Ctrl-C / EOF）
    #[error("Review aborted by user")]
    ReviewAborted,
}

impl AgentError {
    /// 协议错误：调用被拒绝，会话未被修改
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            AgentError::InvalidResumeState { .. }
                | AgentError::DecisionCountMismatch { .. }
                | AgentError::DecisionNotAllowed { .. }
                | AgentError::SessionBusy(_)
        )
    }

    /// 配置错误：属于部署/代码缺陷，不应在运行时降级处理
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            AgentError::UnknownAction(_) | AgentError::MissingPolicy(_) | AgentError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_errors_classified() {
        let err = AgentError::DecisionCountMismatch {
            expected: 2,
            actual: 1,
        };
        assert!(err.is_protocol_error());
        assert!(!err.is_config_error());
        assert!(err.to_string().contains("expected 2"));
    }

    #[test]
    fn test_config_errors_classified() {
        assert!(AgentError::MissingPolicy("write_file".into()).is_config_error());
        assert!(AgentError::UnknownAction("nope".into()).is_config_error());
        assert!(!AgentError::ToolTimeout("run_tests".into()).is_protocol_error());
    }

    #[test]
    fn test_model_error_conversion() {
        let err: AgentError = LlmError::Timeout.into();
        assert!(matches!(err, AgentError::ModelUnavailable(_)));
    }
}

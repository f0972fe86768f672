//! 工具执行器
//!
//! 持有只读的 ActionCatalog 与统一超时，invoke / resume 在超时内调用处理器，
//! 超时或失败时转为 AgentError（ToolTimeout / ToolExecutionFailed）；每次调用输出结构化审计日志（JSON）。

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::review::Decision;
use crate::session::Session;
use crate::tools::{ActionCatalog, ToolRun};

/// 工具执行器：对每次调用施加超时，并将结果映射为 AgentError
pub struct ToolExecutor {
    catalog: Arc<ActionCatalog>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(catalog: Arc<ActionCatalog>, timeout_secs: u64) -> Self {
        Self {
            catalog,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    /// 执行指定动作；未知动作返回 UnknownAction，超时返回 ToolTimeout，处理器返回 Err 则转为 ToolExecutionFailed
    pub async fn invoke(&self, action: &str, args: Value) -> Result<ToolRun, AgentError> {
        let entry = self.catalog.lookup(action)?;
        let preview = args_preview(&args);
        let limit = entry.tool.timeout().unwrap_or(self.timeout);
        self.audited(action, &preview, limit, entry.tool.invoke(args)).await
    }

    /// 把决定交回该动作此前挂起的内部运行
    pub async fn resume(
        &self,
        action: &str,
        suspended: Session,
        decisions: Vec<Decision>,
    ) -> Result<ToolRun, AgentError> {
        let entry = self.catalog.lookup(action)?;
        let preview = format!("resume with {} decision(s)", decisions.len());
        let limit = entry.tool.timeout().unwrap_or(self.timeout);
        self.audited(action, &preview, limit, entry.tool.resume(suspended, decisions))
            .await
    }

    async fn audited(
        &self,
        action: &str,
        preview: &str,
        limit: Duration,
        call: impl Future<Output = Result<ToolRun, String>>,
    ) -> Result<ToolRun, AgentError> {
        let start = Instant::now();
        let result = timeout(limit, call).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(ToolRun::Done(_))) => (true, "ok"),
            Ok(Ok(ToolRun::Suspended(_))) => (true, "suspended"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": action,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": preview,
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(Ok(run)) => Ok(run),
            Ok(Err(e)) => Err(AgentError::ToolExecutionFailed(e)),
            Err(_) => Err(AgentError::ToolTimeout(action.to_string())),
        }
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;

    struct Sleepy;

    #[async_trait]
    impl Tool for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn description(&self) -> &str {
            "sleeps"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("woke".into())
        }
    }

    struct Failing;

    #[async_trait]
    impl Tool for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "fails"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            Err("disk full".into())
        }
    }

    fn executor(timeout_secs: u64) -> ToolExecutor {
        let mut catalog = ActionCatalog::new();
        catalog.register(Sleepy, false);
        catalog.register(Failing, false);
        ToolExecutor::new(Arc::new(catalog), timeout_secs)
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = executor(1).invoke("sleepy", Value::Null).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolTimeout(name) if name == "sleepy"));
    }

    #[tokio::test]
    async fn test_failure_and_unknown() {
        let exec = executor(5);
        let err = exec.invoke("failing", Value::Null).await.unwrap_err();
        assert!(err.to_string().contains("disk full"));
        let err = exec.invoke("missing", Value::Null).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownAction(_)));
    }

    #[tokio::test]
    async fn test_resume_on_plain_tool_fails() {
        let err = executor(5)
            .resume("failing", Session::new("s"), vec![Decision::Approve])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolExecutionFailed(msg) if msg.contains("no suspended run")));
    }
}

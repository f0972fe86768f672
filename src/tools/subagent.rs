//! 子 Agent 工具：把一次委派当作普通工具调用
//!
//! 每次 invoke 在全新的内存会话上跑一个嵌套的 ExecutionEngine（自己的 system prompt 与工具集），
//! 返回子 Agent 最后一条 assistant 文本。子 Agent 与主 Agent 共用同一张审阅策略表：
//! 内部提出需审阅的动作时返回 Suspended（携带子会话），由外层会话挂起并展示真实参数；
//! 外层恢复时通过 resume 把对应的决定交回子会话继续执行。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::engine::{ExecutionEngine, NoopObserver, StepInput, StepResult};
use crate::llm::LlmClient;
use crate::review::{Decision, PolicySet};
use crate::session::{MemoryCheckpointStore, Session};
use crate::tools::filesystem::str_arg;
use crate::tools::{ActionCatalog, SuspendedRun, Tool, ToolRun};

/// 子 Agent 定义
pub struct SubAgentTool {
    name: String,
    description: String,
    system_prompt: String,
    llm: Arc<dyn LlmClient>,
    catalog: Arc<ActionCatalog>,
    policies: PolicySet,
    step_budget: usize,
    tool_timeout_secs: u64,
    timeout: Option<Duration>,
}

impl SubAgentTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
        llm: Arc<dyn LlmClient>,
        catalog: ActionCatalog,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            llm,
            catalog: Arc::new(catalog),
            policies: PolicySet::default(),
            step_budget: 25,
            tool_timeout_secs: 300,
            timeout: None,
        }
    }

    /// 内部目录中需审阅动作的策略（通常就是主 Agent 的策略表）
    pub fn with_policies(mut self, policies: PolicySet) -> Self {
        self.policies = policies;
        self
    }

    pub fn with_step_budget(mut self, budget: usize) -> Self {
        self.step_budget = budget;
        self
    }

    pub fn with_tool_timeout(mut self, timeout_secs: u64) -> Self {
        self.tool_timeout_secs = timeout_secs;
        self
    }

    /// 整次委派的超时（覆盖父执行器的统一超时）
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout = Some(Duration::from_secs(timeout_secs));
        self
    }

    pub fn inner_catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    fn engine(&self) -> Result<ExecutionEngine, String> {
        Ok(ExecutionEngine::new(
            self.llm.clone(),
            self.catalog.clone(),
            self.policies.clone(),
            Arc::new(MemoryCheckpointStore::new()),
        )
        .map_err(|e| format!("Sub-agent '{}' misconfigured: {}", self.name, e))?
        .with_system_prompt(self.system_prompt.clone())
        .with_step_budget(self.step_budget)
        .with_tool_timeout(self.tool_timeout_secs))
    }

    async fn drive(&self, mut session: Session, input: StepInput) -> Result<ToolRun, String> {
        let engine = self.engine()?;
        let result = engine
            .step(&mut session, input, &mut NoopObserver)
            .await
            .map_err(|e| format!("Sub-agent '{}' failed: {}", self.name, e))?;

        match result {
            StepResult::Finished => Ok(ToolRun::Done(
                session
                    .last_assistant_content()
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or("(sub-agent finished without a final message)")
                    .to_string(),
            )),
            StepResult::Interrupted(interrupt) => {
                tracing::info!(
                    sub_agent = %self.name,
                    session_id = %session.id(),
                    pending = interrupt.pending_actions.len(),
                    "Sub-agent suspended for review"
                );
                Ok(ToolRun::Suspended(SuspendedRun {
                    session,
                    policies: interrupt.policies,
                }))
            }
        }
    }
}

#[async_trait]
impl Tool for SubAgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "description": {"type": "string", "description": "Detailed task for the sub-agent"}
            },
            "required": ["description"]
        })
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// 不可挂起的调用方只能拿到最终文本
    async fn execute(&self, args: Value) -> Result<String, String> {
        match self.invoke(args).await? {
            ToolRun::Done(output) => Ok(output),
            ToolRun::Suspended(_) => Err(format!(
                "Sub-agent '{}' needs human review, which requires a resumable session",
                self.name
            )),
        }
    }

    async fn invoke(&self, args: Value) -> Result<ToolRun, String> {
        let task = str_arg(&args, &["description", "task", "prompt"])
            .ok_or("Missing required parameter: description")?;
        let session_id = format!("{}-{}", self.name, uuid::Uuid::new_v4().simple());
        tracing::info!(sub_agent = %self.name, session_id = %session_id, "Delegating task");
        self.drive(Session::new(session_id), StepInput::user(task)).await
    }

    async fn resume(&self, suspended: Session, decisions: Vec<Decision>) -> Result<ToolRun, String> {
        tracing::info!(sub_agent = %self.name, session_id = %suspended.id(), "Resuming sub-agent");
        self.drive(suspended, StepInput::Resume(decisions)).await
    }
}

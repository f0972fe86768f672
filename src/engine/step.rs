use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::core::{AgentError, SessionLeases};
use crate::engine::{StepInput, StepObserver, StepResult};
use crate::llm::LlmClient;
use crate::memory::{Message, ToolCall};
use crate::review::{ActionRequest, Decision, Interrupt, PolicySet, ResumeRequest, ReviewPolicy};
use crate::session::{CheckpointStore, PendingAction, Session};
use crate::tools::{ActionCatalog, ActionDescriptor, ToolExecutor, ToolRun};

/// 单次 step 内模型调用次数上限（对应 recursion limit）
pub const DEFAULT_STEP_BUDGET: usize = 50;
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 300;

/// 执行引擎：持有模型、只读动作目录、审阅策略与检查点存储
pub struct ExecutionEngine {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    catalog: Arc<ActionCatalog>,
    descriptors: Vec<ActionDescriptor>,
    executor: ToolExecutor,
    policies: PolicySet,
    store: Arc<dyn CheckpointStore>,
    leases: SessionLeases,
    step_budget: usize,
}

impl ExecutionEngine {
    /// 构建时校验：每个需要审阅的动作都必须有策略（MissingPolicy）
    pub fn new(
        llm: Arc<dyn LlmClient>,
        catalog: Arc<ActionCatalog>,
        policies: PolicySet,
        store: Arc<dyn CheckpointStore>,
    ) -> Result<Self, AgentError> {
        policies.validate_against(&catalog)?;
        Ok(Self {
            llm,
            system_prompt: String::new(),
            descriptors: catalog.descriptors(),
            executor: ToolExecutor::new(catalog.clone(), DEFAULT_TOOL_TIMEOUT_SECS),
            catalog,
            policies,
            store,
            leases: SessionLeases::new(),
            step_budget: DEFAULT_STEP_BUDGET,
        })
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_step_budget(mut self, budget: usize) -> Self {
        self.step_budget = budget;
        self
    }

    pub fn with_tool_timeout(mut self, timeout_secs: u64) -> Self {
        self.executor = ToolExecutor::new(self.catalog.clone(), timeout_secs);
        self
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    pub fn step_budget(&self) -> usize {
        self.step_budget
    }

    /// (prompt, completion, total) 累计 token 用量
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// 读取会话快照
    pub async fn session(&self, session_id: &str) -> Result<Session, AgentError> {
        self.store.load(session_id).await
    }

    /// 若会话处于挂起状态，重建它的中断描述（进程重启后继续审阅）
    pub async fn pending_interrupt(&self, session_id: &str) -> Result<Option<Interrupt>, AgentError> {
        match self.store.load(session_id).await {
            Ok(session) if session.is_suspended() => self.interrupt_for(&session).map(Some),
            Ok(_) | Err(AgentError::SessionNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 按 id 执行一次 step：独占会话租约 -> 读取或新建会话 -> step -> 保存
    ///
    /// 同一会话已有进行中的调用时：恢复请求返回 InvalidResumeState，新消息返回 SessionBusy。
    /// 协议错误不写回（会话未被修改）。
    pub async fn run(
        &self,
        session_id: &str,
        input: StepInput,
        observer: &mut dyn StepObserver,
    ) -> Result<StepResult, AgentError> {
        let Some(lease) = self.leases.try_acquire(session_id).await else {
            return Err(if input.is_resume() {
                AgentError::InvalidResumeState {
                    session_id: session_id.to_string(),
                    reason: "another call on this session is in flight".to_string(),
                }
            } else {
                AgentError::SessionBusy(session_id.to_string())
            });
        };
        let result = self.run_leased(session_id, input, observer).await;
        self.leases.release(lease).await;
        result
    }

    /// 恢复请求 {session_id, decisions} 的入口
    pub async fn resume(
        &self,
        request: ResumeRequest,
        observer: &mut dyn StepObserver,
    ) -> Result<StepResult, AgentError> {
        self.run(&request.session_id, StepInput::Resume(request.decisions), observer)
            .await
    }

    async fn run_leased(
        &self,
        session_id: &str,
        input: StepInput,
        observer: &mut dyn StepObserver,
    ) -> Result<StepResult, AgentError> {
        let mut session = match self.store.load(session_id).await {
            Ok(session) => session,
            Err(AgentError::SessionNotFound(_)) => Session::new(session_id),
            Err(e) => return Err(e),
        };

        let result = self.step(&mut session, input, observer).await;
        match &result {
            // step 内部已写入检查点
            Ok(StepResult::Interrupted(_)) => {}
            Err(e) if e.is_protocol_error() => {}
            _ => {
                if let Err(save_err) = self.store.save(&session).await {
                    if result.is_ok() {
                        return Err(save_err);
                    }
                    tracing::warn!(session_id, error = %save_err, "Failed to save session after error");
                }
            }
        }
        result
    }

    /// 对给定会话执行一次 step（调用方负责同一会话的串行化）
    pub async fn step(
        &self,
        session: &mut Session,
        input: StepInput,
        observer: &mut dyn StepObserver,
    ) -> Result<StepResult, AgentError> {
        match input {
            StepInput::Messages(messages) => {
                if session.is_suspended() {
                    return Err(AgentError::InvalidResumeState {
                        session_id: session.id().to_string(),
                        reason: "session is suspended awaiting review decisions".to_string(),
                    });
                }
                for message in messages {
                    session.append(message);
                    observer.on_append(session);
                }
            }
            StepInput::Resume(decisions) => {
                self.validate_resume(session, &decisions)?;
                let still_pending = self.apply_decisions(session, decisions, observer).await;
                // 子 Agent 恢复后又遇到需审阅的动作：不询问模型，直接再次挂起
                if !still_pending.is_empty() {
                    return self.suspend(session, still_pending).await;
                }
            }
        }
        self.run_loop(session, observer).await
    }

    /// 全部校验通过之前不修改会话
    fn validate_resume(&self, session: &Session, decisions: &[Decision]) -> Result<(), AgentError> {
        if !session.is_suspended() {
            return Err(AgentError::InvalidResumeState {
                session_id: session.id().to_string(),
                reason: "session is not suspended".to_string(),
            });
        }
        let targets = self.review_targets(session)?;
        if decisions.len() != targets.len() {
            return Err(AgentError::DecisionCountMismatch {
                expected: targets.len(),
                actual: decisions.len(),
            });
        }
        for ((call, policy), decision) in targets.iter().zip(decisions) {
            if !policy.allows(decision.kind()) {
                return Err(AgentError::DecisionNotAllowed {
                    action: call.name.clone(),
                    decision: decision.kind().to_string(),
                });
            }
        }
        Ok(())
    }

    /// 按顺序消费决定；返回仍在等待审阅的条目（子 Agent 再次挂起）
    async fn apply_decisions(
        &self,
        session: &mut Session,
        decisions: Vec<Decision>,
        observer: &mut dyn StepObserver,
    ) -> Vec<PendingAction> {
        let kinds: Vec<&str> = decisions.iter().map(|d| d.kind().as_str()).collect();
        tracing::info!(session_id = %session.id(), decisions = ?kinds, "Resuming session");

        let mut decisions = decisions.into_iter();
        let mut still_pending = Vec::new();
        for item in session.take_pending() {
            let mine: Vec<Decision> = decisions.by_ref().take(item.decision_count()).collect();
            match item {
                PendingAction::Review { call } => {
                    let Some(decision) = mine.into_iter().next() else {
                        continue;
                    };
                    let run = match decision {
                        Decision::Reject => ToolRun::Done(format!(
                            "User rejected the tool call for `{}` with id {}",
                            call.name, call.id
                        )),
                        Decision::Approve => self.invoke_call(&call.name, call.args_value()).await,
                        Decision::Edit { args } => {
                            let edited = Value::Object(args);
                            match self.invoke_call(&call.name, edited.clone()).await {
                                ToolRun::Done(result) => ToolRun::Done(format!(
                                    "Executed with edited arguments {}:\n{}",
                                    edited, result
                                )),
                                suspended => suspended,
                            }
                        }
                    };
                    self.settle(session, call, run, &mut still_pending, observer);
                }
                PendingAction::Delegated {
                    call,
                    session: inner,
                    ..
                } => {
                    let run = self.resume_call(&call.name, *inner, mine).await;
                    self.settle(session, call, run, &mut still_pending, observer);
                }
            }
        }
        still_pending
    }

    async fn run_loop(
        &self,
        session: &mut Session,
        observer: &mut dyn StepObserver,
    ) -> Result<StepResult, AgentError> {
        let mut iterations = 0;
        loop {
            if iterations >= self.step_budget {
                tracing::warn!(session_id = %session.id(), budget = self.step_budget, "Step budget exhausted");
                return Err(AgentError::StepBudgetExceeded {
                    budget: self.step_budget,
                });
            }
            iterations += 1;
            tracing::debug!(session_id = %session.id(), iteration = iterations, history = session.len(), "Calling model");

            // 模型调用成功之前不修改会话
            let turn = self
                .llm
                .generate(&self.system_prompt, session.history(), &self.descriptors)
                .await?;
            let mut calls = turn.tool_calls;
            assign_call_ids(&mut calls);

            if !turn.content.is_empty() || !calls.is_empty() {
                session.append(Message::assistant(turn.content, calls.clone()));
                observer.on_append(session);
            }
            if calls.is_empty() {
                tracing::info!(session_id = %session.id(), iterations, "Run finished");
                return Ok(StepResult::Finished);
            }

            let mut pending = Vec::new();
            for call in calls {
                match self.catalog.requires_review(&call.name) {
                    Ok(true) => pending.push(PendingAction::Review { call }),
                    Ok(false) => {
                        let run = self.invoke_call(&call.name, call.args_value()).await;
                        self.settle(session, call, run, &mut pending, observer);
                    }
                    Err(_) => {
                        tracing::warn!(action = %call.name, "Model proposed an unknown action");
                        let content = format!("Error: unknown action '{}'", call.name);
                        session.append(Message::tool(&call, content));
                        observer.on_append(session);
                    }
                }
            }

            if !pending.is_empty() {
                return self.suspend(session, pending).await;
            }
        }
    }

    async fn suspend(
        &self,
        session: &mut Session,
        pending: Vec<PendingAction>,
    ) -> Result<StepResult, AgentError> {
        let names: Vec<&str> = pending.iter().map(|p| p.call().name.as_str()).collect();
        tracing::info!(session_id = %session.id(), pending = ?names, "Suspending for review");
        session.suspend(pending);
        let interrupt = self.interrupt_for(session)?;
        self.store.save(session).await?;
        Ok(StepResult::Interrupted(interrupt))
    }

    /// 完成的调用写入 tool 消息；挂起的委派留作待处理条目
    fn settle(
        &self,
        session: &mut Session,
        call: ToolCall,
        run: ToolRun,
        pending: &mut Vec<PendingAction>,
        observer: &mut dyn StepObserver,
    ) {
        match run {
            ToolRun::Done(content) => {
                session.append(Message::tool(&call, content));
                observer.on_append(session);
            }
            ToolRun::Suspended(inner) => pending.push(PendingAction::Delegated {
                call,
                session: Box::new(inner.session),
                policies: inner.policies,
            }),
        }
    }

    /// 执行一个动作；失败转为 tool 消息文本，不中断循环
    async fn invoke_call(&self, action: &str, args: Value) -> ToolRun {
        match self.executor.invoke(action, args).await {
            Ok(run) => run,
            Err(e) => ToolRun::Done(error_text(e)),
        }
    }

    async fn resume_call(&self, action: &str, suspended: Session, decisions: Vec<Decision>) -> ToolRun {
        match self.executor.resume(action, suspended, decisions).await {
            Ok(run) => run,
            Err(e) => ToolRun::Done(error_text(e)),
        }
    }

    /// 展开后的待审阅动作及其策略（委派条目使用子运行带回的策略）
    fn review_targets<'a>(
        &'a self,
        session: &'a Session,
    ) -> Result<Vec<(ToolCall, &'a ReviewPolicy)>, AgentError> {
        let mut targets = Vec::new();
        for item in session.pending() {
            for call in item.review_calls() {
                let policy = match item {
                    PendingAction::Review { .. } => self.policies.get(&call.name)?,
                    PendingAction::Delegated { policies, .. } => policies
                        .iter()
                        .find(|p| p.action_name == call.name)
                        .ok_or_else(|| AgentError::MissingPolicy(call.name.clone()))?,
                };
                targets.push((call, policy));
            }
        }
        Ok(targets)
    }

    fn interrupt_for(&self, session: &Session) -> Result<Interrupt, AgentError> {
        let targets = self.review_targets(session)?;
        let mut seen = HashSet::new();
        let mut policies: Vec<ReviewPolicy> = Vec::new();
        for (call, policy) in &targets {
            if seen.insert(call.name.as_str()) {
                policies.push((*policy).clone());
            }
        }
        Ok(Interrupt {
            session_id: session.id().to_string(),
            pending_actions: targets.iter().map(|(call, _)| ActionRequest::from(call)).collect(),
            policies,
        })
    }
}

fn error_text(err: AgentError) -> String {
    match err {
        AgentError::ToolExecutionFailed(msg) if msg.starts_with("Error") => msg,
        AgentError::ToolExecutionFailed(msg) => format!("Error: {}", msg),
        e => format!("Error: {}", e),
    }
}

/// 缺失或同轮重复的 id 重新分配为 `call_<uuid>`
fn assign_call_ids(calls: &mut [ToolCall]) {
    let mut seen = HashSet::new();
    for call in calls.iter_mut() {
        if call.id.trim().is_empty() || !seen.insert(call.id.clone()) {
            call.id = format!("call_{}", uuid::Uuid::new_v4().simple());
            seen.insert(call.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NoopObserver;
    use crate::llm::{LlmError, ModelTurn, ScriptedLlmClient};
    use crate::review::DecisionKind;
    use crate::session::MemoryCheckpointStore;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::{json, Map};
    use std::sync::Mutex;

    /// 记录每次调用参数的工具
    struct Recording {
        name: &'static str,
        calls: Arc<Mutex<Vec<Value>>>,
    }

    #[async_trait]
    impl Tool for Recording {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "records calls"
        }
        async fn execute(&self, args: Value) -> Result<String, String> {
            self.calls.lock().unwrap().push(args.clone());
            Ok(format!("{} ok", self.name))
        }
    }

    fn call(name: &str, args: Value) -> ToolCall {
        let args = args.as_object().cloned().unwrap_or_else(Map::new);
        ToolCall::new("", name, args)
    }

    fn engine(
        turns: Vec<ModelTurn>,
        policies: Vec<ReviewPolicy>,
    ) -> (ExecutionEngine, Arc<Mutex<Vec<Value>>>, Arc<ScriptedLlmClient>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut catalog = ActionCatalog::new();
        catalog.register(Recording { name: "run_tests", calls: calls.clone() }, false);
        catalog.register(Recording { name: "write_file", calls: calls.clone() }, true);
        let llm = Arc::new(ScriptedLlmClient::new(turns));
        let engine = ExecutionEngine::new(
            llm.clone(),
            Arc::new(catalog),
            PolicySet::new(policies).unwrap(),
            Arc::new(MemoryCheckpointStore::new()),
        )
        .unwrap();
        (engine, calls, llm)
    }

    #[test]
    fn test_assign_call_ids() {
        let mut calls = vec![
            ToolCall::new("", "a", Map::new()),
            ToolCall::new("x", "b", Map::new()),
            ToolCall::new("x", "c", Map::new()),
        ];
        assign_call_ids(&mut calls);
        assert!(calls[0].id.starts_with("call_"));
        assert_eq!(calls[1].id, "x");
        assert_ne!(calls[2].id, "x");
    }

    #[test]
    fn test_missing_policy_fails_construction() {
        let mut catalog = ActionCatalog::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        catalog.register(Recording { name: "write_file", calls }, true);
        let result = ExecutionEngine::new(
            Arc::new(ScriptedLlmClient::default()),
            Arc::new(catalog),
            PolicySet::default(),
            Arc::new(MemoryCheckpointStore::new()),
        );
        assert!(matches!(result, Err(AgentError::MissingPolicy(name)) if name == "write_file"));
    }

    #[tokio::test]
    async fn test_unknown_action_becomes_tool_message() {
        let (engine, _, _) = engine(
            vec![
                ModelTurn::with_calls("", vec![call("launch_rocket", json!({}))]),
                ModelTurn::text("ok"),
            ],
            vec![ReviewPolicy::permissive("write_file")],
        );
        let mut session = Session::new("s");
        let result = engine
            .step(&mut session, StepInput::user("go"), &mut NoopObserver)
            .await
            .unwrap();
        assert!(result.is_finished());
        assert_eq!(session.history()[2].content, "Error: unknown action 'launch_rocket'");
    }

    #[tokio::test]
    async fn test_disallowed_decision_is_protocol_error() {
        let (engine, calls, _) = engine(
            vec![ModelTurn::with_calls(
                "",
                vec![call("write_file", json!({"file_path": "a.py"}))],
            )],
            vec![ReviewPolicy::new("write_file", [DecisionKind::Approve])],
        );
        let mut session = Session::new("s");
        engine
            .step(&mut session, StepInput::user("go"), &mut NoopObserver)
            .await
            .unwrap();
        let before = session.clone();

        let err = engine
            .step(
                &mut session,
                StepInput::Resume(vec![Decision::Edit { args: Map::new() }]),
                &mut NoopObserver,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::DecisionNotAllowed { .. }));
        assert_eq!(session, before);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_leaves_session_untouched() {
        let (engine, _, llm) = engine(vec![], vec![ReviewPolicy::permissive("write_file")]);
        llm.push_error(LlmError::Timeout);
        let mut session = Session::new("s");
        let err = engine
            .step(&mut session, StepInput::Messages(vec![]), &mut NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ModelUnavailable(LlmError::Timeout)));
        assert!(session.is_empty());
        assert!(!session.is_suspended());
    }

    #[tokio::test]
    async fn test_step_budget_exceeded() {
        let turns = (0..3)
            .map(|_| ModelTurn::with_calls("", vec![call("run_tests", json!({}))]))
            .collect();
        let (engine, calls, _) = engine(turns, vec![ReviewPolicy::permissive("write_file")]);
        let engine = engine.with_step_budget(2);
        let mut session = Session::new("s");
        let err = engine
            .step(&mut session, StepInput::user("loop"), &mut NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::StepBudgetExceeded { budget: 2 }));
        assert_eq!(calls.lock().unwrap().len(), 2);
        // user + 2 × (assistant + tool)
        assert_eq!(session.len(), 5);
        assert!(!session.is_suspended());
    }

    #[tokio::test]
    async fn test_fresh_input_on_suspended_session_rejected() {
        let (engine, _, _) = engine(
            vec![ModelTurn::with_calls("", vec![call("write_file", json!({}))])],
            vec![ReviewPolicy::permissive("write_file")],
        );
        let mut session = Session::new("s");
        engine
            .step(&mut session, StepInput::user("go"), &mut NoopObserver)
            .await
            .unwrap();
        let len = session.len();
        let err = engine
            .step(&mut session, StepInput::user("again"), &mut NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidResumeState { .. }));
        assert_eq!(session.len(), len);
    }

    #[tokio::test]
    async fn test_run_persists_and_reloads() {
        let (engine, _, _) = engine(
            vec![
                ModelTurn::with_calls("Writing", vec![call("write_file", json!({"file_path": "a.py"}))]),
                ModelTurn::text("done"),
            ],
            vec![ReviewPolicy::permissive("write_file")],
        );
        let result = engine
            .run("s1", StepInput::user("go"), &mut NoopObserver)
            .await
            .unwrap();
        let interrupt = result.interrupt().unwrap().clone();
        assert_eq!(interrupt.session_id, "s1");
        assert_eq!(interrupt.policies.len(), 1);
        assert!(engine.session("s1").await.unwrap().is_suspended());

        let request = ResumeRequest {
            session_id: interrupt.session_id.clone(),
            decisions: vec![Decision::Approve],
        };
        let result = engine.resume(request, &mut NoopObserver).await.unwrap();
        assert!(result.is_finished());
        let saved = engine.session("s1").await.unwrap();
        assert!(!saved.is_suspended());
        assert_eq!(saved.last_assistant_content(), Some("done"));
        assert!(engine.leases.is_empty().await);
    }

    #[tokio::test]
    async fn test_leases_released_after_errors() {
        let (engine, _, _) = engine(vec![], vec![ReviewPolicy::permissive("write_file")]);
        for i in 0..5 {
            let id = format!("ghost-{}", i);
            assert!(engine
                .run(&id, StepInput::Resume(vec![]), &mut NoopObserver)
                .await
                .is_err());
        }
        assert!(engine.leases.is_empty().await);
    }

    #[tokio::test]
    async fn test_delegated_run_suspends_again_without_model_call() {
        use crate::tools::SubAgentTool;

        let inner_llm = Arc::new(ScriptedLlmClient::new([
            ModelTurn::with_calls("", vec![call("write_file", json!({"file_path": "a.py"}))]),
            ModelTurn::with_calls("", vec![call("write_file", json!({"file_path": "b.py"}))]),
            ModelTurn::text("both written"),
        ]));
        let written = Arc::new(Mutex::new(Vec::new()));
        let mut inner = ActionCatalog::new();
        inner.register(Recording { name: "write_file", calls: written.clone() }, true);
        let policies = PolicySet::new([ReviewPolicy::permissive("write_file")]).unwrap();
        let writer = SubAgentTool::new("writer", "writes", "", inner_llm, inner)
            .with_policies(policies.clone());

        let mut catalog = ActionCatalog::new();
        catalog.register(writer, false);
        let outer_llm = Arc::new(ScriptedLlmClient::new([
            ModelTurn::with_calls("", vec![call("writer", json!({"description": "two files"}))]),
            ModelTurn::text("delegation done"),
        ]));
        let engine = ExecutionEngine::new(
            outer_llm.clone(),
            Arc::new(catalog),
            policies,
            Arc::new(MemoryCheckpointStore::new()),
        )
        .unwrap();

        let mut session = Session::new("outer");
        let first = engine
            .step(&mut session, StepInput::user("go"), &mut NoopObserver)
            .await
            .unwrap();
        let interrupt = first.interrupt().unwrap();
        assert_eq!(interrupt.pending_actions[0].name, "write_file");
        assert_eq!(interrupt.pending_actions[0].args["file_path"], json!("a.py"));

        let second = engine
            .step(&mut session, StepInput::Resume(vec![Decision::Approve]), &mut NoopObserver)
            .await
            .unwrap();
        let interrupt = second.interrupt().unwrap();
        assert_eq!(interrupt.pending_actions[0].args["file_path"], json!("b.py"));
        assert_eq!(outer_llm.call_count(), 1);
        assert_eq!(written.lock().unwrap().len(), 1);

        let done = engine
            .step(&mut session, StepInput::Resume(vec![Decision::Reject]), &mut NoopObserver)
            .await
            .unwrap();
        assert!(done.is_finished());
        assert_eq!(written.lock().unwrap().len(), 1);
        let tool_message = &session.history()[2];
        assert_eq!(tool_message.content, "both written");
        assert_eq!(session.last_assistant_content(), Some("delegation done"));
    }

    #[tokio::test]
    async fn test_resume_unknown_session_is_protocol_error() {
        let (engine, _, _) = engine(vec![], vec![ReviewPolicy::permissive("write_file")]);
        let err = engine
            .run("ghost", StepInput::Resume(vec![]), &mut NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidResumeState { .. }));
        assert!(matches!(
            engine.session("ghost").await,
            Err(AgentError::SessionNotFound(_))
        ));
    }
}

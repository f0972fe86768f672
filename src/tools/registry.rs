//! 动作目录（ActionCatalog）
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），注册时附带
//! requires_review 标记。启动时一次性注册，之后包进 Arc 只读共享。
//! 引擎经由 invoke / resume 调用工具：普通工具总是 Done，子 Agent 在内部需要审阅时返回 Suspended。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::core::AgentError;
use crate::review::{Decision, ReviewPolicy};
use crate::session::Session;

/// 一次工具调用的结果
#[derive(Debug)]
pub enum ToolRun {
    Done(String),
    /// 内部运行在等待人工决定
    Suspended(SuspendedRun),
}

/// 挂起的内部运行：会话快照 + 其待审阅动作对应的策略
#[derive(Debug)]
pub struct SuspendedRun {
    pub session: Session,
    pub policies: Vec<ReviewPolicy>,
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON 对象）
///
/// 子 Agent 也实现这个 trait，引擎无需区分「原子工具」与「委派」。
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认不限参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 单独的超时；None 时使用执行器的统一超时
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// 执行工具；Err 中的文本会原样写入 tool 消息
    async fn execute(&self, args: Value) -> Result<String, String>;

    /// 可挂起的执行入口；默认等同 execute
    async fn invoke(&self, args: Value) -> Result<ToolRun, String> {
        self.execute(args).await.map(ToolRun::Done)
    }

    /// 把审阅决定交回此前 Suspended 的内部运行
    async fn resume(&self, suspended: Session, decisions: Vec<Decision>) -> Result<ToolRun, String> {
        let _ = (suspended, decisions);
        Err(format!("Error: action '{}' has no suspended run to resume", self.name()))
    }
}

/// 目录条目：处理器 + 是否需要人工审阅
#[derive(Clone)]
pub struct CatalogEntry {
    pub tool: Arc<dyn Tool>,
    pub requires_review: bool,
}

/// 提供给模型的动作描述
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActionDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 动作目录：按名称有序存储，保证 descriptors 输出稳定
#[derive(Default, Clone)]
pub struct ActionCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl std::fmt::Debug for ActionCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionCatalog")
            .field("actions", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static, requires_review: bool) {
        self.register_arc(Arc::new(tool), requires_review);
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>, requires_review: bool) {
        let name = tool.name().to_string();
        if self.entries.contains_key(&name) {
            tracing::warn!(action = %name, "action registered twice, replacing previous handler");
        }
        self.entries.insert(
            name,
            CatalogEntry {
                tool,
                requires_review,
            },
        );
    }

    pub fn lookup(&self, name: &str) -> Result<&CatalogEntry, AgentError> {
        self.entries
            .get(name)
            .ok_or_else(|| AgentError::UnknownAction(name.to_string()))
    }

    pub fn requires_review(&self, name: &str) -> Result<bool, AgentError> {
        self.lookup(name).map(|e| e.requires_review)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn reviewed_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, e)| e.requires_review)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn descriptors(&self) -> Vec<ActionDescriptor> {
        self.entries
            .iter()
            .map(|(name, e)| ActionDescriptor {
                name: name.clone(),
                description: e.tool.description().to_string(),
                parameters: e.tool.parameters_schema(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! 人工审阅协议：Decision、ReviewPolicy 与中断/恢复的边界数据结构
//!
//! Interrupt 由引擎产出给 CLI / API；ResumeRequest 由 CLI / API 交回引擎。
//! decisions 与 pending_actions 按顺序一一对应。

pub mod collector;

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::AgentError;
use crate::memory::ToolCall;
use crate::tools::ActionCatalog;

pub use collector::{DecisionSource, ReviewCollector, ReviewRequest, ScriptedDecisionSource};

/// 对单个待审阅动作的决定
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
    /// 以新参数执行
    Edit { args: Map<String, Value> },
}

impl Decision {
    pub fn kind(&self) -> DecisionKind {
        match self {
            Decision::Approve => DecisionKind::Approve,
            Decision::Reject => DecisionKind::Reject,
            Decision::Edit { .. } => DecisionKind::Edit,
        }
    }
}

/// 决定类型（用于策略中的 allowed_decisions）
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Approve,
    Reject,
    Edit,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Approve => "approve",
            DecisionKind::Reject => "reject",
            DecisionKind::Edit => "edit",
        }
    }

    pub fn all() -> BTreeSet<DecisionKind> {
        [DecisionKind::Approve, DecisionKind::Reject, DecisionKind::Edit]
            .into_iter()
            .collect()
    }
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个动作的审阅策略
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPolicy {
    pub action_name: String,
    pub allowed_decisions: BTreeSet<DecisionKind>,
}

impl ReviewPolicy {
    pub fn new(action_name: impl Into<String>, allowed: impl IntoIterator<Item = DecisionKind>) -> Self {
        Self {
            action_name: action_name.into(),
            allowed_decisions: allowed.into_iter().collect(),
        }
    }

    /// approve / reject / edit 全部允许
    pub fn permissive(action_name: impl Into<String>) -> Self {
        Self {
            action_name: action_name.into(),
            allowed_decisions: DecisionKind::all(),
        }
    }

    /// reject 总是允许：它是未知输入的安全退路
    pub fn allows(&self, kind: DecisionKind) -> bool {
        kind == DecisionKind::Reject || self.allowed_decisions.contains(&kind)
    }

    pub fn allowed_list(&self) -> Vec<DecisionKind> {
        self.allowed_decisions.iter().copied().collect()
    }
}

/// 审阅策略表：每个需要审阅的动作恰好一条
#[derive(Clone, Debug, Default)]
pub struct PolicySet {
    policies: HashMap<String, ReviewPolicy>,
}

impl PolicySet {
    /// 重复的 action_name 视为配置错误
    pub fn new(policies: impl IntoIterator<Item = ReviewPolicy>) -> Result<Self, AgentError> {
        let mut map = HashMap::new();
        for policy in policies {
            let name = policy.action_name.clone();
            if map.insert(name.clone(), policy).is_some() {
                return Err(AgentError::Config(format!(
                    "duplicate review policy for action '{}'",
                    name
                )));
            }
        }
        Ok(Self { policies: map })
    }

    pub fn get(&self, action_name: &str) -> Result<&ReviewPolicy, AgentError> {
        self.policies
            .get(action_name)
            .ok_or_else(|| AgentError::MissingPolicy(action_name.to_string()))
    }

    /// 校验目录中每个 requires_review 的动作都有策略
    pub fn validate_against(&self, catalog: &ActionCatalog) -> Result<(), AgentError> {
        for name in catalog.reviewed_names() {
            self.get(&name)?;
        }
        Ok(())
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// 中断描述中的单个待审阅动作
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub id: String,
    pub name: String,
    pub args: Map<String, Value>,
}

impl From<&ToolCall> for ActionRequest {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            args: call.args.clone(),
        }
    }
}

impl From<&ActionRequest> for ToolCall {
    fn from(req: &ActionRequest) -> Self {
        ToolCall::new(req.id.clone(), req.name.clone(), req.args.clone())
    }
}

/// 中断响应：{sessionId, pendingActions, policies}
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interrupt {
    pub session_id: String,
    pub pending_actions: Vec<ActionRequest>,
    /// 每个出现的动作名一条，顺序与首次出现一致
    pub policies: Vec<ReviewPolicy>,
}

impl Interrupt {
    /// 待审阅动作（交给 ReviewCollector）
    pub fn pending_calls(&self) -> Vec<ToolCall> {
        self.pending_actions.iter().map(ToolCall::from).collect()
    }
}

/// 恢复请求：{sessionId, decisions}
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResumeRequest {
    pub session_id: String,
    pub decisions: Vec<Decision>,
}

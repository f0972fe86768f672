//! ReviewCollector：逐个展示待审阅动作并收集决定
//!
//! 输入来源（人或测试脚本）实现 DecisionSource。任何无法识别或不合法的输入都降级为 Reject，
//! 并通过 warn 告知来源；只有缺少策略（配置缺陷）与用户中断会返回错误。

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Decision, DecisionKind, ReviewPolicy};
use crate::core::AgentError;
use crate::memory::ToolCall;

/// 展示给审阅者的完整上下文
#[derive(Clone, Debug, PartialEq)]
pub struct ReviewRequest {
    pub action_name: String,
    pub args: Map<String, Value>,
    pub allowed_decisions: Vec<DecisionKind>,
}

/// 决定来源：CLI 标准输入、Web 表单或测试脚本
#[async_trait]
pub trait DecisionSource: Send {
    /// 在读取任何输入之前展示动作名、参数与允许的决定
    async fn present(&mut self, request: &ReviewRequest);

    /// 读取一行决定输入；用户中断时返回 ReviewAborted
    async fn read_choice(&mut self) -> Result<String, AgentError>;

    /// edit 时读取替换参数（JSON 文本）
    async fn read_edit_args(&mut self) -> Result<String, AgentError>;

    /// 输入被降级时的提示
    async fn warn(&mut self, message: &str);
}

/// 审阅收集器（无状态）
#[derive(Debug, Default)]
pub struct ReviewCollector;

impl ReviewCollector {
    pub fn new() -> Self {
        Self
    }

    /// 为每个待审阅动作收集恰好一个决定，顺序与 pending 一致
    pub async fn collect(
        &self,
        pending: &[ToolCall],
        policies: &[ReviewPolicy],
        source: &mut dyn DecisionSource,
    ) -> Result<Vec<Decision>, AgentError> {
        let by_name: HashMap<&str, &ReviewPolicy> = policies
            .iter()
            .map(|p| (p.action_name.as_str(), p))
            .collect();

        // 先整体校验策略，避免收集到一半才发现配置缺陷
        for action in pending {
            if !by_name.contains_key(action.name.as_str()) {
                return Err(AgentError::MissingPolicy(action.name.clone()));
            }
        }

        let mut decisions = Vec::with_capacity(pending.len());
        for action in pending {
            let policy = by_name[action.name.as_str()];
            let request = ReviewRequest {
                action_name: action.name.clone(),
                args: action.args.clone(),
                allowed_decisions: policy.allowed_list(),
            };
            source.present(&request).await;
            let choice = source.read_choice().await?;
            let decision = self.interpret(&choice, policy, source).await?;
            tracing::info!(action = %action.name, decision = %decision.kind(), "review decision");
            decisions.push(decision);
        }
        Ok(decisions)
    }

    async fn interpret(
        &self,
        choice: &str,
        policy: &ReviewPolicy,
        source: &mut dyn DecisionSource,
    ) -> Result<Decision, AgentError> {
        let choice = choice.trim().to_lowercase();
        let decision = match choice.as_str() {
            "approve" => {
                if policy.allows(DecisionKind::Approve) {
                    Decision::Approve
                } else {
                    source
                        .warn(&format!(
                            "'approve' is not allowed for '{}'. Rejecting action.",
                            policy.action_name
                        ))
                        .await;
                    Decision::Reject
                }
            }
            "reject" => Decision::Reject,
            "edit" => {
                if !policy.allows(DecisionKind::Edit) {
                    source
                        .warn(&format!(
                            "'edit' is not allowed for '{}'. Rejecting action.",
                            policy.action_name
                        ))
                        .await;
                    return Ok(Decision::Reject);
                }
                let raw = source.read_edit_args().await?;
                match parse_edit_args(&raw) {
                    Ok(args) => Decision::Edit { args },
                    Err(reason) => {
                        source.warn(&format!("{}. Rejecting action.", reason)).await;
                        Decision::Reject
                    }
                }
            }
            _ => {
                source.warn("Unknown input, defaulting to reject.").await;
                Decision::Reject
            }
        };
        Ok(decision)
    }
}

/// 解析 edit 的替换参数：必须是非空的 JSON 对象
fn parse_edit_args(raw: &str) -> Result<Map<String, Value>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("Edit cancelled (no arguments given)".to_string());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!(
            "Replacement arguments must be a JSON object, got {}",
            json_kind(&other)
        )),
        Err(e) => Err(format!("Invalid JSON: {}", e)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// 脚本化决定来源（测试 / 自动化评测用）：按顺序消费预置输入，并记录展示内容与警告
#[derive(Debug, Default)]
pub struct ScriptedDecisionSource {
    inputs: VecDeque<String>,
    pub presented: Vec<ReviewRequest>,
    pub warnings: Vec<String>,
}

impl ScriptedDecisionSource {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            presented: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

#[async_trait]
impl DecisionSource for ScriptedDecisionSource {
    async fn present(&mut self, request: &ReviewRequest) {
        self.presented.push(request.clone());
    }

    async fn read_choice(&mut self) -> Result<String, AgentError> {
        self.inputs.pop_front().ok_or(AgentError::ReviewAborted)
    }

    async fn read_edit_args(&mut self) -> Result<String, AgentError> {
        self.inputs.pop_front().ok_or(AgentError::ReviewAborted)
    }

    async fn warn(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str) -> ToolCall {
        let mut args = Map::new();
        args.insert("filename".into(), json!("calc.py"));
        ToolCall::new(format!("id_{}", name), name, args)
    }

    #[tokio::test]
    async fn test_collect_one_decision_per_action() {
        let pending = vec![call("write_file"), call("edit_file")];
        let policies = vec![
            ReviewPolicy::permissive("write_file"),
            ReviewPolicy::permissive("edit_file"),
        ];
        let mut source = ScriptedDecisionSource::new(["approve", "REJECT"]);
        let decisions = ReviewCollector::new()
            .collect(&pending, &policies, &mut source)
            .await
            .unwrap();
        assert_eq!(decisions, vec![Decision::Approve, Decision::Reject]);
        assert_eq!(source.presented.len(), 2);
        assert_eq!(source.presented[0].action_name, "write_file");
        assert_eq!(source.presented[0].args["filename"], json!("calc.py"));
    }

    #[tokio::test]
    async fn test_edit_with_valid_object() {
        let pending = vec![call("write_file")];
        let policies = vec![ReviewPolicy::permissive("write_file")];
        let mut source =
            ScriptedDecisionSource::new(["edit", r#"{"filename": "circle.py", "content": "x"}"#]);
        let decisions = ReviewCollector::new()
            .collect(&pending, &policies, &mut source)
            .await
            .unwrap();
        match &decisions[0] {
            Decision::Edit { args } => assert_eq!(args["filename"], json!("circle.py")),
            other => panic!("expected edit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_edit_degrades_to_reject() {
        let pending = vec![call("write_file"), call("write_file")];
        let policies = vec![ReviewPolicy::permissive("write_file")];
        let mut source = ScriptedDecisionSource::new(["edit", "{not json", "edit", "[1, 2]"]);
        let decisions = ReviewCollector::new()
            .collect(&pending, &policies, &mut source)
            .await
            .unwrap();
        assert_eq!(decisions, vec![Decision::Reject, Decision::Reject]);
        assert!(source.warnings[0].starts_with("Invalid JSON"));
        assert!(source.warnings[1].contains("an array"));
    }

    #[tokio::test]
    async fn test_empty_edit_and_unknown_input_reject() {
        let pending = vec![call("write_file"), call("write_file")];
        let policies = vec![ReviewPolicy::permissive("write_file")];
        let mut source = ScriptedDecisionSource::new(["edit", "   ", "yes please"]);
        let decisions = ReviewCollector::new()
            .collect(&pending, &policies, &mut source)
            .await
            .unwrap();
        assert_eq!(decisions, vec![Decision::Reject, Decision::Reject]);
        assert_eq!(source.warnings.len(), 2);
    }

    #[tokio::test]
    async fn test_disallowed_approve_rejects() {
        let pending = vec![call("edit_file")];
        let policies = vec![ReviewPolicy::new("edit_file", [DecisionKind::Reject])];
        let mut source = ScriptedDecisionSource::new(["approve"]);
        let decisions = ReviewCollector::new()
            .collect(&pending, &policies, &mut source)
            .await
            .unwrap();
        assert_eq!(decisions, vec![Decision::Reject]);
        assert_eq!(source.presented[0].allowed_decisions, vec![DecisionKind::Reject]);
    }

    #[tokio::test]
    async fn test_missing_policy_is_error() {
        let pending = vec![call("create_test_file")];
        let mut source = ScriptedDecisionSource::new(["approve"]);
        let err = ReviewCollector::new()
            .collect(&pending, &[], &mut source)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::MissingPolicy(name) if name == "create_test_file"));
        assert!(source.presented.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_input_aborts() {
        let pending = vec![call("write_file")];
        let policies = vec![ReviewPolicy::permissive("write_file")];
        let mut source = ScriptedDecisionSource::new(Vec::<String>::new());
        let err = ReviewCollector::new()
            .collect(&pending, &policies, &mut source)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ReviewAborted));
    }
}

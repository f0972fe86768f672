//! 文本工具调用协议
//!
//! 模型以 JSON 回复：`{"content": "...", "tool_calls": [{"name": "...", "args": {...}}]}`，
//! 也兼容单调用写法 `{"tool": "...", "args": {...}}`。没有 JSON 的回复视为纯文本（本轮结束）。
//! 格式的 JSON Schema 由 schemars 生成并拼入 system prompt，减少 LLM 输出格式错误。

use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::llm::{LlmError, ModelTurn};
use crate::memory::{Message, Role, ToolCall};
use crate::tools::ActionDescriptor;

/// 模型回复格式（也用于 Schema 生成）
#[derive(Debug, Deserialize, JsonSchema)]
struct TurnFormat {
    /// 给用户看的说明文字，可为空
    #[serde(default)]
    content: String,
    /// 按顺序执行的工具调用；为空表示任务完成
    #[serde(default)]
    tool_calls: Vec<CallFormat>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CallFormat {
    /// 可选，缺省时由引擎分配
    #[serde(default)]
    id: Option<String>,
    /// 工具名，如 ls、read_file、write_file、test_writer
    #[serde(alias = "tool")]
    name: String,
    /// 工具参数对象
    #[serde(default)]
    args: Map<String, Value>,
}

/// 单调用写法
#[derive(Debug, Deserialize)]
struct SingleCallFormat {
    tool: String,
    #[serde(default)]
    args: Map<String, Value>,
}

/// 返回回复格式的 JSON Schema 字符串
pub fn turn_schema_json() -> String {
    let schema = schema_for!(TurnFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// 拼接 system prompt：基础提示 + 工具列表 + 回复格式
pub fn render_system_prompt(base: &str, actions: &[ActionDescriptor]) -> String {
    let mut prompt = String::from(base.trim_end());
    prompt.push_str("\n\n## Available tools\n");
    for action in actions {
        prompt.push_str(&format!(
            "\n### {}\n{}\nParameters: {}\n",
            action.name, action.description, action.parameters
        ));
    }
    prompt.push_str(
        "\n## Response format\nReply with ONE JSON object matching this schema. \
         Use an empty tool_calls list when the task is complete.\n",
    );
    prompt.push_str(&turn_schema_json());
    prompt
}

/// 截取回复中的 JSON 片段（```json 代码块优先，其次首个 `{` 到最后一个 `}`）
fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// 解析模型原始输出
pub fn parse_model_output(output: &str) -> Result<ModelTurn, LlmError> {
    let trimmed = output.trim();
    let Some(json_str) = extract_json(trimmed) else {
        return Ok(ModelTurn::text(trimmed));
    };

    let value: Value = match serde_json::from_str(json_str) {
        Ok(v) => v,
        // 明显想用协议（以 `{` 开头或 json 代码块）却写坏了才算格式错误；正文里偶尔的花括号按纯文本处理
        Err(e) if trimmed.starts_with('{') || trimmed.contains("```json") => {
            return Err(LlmError::InvalidResponse(format!("{}: {}", e, json_str)));
        }
        Err(_) => return Ok(ModelTurn::text(trimmed)),
    };

    if value.get("tool").is_some() && value.get("tool_calls").is_none() {
        let single: SingleCallFormat = serde_json::from_value(value)
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        return Ok(ModelTurn::with_calls(
            String::new(),
            vec![ToolCall::new(String::new(), single.tool, single.args)],
        ));
    }

    if value.get("content").is_none() && value.get("tool_calls").is_none() {
        // 普通 JSON 文本（例如模型直接回答了一段 JSON），按纯文本处理
        return Ok(ModelTurn::text(trimmed));
    }

    let turn: TurnFormat =
        serde_json::from_value(value).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
    let calls = turn
        .tool_calls
        .into_iter()
        .map(|c| ToolCall::new(c.id.unwrap_or_default(), c.name, c.args))
        .collect();
    Ok(ModelTurn::with_calls(turn.content, calls))
}

/// 重放给模型的历史条目（只有 user / assistant 两种角色）
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEntry {
    User(String),
    Assistant(String),
}

/// 将会话历史转换为模型可见的对话：assistant 的工具调用按协议格式回放，
/// tool 结果作为 user 的 Observation 消息
pub fn replay_history(history: &[Message]) -> Vec<ChatEntry> {
    history
        .iter()
        .map(|m| match m.role {
            Role::User => ChatEntry::User(m.content.clone()),
            Role::Assistant if m.has_tool_calls() => {
                let calls: Vec<Value> = m
                    .tool_calls
                    .iter()
                    .map(|c| serde_json::json!({"id": c.id, "name": c.name, "args": c.args}))
                    .collect();
                ChatEntry::Assistant(
                    serde_json::json!({"content": m.content, "tool_calls": calls}).to_string(),
                )
            }
            Role::Assistant => ChatEntry::Assistant(m.content.clone()),
            Role::Tool => ChatEntry::User(format!(
                "Observation from {} ({}):\n{}",
                m.name.as_deref().unwrap_or("tool"),
                m.tool_call_id.as_deref().unwrap_or("-"),
                m.content
            )),
        })
        .collect()
}

//! Mock LLM 客户端（用于测试与离线演示，无需 API）
//!
//! - ScriptedLlmClient：按队列依次返回预设的 ModelTurn / 错误，并记录每次调用看到的历史
//! - MockLlmClient：离线演示；先提议把用户需求写入文件（触发人工审阅），拿到结果后结束

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::llm::{LlmClient, LlmError, ModelTurn};
use crate::memory::{Message, Role, ToolCall};
use crate::tools::ActionDescriptor;

/// 脚本化客户端：用于驱动引擎的确定性测试
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<ModelTurn, LlmError>>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new(turns: impl IntoIterator<Item = ModelTurn>) -> Self {
        Self {
            script: Mutex::new(turns.into_iter().map(Ok).collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// 追加一个回复
    pub fn push(&self, turn: ModelTurn) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(turn));
        }
    }

    /// 追加一次失败
    pub fn push_error(&self, err: LlmError) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(err));
        }
    }

    /// 已发生的调用次数
    pub fn call_count(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// 每次调用时模型看到的历史快照
    pub fn seen_histories(&self) -> Vec<Vec<Message>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn generate(
        &self,
        _system: &str,
        history: &[Message],
        _actions: &[ActionDescriptor],
    ) -> Result<ModelTurn, LlmError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(history.to_vec());
        }
        self.script
            .lock()
            .map_err(|_| LlmError::Api("script lock poisoned".into()))?
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Api("scripted responses exhausted".into())))
    }
}

/// 离线演示客户端
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(
        &self,
        _system: &str,
        history: &[Message],
        actions: &[ActionDescriptor],
    ) -> Result<ModelTurn, LlmError> {
        let last = history.last();
        let can_write = actions.iter().any(|a| a.name == "write_file");

        match last {
            Some(m) if m.role == Role::User && can_write => {
                let mut args = Map::new();
                args.insert("file_path".into(), Value::String("/REQUEST.md".into()));
                args.insert(
                    "content".into(),
                    Value::String(format!("# Request\n\n{}\n", m.content)),
                );
                Ok(ModelTurn::with_calls(
                    "Mock: recording the request before implementing it.",
                    vec![ToolCall::new("", "write_file", args)],
                ))
            }
            Some(m) if m.role == Role::Tool => Ok(ModelTurn::text(format!(
                "Mock: {} returned: {}",
                m.name.as_deref().unwrap_or("tool"),
                m.content
            ))),
            Some(m) => Ok(ModelTurn::text(format!("Echo from Mock: {}", m.content))),
            None => Ok(ModelTurn::text("Echo from Mock: (no input)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_order_and_exhaustion() {
        let client = ScriptedLlmClient::new([ModelTurn::text("one")]);
        client.push_error(LlmError::Timeout);

        let history = vec![Message::user("hi")];
        assert_eq!(
            client.generate("", &history, &[]).await.unwrap().content,
            "one"
        );
        assert_eq!(
            client.generate("", &history, &[]).await.unwrap_err(),
            LlmError::Timeout
        );
        assert!(client.generate("", &history, &[]).await.is_err());
        assert_eq!(client.call_count(), 3);
        assert_eq!(client.seen_histories()[0], history);
    }

    #[tokio::test]
    async fn test_mock_proposes_write_then_finishes() {
        let write = ActionDescriptor {
            name: "write_file".into(),
            description: String::new(),
            parameters: serde_json::json!({}),
        };
        let client = MockLlmClient;
        let turn = client
            .generate("", &[Message::user("area of a circle")], &[write.clone()])
            .await
            .unwrap();
        assert_eq!(turn.tool_calls[0].name, "write_file");

        let call = turn.tool_calls[0].clone();
        let history = vec![Message::tool(&call, "Created file /REQUEST.md (10 bytes)")];
        let done = client.generate("", &history, &[write]).await.unwrap();
        assert!(done.tool_calls.is_empty());
        assert!(done.content.contains("Created file"));
    }
}

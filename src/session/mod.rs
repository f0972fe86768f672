//! 会话：历史、流式游标、挂起标记与待审阅动作
//!
//! - history 只追加，不重排、不删除
//! - cursor 记录已交付给 StreamingReporter 的消息数，单调不减
//! - suspended / pending 仅由 ExecutionEngine 修改（pub(crate)）
//! - 子 Agent 在内部挂起时，其会话整体嵌在父会话的 PendingAction::Delegated 中，随父会话一起存检查点

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::{Message, ToolCall};
use crate::review::ReviewPolicy;

pub use store::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};

/// 单个会话（同时也是 Checkpoint 的快照内容）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: String,
    history: Vec<Message>,
    cursor: usize,
    suspended: bool,
    pending: Vec<PendingAction>,
    created_at: DateTime<Utc>,
    /// 最近一次修改时间，供外部监管者清理长期挂起的会话
    updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            history: Vec::new(),
            cursor: 0,
            suspended: false,
            pending: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// 挂起时等待处理的条目（按模型给出的顺序）
    pub fn pending(&self) -> &[PendingAction] {
        &self.pending
    }

    /// 需要人工决定的动作，委派条目展开为子会话中的动作
    pub fn pending_actions(&self) -> Vec<ToolCall> {
        self.pending.iter().flat_map(PendingAction::review_calls).collect()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 最后一条 assistant 文本（子 Agent 用作返回值）
    pub fn last_assistant_content(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|m| m.role == crate::memory::Role::Assistant && !m.content.is_empty())
            .map(|m| m.content.as_str())
    }

    /// 取出 cursor 之后的新消息，并把 cursor 推进到当前历史末尾
    ///
    /// 返回的迭代器只覆盖调用时刻的历史长度；重复调用不会重发已交付的消息。
    pub fn drain_new(&mut self) -> std::slice::Iter<'_, Message> {
        let start = self.cursor.min(self.history.len());
        self.cursor = self.history.len();
        self.history[start..].iter()
    }

    pub(crate) fn append(&mut self, message: Message) {
        self.history.push(message);
        self.touch();
    }

    pub(crate) fn suspend(&mut self, pending: Vec<PendingAction>) {
        self.pending = pending;
        self.suspended = true;
        self.touch();
    }

    pub(crate) fn take_pending(&mut self) -> Vec<PendingAction> {
        self.suspended = false;
        self.touch();
        std::mem::take(&mut self.pending)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// 挂起会话中的一个待处理条目
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingAction {
    /// 本会话自己的待审阅调用
    Review { call: ToolCall },
    /// 委派调用的子运行在内部挂起；policies 覆盖子会话中全部待审阅动作
    Delegated {
        call: ToolCall,
        session: Box<Session>,
        policies: Vec<ReviewPolicy>,
    },
}

impl PendingAction {
    /// 本会话中对应的调用
    pub fn call(&self) -> &ToolCall {
        match self {
            PendingAction::Review { call } | PendingAction::Delegated { call, .. } => call,
        }
    }

    pub fn review_calls(&self) -> Vec<ToolCall> {
        match self {
            PendingAction::Review { call } => vec![call.clone()],
            PendingAction::Delegated { session, .. } => session.pending_actions(),
        }
    }

    /// 恢复该条目需要的决定数
    pub fn decision_count(&self) -> usize {
        match self {
            PendingAction::Review { .. } => 1,
            PendingAction::Delegated { session, .. } => session
                .pending
                .iter()
                .map(PendingAction::decision_count)
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_never_reemits() {
        let mut session = Session::new("s");
        session.append(Message::user("a"));
        session.append(Message::assistant("b", Vec::new()));

        let first: Vec<String> = session.drain_new().map(|m| m.content.clone()).collect();
        assert_eq!(first, vec!["a", "b"]);
        assert_eq!(session.cursor(), 2);

        assert_eq!(session.drain_new().count(), 0);

        session.append(Message::assistant("c", Vec::new()));
        let second: Vec<String> = session.drain_new().map(|m| m.content.clone()).collect();
        assert_eq!(second, vec!["c"]);
        assert_eq!(session.cursor(), 3);
    }

    #[test]
    fn test_suspend_and_take_pending() {
        let mut session = Session::new("s");
        let call = ToolCall::new("c1", "write_file", Default::default());
        session.suspend(vec![PendingAction::Review { call: call.clone() }]);
        assert!(session.is_suspended());
        assert_eq!(session.pending_actions(), vec![call.clone()]);

        let taken = session.take_pending();
        assert_eq!(taken, vec![PendingAction::Review { call }]);
        assert!(!session.is_suspended());
        assert!(session.pending_actions().is_empty());
    }

    #[test]
    fn test_delegated_pending_flattens_inner_actions() {
        let mut inner = Session::new("test_writer-1");
        let create = ToolCall::new("c9", "create_test_file", Default::default());
        inner.suspend(vec![PendingAction::Review { call: create.clone() }]);

        let delegate = ToolCall::new("c1", "test_writer", Default::default());
        let write = ToolCall::new("c2", "write_file", Default::default());
        let mut outer = Session::new("s");
        outer.suspend(vec![
            PendingAction::Delegated {
                call: delegate.clone(),
                session: Box::new(inner),
                policies: vec![ReviewPolicy::permissive("create_test_file")],
            },
            PendingAction::Review { call: write.clone() },
        ]);

        assert_eq!(outer.pending_actions(), vec![create, write]);
        assert_eq!(outer.pending()[0].call(), &delegate);
        let count: usize = outer.pending().iter().map(PendingAction::decision_count).sum();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_last_assistant_content_skips_tool_only_turns() {
        let mut session = Session::new("s");
        session.append(Message::assistant("done", Vec::new()));
        let call = ToolCall::new("c1", "ls", Default::default());
        session.append(Message::assistant("", vec![call.clone()]));
        session.append(Message::tool(&call, "x"));
        assert_eq!(session.last_assistant_content(), Some("done"));
    }
}

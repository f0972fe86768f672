//! Checkpoint 存储抽象层
//!
//! 按 session id 保存会话完整快照（历史 + 游标 + 挂起状态）。save 要么整体替换旧快照，
//! 要么旧快照保持不变：内存实现靠整条记录替换，文件实现靠「写临时文件再 rename」。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Session;
use crate::core::AgentError;

/// Checkpoint 存储接口
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// 保存会话快照（整体替换）
    async fn save(&self, session: &Session) -> Result<(), AgentError>;

    /// 读取会话快照；不存在时返回 SessionNotFound
    async fn load(&self, session_id: &str) -> Result<Session, AgentError>;

    /// 显式清理（过期策略由外部决定）
    async fn remove(&self, session_id: &str) -> Result<bool, AgentError>;
}

/// 内存 Checkpoint 存储
#[derive(Default)]
pub struct MemoryCheckpointStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前保存的会话数
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, session: &Session) -> Result<(), AgentError> {
        self.sessions
            .write()
            .await
            .insert(session.id().to_string(), session.clone());
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Session, AgentError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| AgentError::SessionNotFound(session_id.to_string()))
    }

    async fn remove(&self, session_id: &str) -> Result<bool, AgentError> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }
}

/// 文件 Checkpoint 存储：每个会话一个 JSON 文件
#[derive(Debug)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        let file_name: String = session_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

fn io_err(e: impl std::fmt::Display) -> AgentError {
    AgentError::Checkpoint(e.to_string())
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, session: &Session) -> Result<(), AgentError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;
        let path = self.path_for(session.id());
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(session).map_err(io_err)?;
        tokio::fs::write(&tmp, data).await.map_err(io_err)?;
        // rename 在同一目录内是原子替换
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;
        tracing::debug!(session = %session.id(), path = %path.display(), "checkpoint saved");
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Session, AgentError> {
        let path = self.path_for(session_id);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AgentError::SessionNotFound(session_id.to_string()))
            }
            Err(e) => return Err(io_err(e)),
        };
        serde_json::from_str(&data).map_err(io_err)
    }

    async fn remove(&self, session_id: &str) -> Result<bool, AgentError> {
        match tokio::fs::remove_file(self.path_for(session_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(e)),
        }
    }
}

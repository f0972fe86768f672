//! 会话租约：同一 session id 同一时刻只允许一个进行中的 step / resume
//!
//! 每个会话对应一个容量为 1 的 Semaphore；拿不到许可即说明已有调用在执行，调用方直接被拒绝而不是排队。
//! release 归还许可后，若没有其他调用方持有该 Semaphore，则移除对应条目，表的大小只随并发会话数变化。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

/// 会话租约表
#[derive(Default)]
pub struct SessionLeases {
    slots: Mutex<HashMap<String, Arc<Semaphore>>>,
}

/// 持有期间独占该会话；Drop 时归还许可（条目清理见 SessionLeases::release）
#[derive(Debug)]
pub struct SessionLease {
    session_id: String,
    _permit: OwnedSemaphorePermit,
}

impl SessionLease {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl SessionLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试获取会话租约；已被占用时返回 None
    pub async fn try_acquire(&self, session_id: &str) -> Option<SessionLease> {
        let semaphore = {
            let mut slots = self.slots.lock().await;
            slots
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        semaphore.try_acquire_owned().ok().map(|permit| SessionLease {
            session_id: session_id.to_string(),
            _permit: permit,
        })
    }

    /// 归还租约并清理空闲条目
    pub async fn release(&self, lease: SessionLease) {
        let SessionLease {
            session_id,
            _permit: permit,
        } = lease;
        drop(permit);
        let mut slots = self.slots.lock().await;
        // 许可也持有一份引用；只剩表自身这一份时说明无人占用
        if slots
            .get(&session_id)
            .is_some_and(|semaphore| Arc::strong_count(semaphore) == 1)
        {
            slots.remove(&session_id);
            tracing::debug!(session_id = %session_id, "Session lease slot removed");
        }
    }

    /// 当前跟踪的会话条目数
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}

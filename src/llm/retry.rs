//! 重试装饰器：对瞬时错误做指数退避重试
//!
//! 模型接口对重试幂等，因此可以整体重放一次 generate。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, ModelTurn};
use crate::memory::Message;
use crate::tools::ActionDescriptor;

/// 重试配置
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 首次失败后的最多重试次数
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 第 attempt 次重试前的等待（attempt 从 0 开始）
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// 带重试的 LLM 客户端
pub struct RetryingLlmClient {
    inner: Arc<dyn LlmClient>,
    config: RetryConfig,
}

impl RetryingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl LlmClient for RetryingLlmClient {
    async fn generate(
        &self,
        system: &str,
        history: &[Message],
        actions: &[ActionDescriptor],
    ) -> Result<ModelTurn, LlmError> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(system, history, actions).await {
                Ok(turn) => return Ok(turn),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let wait = self.config.backoff(attempt);
                    tracing::warn!(error = %e, attempt = attempt + 1, wait_ms = wait.as_millis() as u64, "LLM call failed, retrying");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.backoff(0), Duration::from_millis(500));
        assert_eq!(cfg.backoff(1), Duration::from_millis(1000));
        assert_eq!(cfg.backoff(10), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let scripted = Arc::new(ScriptedLlmClient::default());
        scripted.push_error(LlmError::Timeout);
        scripted.push_error(LlmError::RateLimited("429".into()));
        scripted.push(ModelTurn::text("ok"));
        let client = RetryingLlmClient::new(scripted.clone(), fast(2));

        let turn = client.generate("", &[], &[]).await.unwrap();
        assert_eq!(turn.content, "ok");
        assert_eq!(scripted.call_count(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let scripted = Arc::new(ScriptedLlmClient::default());
        for _ in 0..3 {
            scripted.push_error(LlmError::Network("down".into()));
        }
        let client = RetryingLlmClient::new(scripted.clone(), fast(1));
        assert!(client.generate("", &[], &[]).await.is_err());
        assert_eq!(scripted.call_count(), 2);
    }

    #[tokio::test]
    async fn test_api_error_not_retried() {
        let scripted = Arc::new(ScriptedLlmClient::default());
        scripted.push_error(LlmError::Api("bad key".into()));
        let client = RetryingLlmClient::new(scripted.clone(), fast(3));
        assert!(client.generate("", &[], &[]).await.is_err());
        assert_eq!(scripted.call_count(), 1);
    }
}

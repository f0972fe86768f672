//! 限流装饰器：令牌桶
//!
//! 桶初始为空，按 requests_per_second 匀速补充，上限 max_bucket_size；
//! 拿不到令牌时每 check_every 轮询一次。默认 0.5 rps（约每 2 秒一次请求）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::llm::{LlmClient, LlmError, ModelTurn};
use crate::memory::Message;
use crate::tools::ActionDescriptor;

/// 限流参数
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    pub check_every: Duration,
    pub max_bucket_size: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 0.5,
            check_every: Duration::from_millis(100),
            max_bucket_size: 5.0,
        }
    }
}

/// 令牌桶状态
#[derive(Debug)]
struct TokenBucket {
    rate: f64,
    capacity: f64,
    tokens: f64,
    last: Option<Instant>,
}

impl TokenBucket {
    fn new(rate: f64, capacity: f64) -> Self {
        Self {
            rate,
            capacity,
            tokens: 0.0,
            last: None,
        }
    }

    /// 按流逝时间补充令牌，够 1 个则消耗并返回 true
    fn try_take(&mut self, now: Instant) -> bool {
        let last = *self.last.get_or_insert(now);
        let elapsed = now.saturating_duration_since(last).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last = Some(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// 带限流的 LLM 客户端
pub struct RateLimitedLlmClient {
    inner: Arc<dyn LlmClient>,
    bucket: Mutex<TokenBucket>,
    check_every: Duration,
}

impl RateLimitedLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, config: RateLimitConfig) -> Self {
        Self {
            inner,
            bucket: Mutex::new(TokenBucket::new(
                config.requests_per_second,
                config.max_bucket_size,
            )),
            check_every: config.check_every,
        }
    }

    /// 等待直到拿到一个令牌
    async fn acquire(&self) {
        loop {
            if self.bucket.lock().await.try_take(Instant::now()) {
                return;
            }
            tokio::time::sleep(self.check_every).await;
        }
    }
}

#[async_trait]
impl LlmClient for RateLimitedLlmClient {
    async fn generate(
        &self,
        system: &str,
        history: &[Message],
        actions: &[ActionDescriptor],
    ) -> Result<ModelTurn, LlmError> {
        self.acquire().await;
        self.inner.generate(system, history, actions).await
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;

    #[test]
    fn test_bucket_starts_empty_and_refills() {
        let mut bucket = TokenBucket::new(0.5, 5.0);
        let t0 = Instant::now();
        assert!(!bucket.try_take(t0));
        assert!(!bucket.try_take(t0 + Duration::from_secs(1)));
        assert!(bucket.try_take(t0 + Duration::from_secs(2)));
        assert!(!bucket.try_take(t0 + Duration::from_secs(2)));
    }

    #[test]
    fn test_bucket_capped_at_capacity() {
        let mut bucket = TokenBucket::new(1.0, 2.0);
        let t0 = Instant::now();
        bucket.try_take(t0);
        let later = t0 + Duration::from_secs(60);
        assert!(bucket.try_take(later));
        assert!(bucket.try_take(later));
        assert!(!bucket.try_take(later));
    }

    #[tokio::test]
    async fn test_limited_client_passes_through() {
        let scripted = Arc::new(ScriptedLlmClient::new([ModelTurn::text("ok")]));
        let client = RateLimitedLlmClient::new(
            scripted.clone(),
            RateLimitConfig {
                requests_per_second: 200.0,
                check_every: Duration::from_millis(1),
                max_bucket_size: 1.0,
            },
        );
        let turn = client.generate("", &[], &[]).await.unwrap();
        assert_eq!(turn.content, "ok");
        assert_eq!(scripted.call_count(), 1);
    }
}

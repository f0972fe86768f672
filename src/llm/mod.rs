//! LLM 层：客户端抽象、文本工具协议、OpenAI 兼容实现、Mock，以及限流/重试装饰器

pub mod mock;
pub mod openai;
pub mod protocol;
pub mod providers;
pub mod rate_limit;
pub mod retry;
pub mod traits;

use std::sync::Arc;

pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use providers::Provider;
pub use rate_limit::{RateLimitConfig, RateLimitedLlmClient};
pub use retry::{RetryConfig, RetryingLlmClient};
pub use traits::{LlmClient, LlmError, ModelTurn};

use crate::config::EngineSettings;

/// 按配置创建 LLM 客户端：后端 -> 限流 -> 重试（重试的每一次都重新排队取令牌）
pub fn create_llm(settings: &EngineSettings) -> Arc<dyn LlmClient> {
    let backend: Arc<dyn LlmClient> = match settings.provider {
        Provider::Mock => {
            tracing::info!("Using mock LLM backend");
            return Arc::new(MockLlmClient);
        }
        provider => {
            let base_url = settings
                .base_url
                .as_deref()
                .or_else(|| provider.default_base_url());
            let api_key = provider.api_key();
            tracing::info!(provider = %provider, model = %settings.model_name, "Using OpenAI-compatible backend");
            Arc::new(
                OpenAiClient::new(base_url, &settings.model_name, api_key.as_deref())
                    .with_request_timeout(settings.request_timeout_secs),
            )
        }
    };

    let limited: Arc<dyn LlmClient> = Arc::new(RateLimitedLlmClient::new(
        backend,
        RateLimitConfig {
            requests_per_second: settings.requests_per_second,
            check_every: settings.check_every,
            max_bucket_size: settings.max_bucket_size,
        },
    ));
    Arc::new(RetryingLlmClient::new(
        limited,
        RetryConfig::default().with_max_retries(settings.max_retries),
    ))
}

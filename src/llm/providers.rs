//! 模型提供方预设（均为 OpenAI 兼容格式）
//!
//! `LLM_MODEL=provider:model` 中的 provider 决定 base_url 与 API Key 环境变量（`<PROVIDER>_API_KEY`，
//! 找不到时回退到 `OPENAI_API_KEY`）。

use crate::core::AgentError;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// 已知的模型提供方
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    DeepSeek,
    Groq,
    OpenRouter,
    Ollama,
    /// 离线 Mock，不访问网络
    Mock,
}

impl Provider {
    pub fn parse(name: &str) -> Result<Self, AgentError> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "deepseek" => Ok(Provider::DeepSeek),
            "groq" => Ok(Provider::Groq),
            "openrouter" => Ok(Provider::OpenRouter),
            "ollama" => Ok(Provider::Ollama),
            "mock" => Ok(Provider::Mock),
            other => Err(AgentError::Config(format!(
                "unknown LLM provider '{}' (expected openai, deepseek, groq, openrouter, ollama or mock)",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::DeepSeek => "deepseek",
            Provider::Groq => "groq",
            Provider::OpenRouter => "openrouter",
            Provider::Ollama => "ollama",
            Provider::Mock => "mock",
        }
    }

    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some(OPENAI_BASE_URL),
            Provider::DeepSeek => Some(DEEPSEEK_BASE_URL),
            Provider::Groq => Some(GROQ_BASE_URL),
            Provider::OpenRouter => Some(OPENROUTER_BASE_URL),
            Provider::Ollama => Some(OLLAMA_BASE_URL),
            Provider::Mock => None,
        }
    }

    /// 读取 API Key：优先 `<PROVIDER>_API_KEY`，其次 `OPENAI_API_KEY`
    pub fn api_key(&self) -> Option<String> {
        let var = format!("{}_API_KEY", self.as_str().to_uppercase());
        std::env::var(var)
            .ok()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

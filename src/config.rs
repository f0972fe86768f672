//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `AUTODEV__*` 覆盖（双下划线表示嵌套，如 `AUTODEV__LLM__PROVIDER=groq`）。
//! 兼容 `LLM_MODEL=provider:model` 写法，它覆盖 llm.model。
//! EngineSettings 在构建时校验，缺少模型或数值越界立即失败，而不是拖到第一次调用模型。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::core::AgentError;
use crate::llm::Provider;
use crate::review::{DecisionKind, PolicySet, ReviewPolicy};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
    pub review: ReviewSection,
}

/// [app] 段：沙箱目录、会话、步数上限、检查点目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub sandbox_dir: PathBuf,
    pub session_id: String,
    /// 单次 step 内模型调用次数上限
    pub step_budget: usize,
    /// 设置后检查点写入该目录（每会话一个 JSON 文件），否则仅保存在内存
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            sandbox_dir: PathBuf::from("./my_project_sandbox"),
            session_id: "autodev-session-1".to_string(),
            step_budget: 50,
            checkpoint_dir: None,
        }
    }
}

/// [llm] 段：模型选择、限流与重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// model 不带 `provider:` 前缀时使用
    pub provider: Option<String>,
    /// `provider:model` 或裸模型名
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub requests_per_second: f64,
    pub max_bucket_size: f64,
    pub check_every_ms: u64,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            base_url: None,
            requests_per_second: 0.5,
            max_bucket_size: 5.0,
            check_every_ms: 100,
            max_retries: 2,
            request_timeout_secs: 120,
        }
    }
}

/// [tools] 段：工具超时与测试命令
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    /// 子 Agent 整次委派的超时（秒）
    pub subagent_timeout_secs: u64,
    pub test_command: Vec<String>,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 300,
            subagent_timeout_secs: 1800,
            test_command: vec!["pytest".to_string()],
        }
    }
}

/// [review] 段：需要审阅的动作及其允许的决定
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReviewSection {
    pub policies: Vec<PolicyEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyEntry {
    pub action: String,
    #[serde(default = "default_allowed")]
    pub allowed: Vec<DecisionKind>,
}

fn default_allowed() -> Vec<DecisionKind> {
    DecisionKind::all().into_iter().collect()
}

/// 默认需要审阅的动作：三个写文件类工具（create_test_file 位于 test_writer 内部，挂起时上浮到外层会话）
pub const DEFAULT_REVIEWED_ACTIONS: &[&str] = &["create_test_file", "write_file", "edit_file"];

impl Default for ReviewSection {
    fn default() -> Self {
        Self {
            policies: DEFAULT_REVIEWED_ACTIONS
                .iter()
                .map(|a| PolicyEntry {
                    action: a.to_string(),
                    allowed: default_allowed(),
                })
                .collect(),
        }
    }
}

impl ReviewSection {
    pub fn policy_set(&self) -> Result<PolicySet, AgentError> {
        PolicySet::new(
            self.policies
                .iter()
                .map(|p| ReviewPolicy::new(p.action.clone(), p.allowed.iter().copied())),
        )
    }
}

/// 引擎与模型的显式配置（构建时校验）
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub provider: Provider,
    pub model_name: String,
    pub base_url: Option<String>,
    pub requests_per_second: f64,
    pub max_bucket_size: f64,
    pub check_every: Duration,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
    pub step_budget: usize,
}

impl EngineSettings {
    pub fn from_config(cfg: &AppConfig) -> Result<Self, AgentError> {
        let model = cfg
            .llm
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| {
                AgentError::Config(
                    "LLM_MODEL is missing. Set LLM_MODEL (e.g. LLM_MODEL=groq:llama3-70b-8192) \
                     or llm.model in config/default.toml."
                        .to_string(),
                )
            })?;

        let (provider, model_name) = match model.split_once(':') {
            Some((provider, name)) => {
                if provider.trim().is_empty() || name.trim().is_empty() {
                    return Err(AgentError::Config(format!(
                        "invalid model '{}': expected 'provider:model'",
                        model
                    )));
                }
                (Provider::parse(provider)?, name.trim().to_string())
            }
            None => {
                let provider = Provider::parse(cfg.llm.provider.as_deref().unwrap_or("openai"))?;
                (provider, model.to_string())
            }
        };

        let llm = &cfg.llm;
        if !(llm.requests_per_second.is_finite() && llm.requests_per_second > 0.0) {
            return Err(AgentError::Config(format!(
                "llm.requests_per_second must be positive, got {}",
                llm.requests_per_second
            )));
        }
        if llm.max_bucket_size < 1.0 {
            return Err(AgentError::Config(format!(
                "llm.max_bucket_size must be at least 1, got {}",
                llm.max_bucket_size
            )));
        }
        if cfg.app.step_budget == 0 {
            return Err(AgentError::Config("app.step_budget must be at least 1".into()));
        }

        Ok(Self {
            provider,
            model_name,
            base_url: llm.base_url.clone(),
            requests_per_second: llm.requests_per_second,
            max_bucket_size: llm.max_bucket_size,
            check_every: Duration::from_millis(llm.check_every_ms.max(1)),
            max_retries: llm.max_retries,
            request_timeout_secs: llm.request_timeout_secs,
            step_budget: cfg.app.step_budget,
        })
    }
}

/// 从 config 目录加载配置，环境变量 AUTODEV__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 叠加环境变量 AUTODEV__*（双下划线表示嵌套键）
/// 4. 最后 LLM_MODEL 覆盖 llm.model
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, AgentError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        if !path.exists() {
            return Err(AgentError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        builder = builder.add_source(config::File::from(path.to_path_buf()));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("AUTODEV")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(" ")
            .with_list_parse_key("tools.test_command"),
    );

    let mut cfg: AppConfig = builder
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| AgentError::Config(e.to_string()))?;

    if let Ok(model) = std::env::var("LLM_MODEL") {
        if !model.trim().is_empty() {
            cfg.llm.model = Some(model);
        }
    }
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_model(model: &str) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.llm.model = Some(model.to_string());
        cfg
    }

    #[test]
    fn test_defaults_match_reference_behaviour() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.step_budget, 50);
        assert_eq!(cfg.app.session_id, "autodev-session-1");
        assert_eq!(cfg.llm.requests_per_second, 0.5);
        assert_eq!(cfg.tools.test_command, vec!["pytest".to_string()]);
        let set = cfg.review.policy_set().unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.get("write_file").is_ok());
        assert!(set.get("create_test_file").is_ok());
        assert!(set.get("test_writer").is_err());
    }

    #[test]
    fn test_settings_parse_provider_prefix() {
        let s = EngineSettings::from_config(&with_model("groq:llama3-70b-8192")).unwrap();
        assert_eq!(s.provider, Provider::Groq);
        assert_eq!(s.model_name, "llama3-70b-8192");
        assert_eq!(s.step_budget, 50);

        let s = EngineSettings::from_config(&with_model("ollama:qwen2.5:7b")).unwrap();
        assert_eq!(s.provider, Provider::Ollama);
        assert_eq!(s.model_name, "qwen2.5:7b");

        let s = EngineSettings::from_config(&with_model("gpt-4o-mini")).unwrap();
        assert_eq!(s.provider, Provider::OpenAi);
    }

    #[test]
    fn test_settings_fail_fast() {
        assert!(matches!(
            EngineSettings::from_config(&AppConfig::default()),
            Err(AgentError::Config(_))
        ));
        assert!(EngineSettings::from_config(&with_model("groq:")).is_err());
        assert!(EngineSettings::from_config(&with_model(":model")).is_err());

        let mut cfg = with_model("mock:demo");
        cfg.llm.requests_per_second = 0.0;
        assert!(EngineSettings::from_config(&cfg).is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autodev.toml");
        std::fs::write(
            &path,
            r#"
[app]
step_budget = 7

[llm]
model = "mock:demo"

[[review.policies]]
action = "write_file"
allowed = ["approve", "reject"]
"#,
        )
        .unwrap();
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.app.step_budget, 7);
        assert_eq!(cfg.app.session_id, "autodev-session-1");
        let set = cfg.review.policy_set().unwrap();
        assert_eq!(set.len(), 1);
        assert!(!set.get("write_file").unwrap().allows(DecisionKind::Edit));

        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());
    }
}

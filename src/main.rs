//! AutoDev - 可人工审阅的 TDD 编码智能体
//!
//! 入口：初始化日志、加载配置、组装引擎，然后运行「执行 -> 中断审阅 -> 恢复」循环。

use std::path::PathBuf;

use anyhow::Context;
use autodev::agent::{build_autodev_agent, setup_environment, DEFAULT_PROMPT};
use autodev::config::{load_config, EngineSettings};
use autodev::core::AgentError;
use autodev::engine::{StepInput, StepResult};
use autodev::llm::create_llm;
use autodev::observability;
use autodev::review::{ResumeRequest, ReviewCollector};
use autodev::ui::{StdinDecisionSource, StreamingReporter};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "autodev", version, about = "TDD coding agent with human review of file writes")]
struct Cli {
    /// 任务描述（默认：圆面积函数）
    prompt: Option<String>,

    /// 会话 id（覆盖 app.session_id）
    #[arg(long)]
    session: Option<String>,

    /// 额外的配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// 沙箱目录（覆盖 app.sandbox_dir）
    #[arg(long)]
    sandbox: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let cli = Cli::parse();

    let mut cfg = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = cli.sandbox {
        cfg.app.sandbox_dir = dir;
    }
    if let Some(id) = cli.session {
        cfg.app.session_id = id;
    }
    let settings = EngineSettings::from_config(&cfg).context("Invalid engine settings")?;

    let mut reporter = StreamingReporter::stdout();
    reporter.banner("Starting AutoDev Agent...")?;

    let sandbox = setup_environment(&cfg.app.sandbox_dir).context("Failed to set up sandbox")?;
    let llm = create_llm(&settings);
    let engine = build_autodev_agent(&cfg, &settings, &sandbox, llm).context("Failed to build agent")?;
    let session_id = cfg.app.session_id.clone();

    let mut result = match engine.pending_interrupt(&session_id).await? {
        Some(interrupt) => {
            reporter.info(&format!("Session {} is awaiting review, continuing it.", session_id))?;
            StepResult::Interrupted(interrupt)
        }
        None => {
            reporter.info("\nInvoking agent...")?;
            let prompt = cli.prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string());
            engine
                .run(&session_id, StepInput::user(prompt), &mut reporter)
                .await
                .context("Agent run failed")?
        }
    };

    let collector = ReviewCollector::new();
    let mut source = StdinDecisionSource::new();
    loop {
        match result {
            StepResult::Finished => {
                reporter.finished()?;
                break;
            }
            StepResult::Interrupted(interrupt) => {
                reporter.interrupt_summary(&interrupt)?;
                let decisions = match collector
                    .collect(&interrupt.pending_calls(), &interrupt.policies, &mut source)
                    .await
                {
                    Ok(decisions) => decisions,
                    // 检查点在提示之前已保存，直接退出即可
                    Err(AgentError::ReviewAborted) => {
                        reporter.exiting()?;
                        return Ok(());
                    }
                    Err(e) => return Err(e).context("Review failed"),
                };

                reporter.info("Resuming execution...")?;
                let request = ResumeRequest {
                    session_id: interrupt.session_id.clone(),
                    decisions,
                };
                result = engine
                    .resume(request, &mut reporter)
                    .await
                    .context("Resume failed")?;
            }
        }
    }

    let (prompt_tokens, completion_tokens, total) = engine.token_usage();
    tracing::info!(prompt_tokens, completion_tokens, total, "Token usage");
    Ok(())
}

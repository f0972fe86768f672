//! 终端渲染与人工审阅输入
//!
//! StreamingReporter 作为 StepObserver：每次追加后 drain 会话的新消息并按角色渲染成带标题的块
//! （HUMAN 绿、AI 蓝、Tool Call 黄、Tool Output 紫）。游标保存在会话上，恢复后不会重复输出。
//! StdinDecisionSource 从标准输入逐行读取决定；EOF 或 Ctrl-C 视为中断审阅。

use std::io::{self, Stdout, Write};

use async_trait::async_trait;
use crossterm::style::{Color, Stylize};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::core::AgentError;
use crate::engine::StepObserver;
use crate::memory::{Message, Role};
use crate::review::{DecisionSource, Interrupt, ReviewRequest};
use crate::session::Session;

/// 工具输出显示的最大字符数，超出折叠
const MAX_TOOL_OUTPUT_CHARS: usize = 2000;
const RULE_WIDTH: usize = 50;

fn truncate_for_display(content: &str, limit: usize) -> String {
    let total = content.chars().count();
    if total <= limit {
        return content.to_string();
    }
    let head: String = content.chars().take(limit).collect();
    format!("{}\n... [output truncated, {} chars total]", head, total)
}

fn pretty_json(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// 流式输出：只渲染会话中尚未交付的消息
pub struct StreamingReporter<W: Write + Send = Stdout> {
    out: W,
    rendered: usize,
}

impl StreamingReporter<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> StreamingReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out, rendered: 0 }
    }

    /// 本 reporter 累计渲染的消息数
    pub fn rendered(&self) -> usize {
        self.rendered
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// 渲染 cursor 之后的全部消息并推进 cursor
    pub fn drain(&mut self, session: &mut Session) {
        for message in session.drain_new() {
            if let Err(e) = render_message(&mut self.out, message) {
                tracing::warn!(error = %e, "Failed to render message");
            }
            self.rendered += 1;
        }
        let _ = self.out.flush();
    }

    pub fn banner(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text.with(Color::Green).bold())
    }

    pub fn info(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text.with(Color::Cyan).dim())
    }

    pub fn finished(&mut self) -> io::Result<()> {
        writeln!(self.out, "\n{}", "FINISHED.".with(Color::Green).bold())?;
        self.out.flush()
    }

    pub fn exiting(&mut self) -> io::Result<()> {
        writeln!(self.out, "\n{}", "Exiting...".with(Color::Red).bold())?;
        self.out.flush()
    }

    pub fn error(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text.with(Color::Red).bold())?;
        self.out.flush()
    }

    /// 中断概要：有多少动作等待审阅
    pub fn interrupt_summary(&mut self, interrupt: &Interrupt) -> io::Result<()> {
        let names: Vec<&str> = interrupt
            .pending_actions
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        writeln!(
            self.out,
            "\n{}",
            format!(
                "Session {} paused: {} action(s) awaiting review ({})",
                interrupt.session_id,
                names.len(),
                names.join(", ")
            )
            .with(Color::Magenta)
        )?;
        self.out.flush()
    }
}

impl<W: Write + Send> StepObserver for StreamingReporter<W> {
    fn on_append(&mut self, session: &mut Session) {
        self.drain(session);
    }
}

fn block(out: &mut impl Write, title: &str, color: Color, body: &str) -> io::Result<()> {
    writeln!(out, "{}", format!("╭─ {} ", title).with(color).bold())?;
    for line in body.lines() {
        writeln!(out, "{} {}", "│".with(color), line)?;
    }
    writeln!(out, "{}", "╰".to_string().with(color))
}

fn render_message(out: &mut impl Write, message: &Message) -> io::Result<()> {
    match message.role {
        Role::User => block(out, "HUMAN", Color::Green, &message.content),
        Role::Assistant => {
            if !message.content.is_empty() {
                block(out, "AI", Color::Blue, &message.content)?;
            }
            for call in &message.tool_calls {
                block(
                    out,
                    &format!("Tool Call: {}", call.name),
                    Color::Yellow,
                    &pretty_json(&call.args),
                )?;
            }
            Ok(())
        }
        Role::Tool => {
            let title = match &message.name {
                Some(name) => format!("Tool Output ({})", name),
                None => "Tool Output".to_string(),
            };
            block(
                out,
                &title,
                Color::Magenta,
                &truncate_for_display(&message.content, MAX_TOOL_OUTPUT_CHARS),
            )
        }
    }
}

/// 标准输入决定来源
pub struct StdinDecisionSource {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinDecisionSource {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// 打印提示并读取一行；EOF / Ctrl-C 返回 ReviewAborted
    async fn prompt_line(&mut self, prompt: &str) -> Result<String, AgentError> {
        print!("{}", prompt.with(Color::White).bold());
        let _ = io::stdout().flush();
        tokio::select! {
            line = self.lines.next_line() => match line {
                Ok(Some(line)) => Ok(line),
                Ok(None) | Err(_) => Err(AgentError::ReviewAborted),
            },
            _ = tokio::signal::ctrl_c() => Err(AgentError::ReviewAborted),
        }
    }
}

impl Default for StdinDecisionSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionSource for StdinDecisionSource {
    async fn present(&mut self, request: &ReviewRequest) {
        let rule = "=".repeat(RULE_WIDTH);
        let allowed: Vec<&str> = request.allowed_decisions.iter().map(|d| d.as_str()).collect();
        println!("\n{}", rule.as_str().with(Color::Magenta));
        println!(
            "{}",
            format!("⚠️ INTERRUPT: Agent wants to call tool '{}'", request.action_name)
                .with(Color::Magenta)
        );
        println!("{}", pretty_json(&request.args).with(Color::Magenta));
        println!("Allowed decisions: {:?}", allowed);
        println!("{}\n", rule.as_str().with(Color::Magenta));
    }

    async fn read_choice(&mut self) -> Result<String, AgentError> {
        let line = self.prompt_line("Action (approve/reject/edit): ").await?;
        Ok(line.trim().to_lowercase())
    }

    async fn read_edit_args(&mut self) -> Result<String, AgentError> {
        println!("Enter new arguments as JSON string (or press Enter to cancel edit and reject):");
        self.prompt_line("").await
    }

    async fn warn(&mut self, message: &str) {
        println!("{}", message.with(Color::Red).bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ToolCall;
    use serde_json::{json, Map};

    fn rendered_text(reporter: StreamingReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_drain_renders_each_message_once() {
        let mut session = Session::new("s");
        session.append(Message::user("Buatkan fungsi untuk menghitung luas lingkaran"));
        let mut reporter = StreamingReporter::new(Vec::new());
        reporter.drain(&mut session);
        reporter.drain(&mut session);
        assert_eq!(reporter.rendered(), 1);
        assert_eq!(session.cursor(), 1);

        let args = json!({"file_path": "calc.py"}).as_object().cloned().unwrap();
        let call = ToolCall::new("call_1", "write_file", args);
        session.append(Message::assistant("Implementing", vec![call.clone()]));
        session.append(Message::tool(&call, "Created file /calc.py (5 bytes)"));
        reporter.on_append(&mut session);
        assert_eq!(reporter.rendered(), 3);

        let text = rendered_text(reporter);
        assert_eq!(text.matches("HUMAN").count(), 1);
        assert!(text.contains("Tool Call: write_file"));
        assert!(text.contains("\"file_path\": \"calc.py\""));
        assert!(text.contains("Tool Output (write_file)"));
    }

    #[test]
    fn test_truncate_long_output() {
        let long = "x".repeat(10);
        assert_eq!(truncate_for_display(&long, 20), long);
        let cut = truncate_for_display(&long, 4);
        assert!(cut.starts_with("xxxx\n"));
        assert!(cut.contains("10 chars total"));
    }

    #[test]
    fn test_empty_assistant_content_has_no_ai_block() {
        let mut out = Vec::new();
        let call = ToolCall::new("c", "run_tests", Map::new());
        render_message(&mut out, &Message::assistant("", vec![call])).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("AI"));
        assert!(text.contains("Tool Call: run_tests"));
    }
}

//! 沙箱文件系统工具
//!
//! SafeFs 绑定 root_dir，路径按「虚拟根」解释：`/calc.py`、`./calc.py`、`calc.py` 都指向沙箱内同一文件；
//! 含 `..` 的路径直接拒绝，已存在的路径再做 canonicalize 校验（防符号链接逃逸）。
//! LsTool / ReadFileTool 基于 SafeFs 提供只读能力，不需要审阅。

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::core::AgentError;
use crate::tools::Tool;

/// read_file 默认返回的最大行数
const DEFAULT_READ_LIMIT: usize = 500;
/// 单行最大字符数，超出截断
const MAX_LINE_CHARS: usize = 2000;

/// 沙箱文件系统：绑定根目录，防止路径逃逸
#[derive(Debug, Clone)]
pub struct SafeFs {
    root_dir: PathBuf,
}

impl SafeFs {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        let root = root_dir.as_ref().to_path_buf();
        let root_dir = root.canonicalize().unwrap_or(root);
        Self { root_dir }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// 词法解析：去掉前导 `/` 与 `./`，拒绝 `..`
    fn lexical(&self, path: &str) -> Result<PathBuf, AgentError> {
        let trimmed = path.trim().trim_start_matches('/');
        let mut out = self.root_dir.clone();
        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(part) => out.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(AgentError::PathEscape(path.to_string())); // 如 ../../etc/passwd
                }
            }
        }
        Ok(out)
    }

    fn ensure_inside(&self, path: &Path, original: &str) -> Result<(), AgentError> {
        if path.starts_with(&self.root_dir) {
            Ok(())
        } else {
            Err(AgentError::PathEscape(original.to_string()))
        }
    }

    /// 解析已存在的路径
    pub fn resolve(&self, path: &str) -> Result<PathBuf, AgentError> {
        let full = self.lexical(path)?;
        let canonical = full
            .canonicalize()
            .map_err(|_| AgentError::ToolExecutionFailed(format!("Path not found: {}", path)))?;
        self.ensure_inside(&canonical, path)?;
        Ok(canonical)
    }

    /// 解析将要写入的路径（文件可以不存在，已存在的最近祖先必须在沙箱内）
    pub fn resolve_for_write(&self, path: &str) -> Result<PathBuf, AgentError> {
        let full = self.lexical(path)?;
        if full == self.root_dir {
            return Err(AgentError::ToolExecutionFailed(format!(
                "Not a file path: {}",
                path
            )));
        }
        let mut ancestor = full.parent();
        while let Some(dir) = ancestor {
            if dir.exists() {
                let canonical = dir
                    .canonicalize()
                    .map_err(|e| AgentError::ToolExecutionFailed(e.to_string()))?;
                self.ensure_inside(&canonical, path)?;
                break;
            }
            ancestor = dir.parent();
        }
        Ok(full)
    }

    /// 相对沙箱根的展示路径（以 `/` 开头，与模型看到的虚拟路径一致）
    pub fn display(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root_dir) {
            Ok(rel) => format!("/{}", rel.to_string_lossy()),
            Err(_) => path.display().to_string(),
        }
    }

    pub fn read_file(&self, path: &str) -> Result<String, AgentError> {
        let resolved = self.resolve(path)?;
        std::fs::read_to_string(&resolved)
            .map_err(|e| AgentError::ToolExecutionFailed(format!("Read failed: {}", e)))
    }

    pub fn write_file(&self, path: &str, content: &str) -> Result<PathBuf, AgentError> {
        let resolved = self.resolve_for_write(path)?;
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AgentError::ToolExecutionFailed(format!("Failed to create parent directory: {}", e))
            })?;
        }
        std::fs::write(&resolved, content)
            .map_err(|e| AgentError::ToolExecutionFailed(format!("Failed to write file: {}", e)))?;
        Ok(resolved)
    }

    pub fn list_dir(&self, path: &str) -> Result<Vec<String>, AgentError> {
        let base = self.resolve(path)?;
        let mut entries = Vec::new();
        for e in std::fs::read_dir(&base)
            .map_err(|e| AgentError::ToolExecutionFailed(format!("List failed: {}", e)))?
        {
            let e = e.map_err(|e| AgentError::ToolExecutionFailed(e.to_string()))?;
            let name = e.file_name().to_string_lossy().to_string();
            if !name.starts_with('.') {
                let ty = if e.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    "/"
                } else {
                    ""
                };
                entries.push(format!("{}{}", name, ty));
            }
        }
        entries.sort();
        Ok(entries)
    }
}

/// 从 args 中取字符串参数（兼容多个别名，如 file_path / filename / path）
pub(crate) fn str_arg<'a>(args: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| args.get(*k).and_then(|v| v.as_str()))
}

/// Ls 工具：列出目录
pub struct LsTool {
    fs: SafeFs,
}

impl LsTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for LsTool {
    fn name(&self) -> &str {
        "ls"
    }

    fn description(&self) -> &str {
        "List a directory in the project sandbox. Args: {\"path\": \"directory, default '/'\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = str_arg(&args, &["path"]).unwrap_or("/");
        tracing::info!(path = %path, "ls tool execute");
        let entries = self.fs.list_dir(path).map_err(|e| e.to_string())?;
        if entries.is_empty() {
            return Ok(format!("{} is empty", path));
        }
        Ok(entries.join("\n"))
    }
}

/// ReadFile 工具：按行窗口读取文件，带行号
pub struct ReadFileTool {
    fs: SafeFs,
}

impl ReadFileTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file from the project sandbox with line numbers. \
         Args: {\"file_path\": \"...\", \"offset\": 0, \"limit\": 500}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string"},
                "offset": {"type": "integer", "minimum": 0},
                "limit": {"type": "integer", "minimum": 1}
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = str_arg(&args, &["file_path", "path", "filename"])
            .ok_or("Missing required parameter: file_path")?;
        let offset = args.get("offset").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let limit = args
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|l| l as usize)
            .unwrap_or(DEFAULT_READ_LIMIT);
        tracing::info!(path = %path, offset, limit, "read_file tool execute");

        let content = self.fs.read_file(path).map_err(|e| e.to_string())?;
        if content.is_empty() {
            return Ok(format!("File {} exists but is empty", path));
        }
        let total = content.lines().count();
        if offset >= total {
            return Err(format!(
                "Line offset {} exceeds file length ({} lines)",
                offset, total
            ));
        }
        let mut out = String::new();
        for (i, line) in content.lines().enumerate().skip(offset).take(limit) {
            let line: String = line.chars().take(MAX_LINE_CHARS).collect();
            out.push_str(&format!("{:6}\t{}\n", i + 1, line));
        }
        Ok(out)
    }
}

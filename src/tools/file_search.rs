//! 沙箱内检索工具：glob（按文件名模式）与 grep（按内容，字面量或正则）
//!
//! 只读，不需要审阅。遍历时跳过隐藏目录与常见的缓存/依赖目录。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::filesystem::str_arg;
use crate::tools::{SafeFs, Tool};

const SKIP_DIRS: &[&str] = &["target", "node_modules", "__pycache__", "venv", ".venv"];

fn walk_files(root: &Path) -> impl Iterator<Item = PathBuf> {
    walkdir::WalkDir::new(root)
        .max_depth(10)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            e.depth() == 0 || (!name.starts_with('.') && !SKIP_DIRS.contains(&name.as_ref()))
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
}

/// Glob 工具：按模式匹配沙箱内文件（模式相对沙箱根，如 `**/*.py`、`test_*.py`）
pub struct GlobTool {
    fs: SafeFs,
    max_results: usize,
}

impl GlobTool {
    pub fn new(fs: SafeFs) -> Self {
        Self {
            fs,
            max_results: 200,
        }
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files in the project sandbox by glob pattern. \
         Args: {\"pattern\": \"**/*.py\", \"path\": \"/\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string"},
                "path": {"type": "string"}
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let pattern = str_arg(&args, &["pattern"]).ok_or("Missing required parameter: pattern")?;
        let base = str_arg(&args, &["path"]).unwrap_or("/");
        let base = self.fs.resolve(base).map_err(|e| e.to_string())?;
        let matcher =
            glob::Pattern::new(pattern).map_err(|e| format!("Invalid glob pattern: {}", e))?;
        // 不含路径分隔符的模式按文件名匹配
        let by_name = !pattern.contains('/');

        let mut found = Vec::new();
        for path in walk_files(&base) {
            let rel = path.strip_prefix(&base).unwrap_or(&path);
            let hit = if by_name {
                path.file_name()
                    .map(|n| matcher.matches(&n.to_string_lossy()))
                    .unwrap_or(false)
            } else {
                matcher.matches_path(rel)
            };
            if hit {
                found.push(self.fs.display(&path));
                if found.len() >= self.max_results {
                    break;
                }
            }
        }
        found.sort();
        if found.is_empty() {
            Ok(format!("No files found matching pattern '{}'", pattern))
        } else {
            Ok(found.join("\n"))
        }
    }
}

/// Grep 工具：在沙箱文件中搜索文本
pub struct GrepTool {
    fs: SafeFs,
    max_results: usize,
    max_file_size: u64,
}

impl GrepTool {
    pub fn new(fs: SafeFs) -> Self {
        Self {
            fs,
            max_results: 100,
            max_file_size: 1024 * 1024, // 1MB
        }
    }
}

enum Matcher {
    Literal(String),
    Regex(regex::Regex),
}

impl Matcher {
    fn is_match(&self, line: &str) -> bool {
        match self {
            Matcher::Literal(s) => line.contains(s.as_str()),
            Matcher::Regex(re) => re.is_match(line),
        }
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search file contents in the project sandbox. \
         Args: {\"pattern\": \"def area\", \"path\": \"/\", \"include\": \"*.py\", \"use_regex\": false}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string"},
                "path": {"type": "string"},
                "include": {"type": "string"},
                "use_regex": {"type": "boolean"}
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let pattern = str_arg(&args, &["pattern"]).ok_or("Missing required parameter: pattern")?;
        let base = self
            .fs
            .resolve(str_arg(&args, &["path"]).unwrap_or("/"))
            .map_err(|e| e.to_string())?;
        let include = match str_arg(&args, &["include", "glob"]) {
            Some(p) => Some(glob::Pattern::new(p).map_err(|e| format!("Invalid include pattern: {}", e))?),
            None => None,
        };
        let use_regex = args
            .get("use_regex")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let matcher = if use_regex {
            Matcher::Regex(
                regex::Regex::new(pattern).map_err(|e| format!("Invalid regex pattern: {}", e))?,
            )
        } else {
            Matcher::Literal(pattern.to_string())
        };

        let files: Vec<PathBuf> = if base.is_file() {
            vec![base.clone()]
        } else {
            walk_files(&base).collect()
        };

        let mut hits = Vec::new();
        'files: for path in files {
            if let Some(ref inc) = include {
                let name = path.file_name().map(|n| n.to_string_lossy().to_string());
                if !name.map(|n| inc.matches(&n)).unwrap_or(false) {
                    continue;
                }
            }
            if std::fs::metadata(&path)
                .map(|m| m.len() > self.max_file_size)
                .unwrap_or(true)
            {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue; // 跳过二进制或无法读取的文件
            };
            for (i, line) in content.lines().enumerate() {
                if matcher.is_match(line) {
                    hits.push(format!("{}:{}: {}", self.fs.display(&path), i + 1, line.trim_end()));
                    if hits.len() >= self.max_results {
                        break 'files;
                    }
                }
            }
        }

        if hits.is_empty() {
            Ok(format!("No matches found for pattern '{}'", pattern))
        } else {
            Ok(hits.join("\n"))
        }
    }
}

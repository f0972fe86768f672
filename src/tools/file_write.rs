//! 文件写入工具：在沙箱内创建或覆盖文件（需要人工审阅）

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::filesystem::str_arg;
use crate::tools::{SafeFs, Tool};

/// write_file：创建或覆盖文件，自动创建父目录
pub struct WriteFileTool {
    fs: SafeFs,
    max_file_size: usize,
}

impl WriteFileTool {
    pub fn new(fs: SafeFs) -> Self {
        Self {
            fs,
            max_file_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        r#"Write a file in the project sandbox (creates parent directories, overwrites existing files).

Args:
- file_path: path inside the sandbox (alias: filename)
- content: full file content

Example:
{"file_path": "calculator.py", "content": "def add(a, b):\n    return a + b\n"}"#
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let file_path = str_arg(&args, &["file_path", "filename", "path"])
            .ok_or("Missing required parameter: file_path")?;
        let content = str_arg(&args, &["content"]).ok_or("Missing required parameter: content")?;

        if content.len() > self.max_file_size {
            return Err(format!(
                "Content too large: {} bytes (max: {})",
                content.len(),
                self.max_file_size
            ));
        }

        let existed = self
            .fs
            .resolve_for_write(file_path)
            .map(|p| p.exists())
            .map_err(|e| e.to_string())?;
        let written = self
            .fs
            .write_file(file_path, content)
            .map_err(|e| e.to_string())?;

        Ok(format!(
            "{} file {} ({} bytes)",
            if existed { "Updated" } else { "Created" },
            self.fs.display(&written),
            content.len()
        ))
    }
}

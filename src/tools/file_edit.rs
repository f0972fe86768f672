//! 代码编辑工具：精确字符串替换（需要人工审阅）
//!
//! old_string 必须在文件中出现；出现多次时要求 replace_all=true，否则拒绝以免改错位置。

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::filesystem::str_arg;
use crate::tools::{SafeFs, Tool};

/// edit_file：old_string -> new_string
pub struct EditFileTool {
    fs: SafeFs,
}

impl EditFileTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

/// 执行替换，返回新内容与替换次数
fn apply_edit(
    content: &str,
    old_string: &str,
    new_string: &str,
    replace_all: bool,
) -> Result<(String, usize), String> {
    if old_string.is_empty() {
        return Err("old_string must not be empty".to_string());
    }
    let count = content.matches(old_string).count();
    match count {
        0 => Err(format!("String not found in file: '{}'", old_string)),
        1 => Ok((content.replacen(old_string, new_string, 1), 1)),
        n if replace_all => Ok((content.replace(old_string, new_string), n)),
        n => Err(format!(
            "String '{}' appears {} times in file. Use replace_all=true or give more context.",
            old_string, n
        )),
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        r#"Edit a file in the project sandbox by exact string replacement.

Args:
- file_path: path inside the sandbox
- old_string: exact text to replace (must be unique unless replace_all=true)
- new_string: replacement text
- replace_all: replace every occurrence (optional, default false)"#
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string"},
                "old_string": {"type": "string"},
                "new_string": {"type": "string"},
                "replace_all": {"type": "boolean"}
            },
            "required": ["file_path", "old_string", "new_string"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let file_path = str_arg(&args, &["file_path", "filename", "path"])
            .ok_or("Missing required parameter: file_path")?;
        let old_string =
            str_arg(&args, &["old_string"]).ok_or("Missing required parameter: old_string")?;
        let new_string =
            str_arg(&args, &["new_string"]).ok_or("Missing required parameter: new_string")?;
        let replace_all = args
            .get("replace_all")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let content = self.fs.read_file(file_path).map_err(|e| e.to_string())?;
        let (updated, count) = apply_edit(&content, old_string, new_string, replace_all)?;
        let written = self
            .fs
            .write_file(file_path, &updated)
            .map_err(|e| e.to_string())?;

        Ok(format!(
            "Successfully replaced {} occurrence(s) in {}",
            count,
            self.fs.display(&written)
        ))
    }
}

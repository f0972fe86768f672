//! create_test_file：新建 pytest 测试文件（需要人工审阅）
//!
//! 文件名必须以 `test_` 开头、以 `.py` 结尾；已存在的文件不覆盖（修改请用 edit_file）。

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::filesystem::str_arg;
use crate::tools::{SafeFs, Tool};

pub struct CreateTestFileTool {
    fs: SafeFs,
}

impl CreateTestFileTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for CreateTestFileTool {
    fn name(&self) -> &str {
        "create_test_file"
    }

    fn description(&self) -> &str {
        r#"Create a new Python test file in the sandbox.

Args:
- filename: MUST start with 'test_' and end with '.py'
- content: pytest code

Returns a status message with the full path."#
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filename": {"type": "string", "pattern": "^test_.*\\.py$"},
                "content": {"type": "string"}
            },
            "required": ["filename", "content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let filename = str_arg(&args, &["filename", "file_path"])
            .ok_or("Missing required parameter: filename")?;
        let content = str_arg(&args, &["content"]).ok_or("Missing required parameter: content")?;

        let base_name = filename.rsplit('/').next().unwrap_or(filename);
        if !base_name.starts_with("test_") || !base_name.ends_with(".py") {
            return Err(format!(
                "Error: Filename '{}' must start with 'test_' and end with '.py'.",
                filename
            ));
        }

        let target = self
            .fs
            .resolve_for_write(filename)
            .map_err(|e| e.to_string())?;
        if target.exists() {
            return Err(format!(
                "Error: File '{}' already exists. Please use edit_file to modify it.",
                self.fs.display(&target)
            ));
        }

        let written = self
            .fs
            .write_file(filename, content)
            .map_err(|e| format!("Error creating test file: {}", e))?;
        Ok(format!(
            "Successfully created test file at: {}",
            written.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_test_file_rules() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CreateTestFileTool::new(SafeFs::new(dir.path()));

        let err = tool
            .execute(json!({"filename": "calc_test.py", "content": ""}))
            .await
            .unwrap_err();
        assert!(err.contains("must start with 'test_'"));

        let out = tool
            .execute(json!({"filename": "test_calc.py", "content": "def test_x():\n    assert True\n"}))
            .await
            .unwrap();
        assert!(out.starts_with("Successfully created test file at:"));
        assert!(dir.path().join("test_calc.py").exists());

        let err = tool
            .execute(json!({"filename": "test_calc.py", "content": "again"}))
            .await
            .unwrap_err();
        assert!(err.contains("already exists"));
    }
}

//! File write tool — write content to a file with path validation.

use async_trait::async_trait;
use tessel_core::error::ToolError;
use tessel_core::schema::{ParamType, ToolParameter, ToolSchema};
use tessel_core::tool::{Tool, ToolArgs};

pub struct WriteFileTool {
    schema: ToolSchema,
    allowed_roots: Vec<String>,
    forbidden_paths: Vec<String>,
}

impl WriteFileTool {
    pub fn new(allowed_roots: Vec<String>, forbidden_paths: Vec<String>) -> Self {
        let schema = ToolSchema::new(
            "write_file",
            "Write content to a file, creating it if it does not exist and \
             replacing its contents if it does.",
            vec![
                ToolParameter::required("path", ParamType::String, "The file path to write"),
                ToolParameter::required("content", ParamType::String, "The content to write"),
            ],
        )
        .expect("static schema");

        Self {
            schema,
            allowed_roots,
            forbidden_paths,
        }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let path = args.expect_str("path")?;
        let content = args.expect_str("content")?;

        let resolved =
            crate::paths::validate_path(path, &self.allowed_roots, &self.forbidden_paths)
                .map_err(|e| ToolError::PermissionDenied {
                    tool_name: "write_file".into(),
                    reason: e.to_string(),
                })?;

        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "write_file".into(),
                reason: format!("Failed to write file: {e}"),
            })?;

        Ok(format!(
            "Wrote {} bytes to {}",
            content.len(),
            resolved.display()
        ))
    }
}

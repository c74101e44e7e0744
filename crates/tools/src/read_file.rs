//! File read tool — read file contents with path validation.

use async_trait::async_trait;
use tessel_core::error::ToolError;
use tessel_core::schema::{ParamType, ToolParameter, ToolSchema};
use tessel_core::tool::{Tool, ToolArgs};

pub struct ReadFileTool {
    schema: ToolSchema,
    /// Allowed root directories. Empty = allow all.
    allowed_roots: Vec<String>,
    /// Forbidden path prefixes.
    forbidden_paths: Vec<String>,
}

impl ReadFileTool {
    /// Create a file read tool with path restrictions. Empty lists mean
    /// no restriction.
    pub fn new(allowed_roots: Vec<String>, forbidden_paths: Vec<String>) -> Self {
        let schema = ToolSchema::new(
            "read_file",
            "Read the contents of a file at the given path.",
            vec![ToolParameter::required(
                "path",
                ParamType::String,
                "The file path to read",
            )],
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
impl Tool for ReadFileTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let path = args.expect_str("path")?;

        let resolved =
            crate::paths::validate_path(path, &self.allowed_roots, &self.forbidden_paths)
                .map_err(|e| ToolError::PermissionDenied {
                    tool_name: "read_file".into(),
                    reason: e.to_string(),
                })?;

        tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "read_file".into(),
                reason: format!("Failed to read file: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use std::io::Write;

    fn args(value: serde_json::Value) -> ToolArgs {
        ToolArgs::new(value.as_object().cloned().unwrap_or_else(Map::new))
    }

    #[test]
    fn tool_definition() {
        let tool = ReadFileTool::new(vec![], vec![]);
        let def = tool.to_definition();
        assert_eq!(def.name, "read_file");
        assert_eq!(def.parameters["required"], json!(["path"]));
    }

    #[tokio::test]
    async fn read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("test.txt");
        let mut f = std::fs::File::create(&file_path).unwrap();
        writeln!(f, "Hello, world!").unwrap();

        let tool = ReadFileTool::new(vec![], vec![]);
        let output = tool
            .execute(args(json!({ "path": file_path.to_str().unwrap() })))
            .await
            .unwrap();

        assert!(output.contains("Hello, world!"));
    }

    #[tokio::test]
    async fn read_nonexistent_file() {
        let tool = ReadFileTool::new(vec![], vec![]);
        let result = tool
            .execute(args(json!({
                "path": "/tmp/tessel_test_nonexistent_file_12345.txt"
            })))
            .await;
        assert!(matches!(result, Err(ToolError::ExecutionFailed { .. })));
    }

    #[tokio::test]
    async fn path_traversal_blocked() {
        let tool = ReadFileTool::new(vec!["/home/user/workspace".into()], vec![]);
        let result = tool
            .execute(args(json!({ "path": "../../../etc/passwd" })))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn forbidden_path_blocked() {
        let tool = ReadFileTool::new(vec![], vec!["/etc".into()]);
        let result = tool.execute(args(json!({ "path": "/etc/shadow" }))).await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }
}

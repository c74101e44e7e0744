//! Directory listing tool.

use async_trait::async_trait;
use tessel_core::error::ToolError;
use tessel_core::schema::{ParamType, ToolParameter, ToolSchema};
use tessel_core::tool::{Tool, ToolArgs};

pub struct ListDirectoryTool {
    schema: ToolSchema,
    allowed_roots: Vec<String>,
    forbidden_paths: Vec<String>,
}

impl ListDirectoryTool {
    pub fn new(allowed_roots: Vec<String>, forbidden_paths: Vec<String>) -> Self {
        let schema = ToolSchema::new(
            "list_directory",
            "List the entries of a directory. Directories are suffixed with '/'.",
            vec![ToolParameter::required(
                "path",
                ParamType::String,
                "The directory path to list",
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
impl Tool for ListDirectoryTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let path = args.expect_str("path")?;

        let resolved =
            crate::paths::validate_path(path, &self.allowed_roots, &self.forbidden_paths)
                .map_err(|e| ToolError::PermissionDenied {
                    tool_name: "list_directory".into(),
                    reason: e.to_string(),
                })?;

        let mut read_dir =
            tokio::fs::read_dir(&resolved)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "list_directory".into(),
                    reason: format!("Failed to list directory: {e}"),
                })?;

        let mut entries = Vec::new();
        while let Some(entry) =
            read_dir
                .next_entry()
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "list_directory".into(),
                    reason: e.to_string(),
                })?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            entries.push(if is_dir { format!("{name}/") } else { name });
        }

        entries.sort_unstable();

        if entries.is_empty() {
            Ok("(empty directory)".into())
        } else {
            Ok(entries.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn args(value: serde_json::Value) -> ToolArgs {
        ToolArgs::new(value.as_object().cloned().unwrap_or_else(Map::new))
    }

    #[tokio::test]
    async fn lists_files_and_marks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "x").unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let tool = ListDirectoryTool::new(vec![], vec![]);
        let output = tool
            .execute(args(json!({ "path": dir.path().to_str().unwrap() })))
            .await
            .unwrap();

        // Sorted, directories suffixed
        assert_eq!(output, "a.txt\nb.txt\nsub/");
    }

    #[tokio::test]
    async fn empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ListDirectoryTool::new(vec![], vec![]);
        let output = tool
            .execute(args(json!({ "path": dir.path().to_str().unwrap() })))
            .await
            .unwrap();
        assert_eq!(output, "(empty directory)");
    }

    #[tokio::test]
    async fn nonexistent_directory_fails() {
        let tool = ListDirectoryTool::new(vec![], vec![]);
        let result = tool
            .execute(args(json!({ "path": "/tmp/tessel_no_such_dir_98765" })))
            .await;
        assert!(matches!(result, Err(ToolError::ExecutionFailed { .. })));
    }

    #[tokio::test]
    async fn outside_allowed_roots_blocked() {
        let tool = ListDirectoryTool::new(vec!["/home/user/workspace".into()], vec![]);
        let result = tool.execute(args(json!({ "path": "/var/log" }))).await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }
}

//! Shell tool — execute system commands.
//!
//! Supports command allowlisting: if the allowlist is non-empty, only
//! commands whose first word matches an entry may run.

use async_trait::async_trait;
use tessel_core::error::ToolError;
use tessel_core::schema::{ParamType, ToolParameter, ToolSchema};
use tessel_core::tool::{Tool, ToolArgs};
use tokio::process::Command;
use tracing::{debug, warn};

/// Execute shell commands with safety constraints.
pub struct ShellTool {
    schema: ToolSchema,
    /// If non-empty, only these commands are allowed.
    allowed_commands: Vec<String>,
}

impl ShellTool {
    pub fn new(allowed_commands: Vec<String>) -> Self {
        let schema = ToolSchema::new(
            "shell",
            "Execute a shell command and return stdout/stderr. Use this for \
             running programs, checking files, git operations, etc.",
            vec![ToolParameter::required(
                "command",
                ParamType::String,
                "The shell command to execute",
            )],
        )
        .expect("static schema");

        Self {
            schema,
            allowed_commands,
        }
    }

    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true; // No allowlist = all commands allowed
        }

        // Extract the base command (first word)
        let base_cmd = command.split_whitespace().next().unwrap_or("").trim();

        self.allowed_commands.iter().any(|a| a == base_cmd)
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let command = args.expect_str("command")?;

        if !self.is_command_allowed(command) {
            return Err(ToolError::PermissionDenied {
                tool_name: "shell".into(),
                reason: format!(
                    "Command '{}' not in allowlist",
                    command.split_whitespace().next().unwrap_or("")
                ),
            });
        }

        debug!(command = %command, "Executing shell command");

        let output = Command::new("sh")
            .args(["-c", command])
            .output()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "shell".into(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            let text = if stderr.is_empty() {
                stdout
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            };
            Ok(text.trim().to_string())
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Command failed");
            Err(ToolError::ExecutionFailed {
                tool_name: "shell".into(),
                reason: format!("[exit code: {code}]\n{stdout}\n{stderr}")
                    .trim()
                    .to_string(),
            })
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

    #[test]
    fn allowlist_check() {
        let tool = ShellTool::new(vec!["ls".into(), "cat".into(), "git".into()]);
        assert!(tool.is_command_allowed("ls -la"));
        assert!(tool.is_command_allowed("cat file.txt"));
        assert!(tool.is_command_allowed("git status"));
        assert!(!tool.is_command_allowed("rm -rf /"));
        assert!(!tool.is_command_allowed("sudo something"));
    }

    #[test]
    fn empty_allowlist_allows_all() {
        let tool = ShellTool::new(vec![]);
        assert!(tool.is_command_allowed("anything goes"));
    }

    #[tokio::test]
    async fn execute_echo() {
        let tool = ShellTool::new(vec![]);
        let output = tool
            .execute(args(json!({"command": "echo hello"})))
            .await
            .unwrap();
        assert!(output.contains("hello"));
    }

    #[tokio::test]
    async fn blocked_command() {
        let tool = ShellTool::new(vec!["ls".into()]);
        let result = tool.execute(args(json!({"command": "rm -rf /tmp/x"}))).await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn failing_command_reports_exit_code() {
        let tool = ShellTool::new(vec![]);
        let result = tool.execute(args(json!({"command": "exit 3"}))).await;
        match result {
            Err(ToolError::ExecutionFailed { reason, .. }) => {
                assert!(reason.contains("exit code: 3"));
            }
            other => panic!("Expected ExecutionFailed, got: {other:?}"),
        }
    }
}

//! Code execution tool — run Python submissions in the sandbox.
//!
//! Submissions are statically validated before any process is spawned;
//! accepted code runs in an isolated interpreter under kernel resource
//! limits and a wall-clock timeout.

use async_trait::async_trait;
use std::time::Duration;
use tessel_core::error::ToolError;
use tessel_core::schema::{ParamType, ToolParameter, ToolSchema};
use tessel_core::tool::{Tool, ToolArgs};
use tessel_sandbox::{SandboxError, SandboxExecutor, SandboxPolicy};
use tokio_util::sync::CancellationToken;

pub struct ExecuteCodeTool {
    schema: ToolSchema,
    executor: SandboxExecutor,
}

impl ExecuteCodeTool {
    pub fn new(policy: SandboxPolicy) -> Self {
        let schema = ToolSchema::new(
            "execute_code",
            "Execute a Python code snippet in an isolated sandbox and return \
             its output. State does not persist between calls. Imports of \
             os, sys, subprocess and similar modules are not permitted.",
            vec![
                ToolParameter::required("code", ParamType::String, "The Python code to run"),
                ToolParameter::optional(
                    "timeout_secs",
                    ParamType::Integer,
                    "Wall-clock timeout in seconds (capped by the configured limit)",
                ),
            ],
        )
        .expect("static schema");

        Self {
            schema,
            executor: SandboxExecutor::new(policy),
        }
    }
}

#[async_trait]
impl Tool for ExecuteCodeTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let code = args.expect_str("code")?;

        // A caller-supplied timeout may only tighten the configured one.
        let configured = self.executor.policy().wall_clock;
        let executor;
        let executor_ref = match args.int("timeout_secs") {
            Some(secs) if secs >= 1 && Duration::from_secs(secs as u64) < configured => {
                executor = SandboxExecutor::new(
                    self.executor
                        .policy()
                        .clone()
                        .with_wall_clock(Duration::from_secs(secs as u64)),
                );
                &executor
            }
            _ => &self.executor,
        };

        let output = executor_ref
            .run(code, &CancellationToken::new())
            .await
            .map_err(|e| match e {
                SandboxError::Rejected(violations) => {
                    ToolError::SandboxViolation(violations.join("; "))
                }
                SandboxError::ResourceExceeded(msg) => ToolError::SandboxResourceExceeded(msg),
                SandboxError::Cancelled => ToolError::Cancelled("execute_code".into()),
                SandboxError::Spawn(msg) => ToolError::ExecutionFailed {
                    tool_name: "execute_code".into(),
                    reason: msg,
                },
            })?;

        let mut text = output.stdout.clone();
        if !output.stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str("[stderr]: ");
            text.push_str(&output.stderr);
        }
        if !output.success() {
            text = format!(
                "[exit code: {}]\n{}",
                output.exit_code.unwrap_or(-1),
                text
            );
        }

        Ok(text.trim().to_string())
    }
}

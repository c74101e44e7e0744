//! Built-in tool implementations for Tessel.
//!
//! Tools give the agent the ability to interact with the world:
//! run shell commands, read/write files, list directories, make HTTP
//! requests, and execute Python code in the sandbox.

pub mod code_exec;
pub mod http_request;
pub mod list_directory;
pub mod paths;
pub mod read_file;
pub mod shell;
pub mod write_file;

use std::time::Duration;
use tessel_config::{SandboxConfig, ToolsConfig};
use tessel_core::error::ToolError;
use tessel_core::tool::ToolRegistry;
use tessel_sandbox::SandboxPolicy;

pub use code_exec::ExecuteCodeTool;
pub use http_request::HttpRequestTool;
pub use list_directory::ListDirectoryTool;
pub use read_file::ReadFileTool;
pub use shell::ShellTool;
pub use write_file::WriteFileTool;

/// Translate the configured sandbox limits into an executor policy.
pub fn sandbox_policy(config: &SandboxConfig) -> SandboxPolicy {
    SandboxPolicy {
        cpu_time_secs: config.cpu_time_secs,
        address_space_bytes: config.memory_mb * 1024 * 1024,
        max_processes: config.max_processes,
        max_open_files: config.max_open_files,
        wall_clock: Duration::from_secs(config.wall_clock_secs),
    }
}

/// Build the registry of built-in tools from application config.
///
/// File tools share the configured root/forbidden-path restrictions, the
/// shell tool gets the command allowlist, and the code execution tool gets
/// the sandbox resource policy.
pub fn builtin_registry(
    tools: &ToolsConfig,
    sandbox: &SandboxConfig,
) -> Result<ToolRegistry, ToolError> {
    ToolRegistry::builder()
        .with(Box::new(ReadFileTool::new(
            tools.allowed_roots.clone(),
            tools.forbidden_paths.clone(),
        )))
        .with(Box::new(WriteFileTool::new(
            tools.allowed_roots.clone(),
            tools.forbidden_paths.clone(),
        )))
        .with(Box::new(ListDirectoryTool::new(
            tools.allowed_roots.clone(),
            tools.forbidden_paths.clone(),
        )))
        .with(Box::new(ShellTool::new(tools.shell_allowlist.clone())))
        .with(Box::new(HttpRequestTool::new(
            tools.allowed_endpoints.clone(),
        )))
        .with(Box::new(ExecuteCodeTool::new(sandbox_policy(sandbox))))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_all_tools() {
        let registry =
            builtin_registry(&ToolsConfig::default(), &SandboxConfig::default()).unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "execute_code",
                "http_request",
                "list_directory",
                "read_file",
                "shell",
                "write_file"
            ]
        );
    }

    #[test]
    fn sandbox_policy_converts_units() {
        let config = SandboxConfig::default();
        let policy = sandbox_policy(&config);
        assert_eq!(policy.cpu_time_secs, config.cpu_time_secs);
        assert_eq!(policy.address_space_bytes, config.memory_mb * 1024 * 1024);
        assert_eq!(policy.wall_clock.as_secs(), config.wall_clock_secs);
    }
}

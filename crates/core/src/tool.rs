//! Tool trait, registry, and dispatcher — the abstraction over agent
//! capabilities.
//!
//! Tools are what give the agent the ability to act in the world: run shell
//! commands, read/write files, execute sandboxed code. Each tool declares a
//! [`ToolSchema`]; the registry validates every call against that schema
//! *before* the handler runs, and converts every failure into a uniform
//! [`ToolResult`]. The dispatcher is the boundary past which tool bugs
//! cannot crash the loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::schema::ToolSchema;

/// A request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call ID correlating this call with its result in a single turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Name of the tool to execute
    pub name: String,

    /// Raw argument mapping, as produced by the parser or the provider
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
        }
    }

    /// Canonical rendering of the arguments for loop detection.
    ///
    /// serde_json's default map is ordered by key, so two calls with the
    /// same arguments serialize identically regardless of insertion order.
    pub fn normalized_arguments(&self) -> String {
        Value::Object(self.arguments.clone()).to_string()
    }
}

/// Why a tool call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No tool registered under the requested name.
    UnknownTool,
    /// Arguments rejected by schema validation; the handler never ran.
    InvalidArguments,
    /// Code submission rejected before execution; no process was spawned.
    SandboxViolation,
    /// Sandboxed process killed by a resource limit or wall-clock timeout.
    SandboxResourceExceeded,
    /// The handler itself refused (allowlist, path policy).
    PermissionDenied,
    /// The handler ran out of time.
    Timeout,
    /// The task was cancelled while the tool was running.
    Cancelled,
    /// The handler returned an error.
    ExecutionFailed,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::UnknownTool => "unknown_tool",
            Self::InvalidArguments => "invalid_arguments",
            Self::SandboxViolation => "sandbox_violation",
            Self::SandboxResourceExceeded => "sandbox_resource_exceeded",
            Self::PermissionDenied => "permission_denied",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::ExecutionFailed => "execution_failed",
        };
        f.write_str(s)
    }
}

/// Structured failure attached to an unsuccessful [`ToolResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ToolFailure {
    fn from_error(err: &ToolError) -> Self {
        let kind = match err {
            ToolError::NotFound(_) => FailureKind::UnknownTool,
            ToolError::InvalidArguments(_) => FailureKind::InvalidArguments,
            ToolError::SandboxViolation(_) => FailureKind::SandboxViolation,
            ToolError::SandboxResourceExceeded(_) => FailureKind::SandboxResourceExceeded,
            ToolError::PermissionDenied { .. } => FailureKind::PermissionDenied,
            ToolError::Timeout { .. } => FailureKind::Timeout,
            ToolError::Cancelled(_) => FailureKind::Cancelled,
            ToolError::ExecutionFailed { .. } | ToolError::DuplicateTool(_) => {
                FailureKind::ExecutionFailed
            }
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// The result of a tool execution, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content (or a rendered error on failure)
    pub output: String,

    /// Structured failure detail when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolFailure>,
}

impl ToolResult {
    pub fn ok(call_id: Option<String>, output: impl Into<String>) -> Self {
        Self {
            call_id,
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn fail(call_id: Option<String>, failure: ToolFailure) -> Self {
        Self {
            call_id,
            success: false,
            output: format!("Error ({}): {}", failure.kind, failure.message),
            error: Some(failure),
        }
    }

    /// The text appended to the conversation as an observation.
    pub fn observation(&self) -> &str {
        &self.output
    }
}

/// A pre-validated argument bundle handed to tool handlers.
///
/// By the time a handler sees `ToolArgs`, every required parameter is
/// present and every value matches its declared type, so the typed
/// accessors can be trusted for declared parameters.
#[derive(Debug, Clone)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    pub fn new(args: Map<String, Value>) -> Self {
        Self(args)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Value::as_f64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }

    /// A required string parameter. Only call for parameters the schema
    /// declares as required strings.
    pub fn expect_str(&self, name: &str) -> Result<&str, ToolError> {
        self.str(name)
            .ok_or_else(|| ToolError::InvalidArguments(format!("missing parameter '{name}'")))
    }
}

/// The core Tool trait.
///
/// Each tool implements this trait and is registered in the
/// [`ToolRegistry`]. Handlers receive pre-validated arguments and return
/// output text; errors are tool-local and converted by the dispatcher.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The schema describing this tool's name, purpose, and parameters.
    fn schema(&self) -> &ToolSchema;

    /// Execute the tool with validated arguments, returning output text.
    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for the provider catalog.
    fn to_definition(&self) -> ToolDefinition {
        let schema = self.schema();
        ToolDefinition {
            name: schema.name.clone(),
            description: schema.description.clone(),
            parameters: schema.to_json_schema(),
        }
    }
}

/// Builds a [`ToolRegistry`] from an explicit list of tools at startup.
///
/// Duplicate names fail here, at build time — never at call time.
#[derive(Default)]
pub struct RegistryBuilder {
    tools: Vec<Box<dyn Tool>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tool: Box<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn build(self) -> Result<ToolRegistry, ToolError> {
        let mut map: HashMap<String, Box<dyn Tool>> = HashMap::new();
        for tool in self.tools {
            let name = tool.schema().name.clone();
            if map.contains_key(&name) {
                return Err(ToolError::DuplicateTool(name));
            }
            debug!(tool = %name, "Registered tool");
            map.insert(name, tool);
        }
        Ok(ToolRegistry { tools: map })
    }
}

/// A registry of available tools.
///
/// Populated once at startup and read-only thereafter, so concurrent reads
/// need no synchronization. The agent loop uses it to:
/// 1. Get tool definitions to send to the LLM
/// 2. Validate and dispatch tool calls the LLM requests
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get the schema for a tool; unknown names signal NotFound.
    pub fn get_schema(&self, name: &str) -> Result<&ToolSchema, ToolError> {
        self.tools
            .get(name)
            .map(|t| t.schema())
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// All registered schemas.
    pub fn schemas(&self) -> Vec<&ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// All tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Validate and execute a tool call, converting every failure into a
    /// uniform [`ToolResult`].
    ///
    /// Order of checks: the tool must exist (UnknownTool), the arguments
    /// must satisfy the schema (InvalidArguments — the handler is never
    /// invoked on bad arguments), and only then does the handler run. A
    /// handler error becomes a failed result, never a propagated error.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let tool = match self.tools.get(&call.name) {
            Some(t) => t,
            None => {
                warn!(tool = %call.name, "Unknown tool requested");
                return ToolResult::fail(
                    call.id.clone(),
                    ToolFailure::from_error(&ToolError::NotFound(call.name.clone())),
                );
            }
        };

        if let Err(violations) = tool.schema().validate_args(&call.arguments) {
            let detail = violations
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            debug!(tool = %call.name, %detail, "Argument validation failed");
            return ToolResult::fail(
                call.id.clone(),
                ToolFailure::from_error(&ToolError::InvalidArguments(detail)),
            );
        }

        match tool.execute(ToolArgs::new(call.arguments.clone())).await {
            Ok(output) => ToolResult::ok(call.id.clone(), output),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolResult::fail(call.id.clone(), ToolFailure::from_error(&e))
            }
        }
    }
}

//! Error types for the Tessel domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each bounded context
//! has its own error enum; the top-level `Error` aggregates them.
//!
//! The split that matters for the agent loop: `ToolError` variants are
//! *recoverable* — they become observations the model can react to —
//! while `AgentError` variants are *terminal* and end the task.

use thiserror::Error;

/// The top-level error type for all Tessel operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Schema errors ---
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    // --- Agent loop errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Errors raised while registering or executing tools.
///
/// Every variant except `DuplicateTool` is recoverable inside the loop:
/// the dispatcher converts it into a failed [`crate::tool::ToolResult`]
/// that is fed back to the model as an observation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name} — {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Sandbox violation: {0}")]
    SandboxViolation(String),

    #[error("Sandbox resource limit exceeded: {0}")]
    SandboxResourceExceeded(String),

    #[error("Tool execution cancelled: {0}")]
    Cancelled(String),
}

/// Errors raised while constructing a tool schema.
///
/// These fail fast at registration, never at call time.
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    #[error("Duplicate parameter '{parameter}' in schema '{schema}'")]
    DuplicateParameter { schema: String, parameter: String },

    #[error(
        "Enum value {value} on parameter '{parameter}' does not match declared type {expected}"
    )]
    EnumTypeMismatch {
        parameter: String,
        expected: String,
        value: String,
    },

    #[error("Schema name must not be empty")]
    EmptyName,
}

/// Terminal conditions of the agent loop.
///
/// None of these are retried automatically — they end the task and are
/// surfaced to the caller.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("Iteration limit exceeded after {0} rounds")]
    IterationLimitExceeded(u32),

    #[error("Loop detected: tool '{tool}' called {repeats} times with identical arguments")]
    LoopDetected { tool: String, repeats: u32 },

    #[error("Too many consecutive unparseable responses ({0})")]
    ParseFailureLimitExceeded(u32),

    #[error("Task cancelled")]
    Cancelled,
}

//! Sandboxed execution of agent-submitted code.
//!
//! Two-phase, fail-closed design:
//!
//! 1. [`validator`] — static analysis over the submission. Any denied
//!    construct (imports of process/OS/network-capable modules, dynamic
//!    evaluation built-ins, dunder attribute access) or anything the scanner
//!    cannot resolve unambiguously rejects the submission before a process
//!    exists.
//! 2. [`executor`] — accepted code runs in a freshly spawned, otherwise
//!    empty interpreter process with OS-level resource limits applied
//!    before exec. These hold even against submissions that defeat
//!    validation. One process per submission; no shared state between runs.

pub mod executor;
pub mod policy;
pub mod validator;

pub use executor::{ExecutionOutput, SandboxExecutor};
pub use policy::SandboxPolicy;
pub use validator::{CodeValidator, DenyPolicy};

use thiserror::Error;

/// Errors from the sandbox subsystem.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Static validation rejected the submission; no process was spawned.
    #[error("code rejected by validator: {}", .0.join("; "))]
    Rejected(Vec<String>),

    /// The process was killed by a resource limit or the wall-clock timeout.
    #[error("resource limit exceeded: {0}")]
    ResourceExceeded(String),

    /// The interpreter process could not be started.
    #[error("failed to spawn sandbox process: {0}")]
    Spawn(String),

    /// The run was cancelled; the child has been killed.
    #[error("sandbox run cancelled")]
    Cancelled,
}

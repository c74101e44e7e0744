//! Resource limit policy for sandboxed runs.

use std::time::Duration;

/// OS-level resource limits applied to a sandboxed process.
///
/// Immutable once a run starts. The rlimits are enforced by the operating
/// system in the child before exec, so they bind even if the submission
/// defeats static validation; the wall-clock timeout is enforced by the
/// host and ends with a forced kill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    /// CPU time limit in seconds (RLIMIT_CPU).
    pub cpu_time_secs: u64,

    /// Address-space ceiling in bytes (RLIMIT_AS).
    pub address_space_bytes: u64,

    /// Process-count ceiling (RLIMIT_NPROC) — fork bomb protection.
    pub max_processes: u64,

    /// Open file descriptor ceiling (RLIMIT_NOFILE).
    pub max_open_files: u64,

    /// Wall-clock bound on the whole run.
    pub wall_clock: Duration,
}

impl SandboxPolicy {
    /// Replace the wall-clock timeout, e.g. from a per-call override.
    pub fn with_wall_clock(mut self, wall_clock: Duration) -> Self {
        self.wall_clock = wall_clock;
        self
    }
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            cpu_time_secs: 5,
            address_space_bytes: 256 * 1024 * 1024,
            max_processes: 16,
            max_open_files: 32,
            wall_clock: Duration::from_secs(10),
        }
    }
}

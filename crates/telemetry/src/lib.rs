//! Execution tracing for Tessel agent tasks.
//!
//! Provides span-based tracing of every agent action (LLM calls, tool
//! executions, whole turns) so a finished task can be inspected step by
//! step: what was generated, what ran, how long each piece took.

pub mod engine;
pub mod model;

pub use engine::TelemetryEngine;
pub use model::{Span, SpanKind, Trace, UsageSnapshot};

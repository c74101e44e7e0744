//! The ReAct loop controller — the heart of Tessel.
//!
//! A turn cycles through **generate → parse → dispatch → observe**:
//!
//! 1. Send the conversation (plus the tool catalog) to the provider
//! 2. Parse the assistant turn: a `<tool_call>` region, a native
//!    structured call, or a plain-text final answer
//! 3. Dispatch the call through the registry; every failure becomes an
//!    observation the model can read, never a crash
//! 4. Append the observation and loop
//!
//! The loop ends with a final answer or a terminal guard: iteration cap,
//! loop detection, parse-failure ceiling, or cancellation.

pub mod loop_runner;
pub mod parser;
pub mod stream_event;

pub use loop_runner::AgentLoop;
pub use parser::{parse_output, ParsedOutput, TOOL_CALL_END, TOOL_CALL_START};
pub use stream_event::AgentStreamEvent;

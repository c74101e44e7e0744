//! Lifecycle events emitted while a turn runs.
//!
//! Frontends (CLI, future channels) subscribe to these instead of
//! polling the conversation. Serialized with a `type` tag so they can
//! cross a wire unchanged.

use serde::{Deserialize, Serialize};

/// A discrete signal from a running agent turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// A model call is about to start.
    GenerationStarted { iteration: u32 },
    /// Incremental assistant text.
    Chunk { content: String },
    /// A tool call was extracted and is about to run.
    ToolCallStarted { name: String },
    /// A tool call finished (success or uniform failure).
    ToolCallCompleted {
        name: String,
        success: bool,
        duration_ms: u64,
    },
    /// The turn produced a final answer.
    Completed { answer: String, iterations: u32 },
    /// The turn ended with a terminal error.
    Failed { message: String },
}

impl AgentStreamEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::GenerationStarted { .. } => "generation_started",
            Self::Chunk { .. } => "chunk",
            Self::ToolCallStarted { .. } => "tool_call_started",
            Self::ToolCallCompleted { .. } => "tool_call_completed",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = AgentStreamEvent::Chunk {
            content: "hello".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"chunk""#));
        assert!(json.contains(r#""content":"hello""#));
    }

    #[test]
    fn roundtrips_through_json() {
        let event = AgentStreamEvent::ToolCallCompleted {
            name: "shell".to_string(),
            success: true,
            duration_ms: 12,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: AgentStreamEvent = serde_json::from_str(&json).unwrap();
        match back {
            AgentStreamEvent::ToolCallCompleted { name, success, .. } => {
                assert_eq!(name, "shell");
                assert!(success);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn event_type_matches_variant() {
        let event = AgentStreamEvent::Failed {
            message: "boom".to_string(),
        };
        assert_eq!(event.event_type(), "failed");
    }
}

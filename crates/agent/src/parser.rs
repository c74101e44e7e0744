//! Marker-based extraction of tool calls from raw model output.
//!
//! Models that speak the text protocol wrap a single JSON object in
//! `<tool_call>` / `</tool_call>` markers. Everything else is a final
//! answer. Parsing never fails hard: a malformed region becomes
//! [`ParsedOutput::Failure`], which the loop turns into a corrective
//! observation so the model can retry.

use serde::Deserialize;
use serde_json::{Map, Value};
use tessel_core::ToolCall;

/// Opening marker for an inline tool call region.
pub const TOOL_CALL_START: &str = "<tool_call>";
/// Closing marker for an inline tool call region.
pub const TOOL_CALL_END: &str = "</tool_call>";

/// Outcome of parsing one assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOutput {
    /// A well-formed tool call was extracted.
    Call(ToolCall),
    /// No markers present: the whole text is the answer.
    FinalAnswer(String),
    /// Markers present but the region is unusable. Recoverable.
    Failure(String),
}

#[derive(Deserialize)]
struct WireCall {
    name: String,
    #[serde(default)]
    arguments: Value,
    #[serde(default)]
    id: Option<String>,
}

/// Parse one assistant message. Pure and idempotent: the same input
/// always yields the same output.
///
/// Only the first marker region is honored; one call per turn is the
/// protocol, so trailing regions are dropped with a warning.
pub fn parse_output(text: &str) -> ParsedOutput {
    let Some(start) = text.find(TOOL_CALL_START) else {
        return ParsedOutput::FinalAnswer(text.to_string());
    };

    let body_start = start + TOOL_CALL_START.len();
    let Some(end_rel) = text[body_start..].find(TOOL_CALL_END) else {
        return ParsedOutput::Failure(format!(
            "tool call block opened with {TOOL_CALL_START} but never closed with {TOOL_CALL_END}"
        ));
    };
    let payload = &text[body_start..body_start + end_rel];

    let after = body_start + end_rel + TOOL_CALL_END.len();
    if text[after..].contains(TOOL_CALL_START) {
        tracing::warn!("assistant emitted multiple tool call regions; using the first");
    }

    let wire: WireCall = match serde_json::from_str(payload.trim()) {
        Ok(wire) => wire,
        Err(e) => {
            return ParsedOutput::Failure(format!("tool call payload did not decode: {e}"));
        }
    };

    if wire.name.trim().is_empty() {
        return ParsedOutput::Failure("tool call is missing a tool name".to_string());
    }

    let arguments: Map<String, Value> = match wire.arguments {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return ParsedOutput::Failure(format!(
                "tool call arguments must be a JSON object, got {}",
                type_name(&other)
            ));
        }
    };

    ParsedOutput::Call(ToolCall {
        id: wire.id,
        name: wire.name,
        arguments,
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

//! Data model for execution traces and spans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Span ──────────────────────────────────────────────────────────────────

/// The kind of work a span represents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// An LLM completion call.
    LlmCall,
    /// A tool execution.
    ToolExecution,
    /// Top-level iteration (generate → parse → dispatch).
    Turn,
}

impl std::fmt::Display for SpanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LlmCall => write!(f, "llm_call"),
            Self::ToolExecution => write!(f, "tool_execution"),
            Self::Turn => write!(f, "turn"),
        }
    }
}

/// A single traced execution unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    /// Unique identifier.
    pub id: String,
    /// Parent span id (None for root spans).
    pub parent_id: Option<String>,
    /// What kind of work this represents.
    pub kind: SpanKind,
    /// Human-readable label (e.g. tool name, model name).
    pub label: String,
    /// When the span started.
    pub started_at: DateTime<Utc>,
    /// When the span ended (None if still running).
    pub ended_at: Option<DateTime<Utc>>,
    /// Duration in milliseconds (computed on end).
    pub duration_ms: Option<u64>,
    /// Input tokens consumed (for LLM calls).
    pub input_tokens: Option<u32>,
    /// Output tokens produced (for LLM calls).
    pub output_tokens: Option<u32>,
    /// Whether the operation succeeded.
    pub success: Option<bool>,
    /// Arbitrary metadata.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Span {
    /// Create a new span with the given kind and label.
    pub fn new(kind: SpanKind, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: None,
            kind,
            label: label.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            input_tokens: None,
            output_tokens: None,
            success: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Set the parent span.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Mark the span as ended with the given success status.
    pub fn end(&mut self, success: bool) {
        let now = Utc::now();
        self.ended_at = Some(now);
        self.duration_ms = Some(
            now.signed_duration_since(self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.success = Some(success);
    }

    /// Record token usage.
    pub fn record_tokens(&mut self, input: u32, output: u32) {
        self.input_tokens = Some(input);
        self.output_tokens = Some(output);
    }

    /// Total tokens (input + output), or 0 if not recorded.
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.unwrap_or(0) + self.output_tokens.unwrap_or(0)
    }
}

// ── Trace ─────────────────────────────────────────────────────────────────

/// A collection of spans representing one agent task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// Unique trace id.
    pub id: String,
    /// Task id this trace belongs to.
    pub task_id: String,
    /// All spans in this trace.
    pub spans: Vec<Span>,
    /// When the trace started.
    pub started_at: DateTime<Utc>,
    /// When the trace ended.
    pub ended_at: Option<DateTime<Utc>>,
}

impl Trace {
    /// Create a new trace for a task.
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            spans: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Add a span to this trace.
    pub fn add_span(&mut self, span: Span) {
        self.spans.push(span);
    }

    /// Mark the trace as complete.
    pub fn end(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    /// Total tokens across all spans.
    pub fn total_tokens(&self) -> u32 {
        self.spans.iter().map(|s| s.total_tokens()).sum()
    }

    /// Total duration in milliseconds.
    pub fn total_duration_ms(&self) -> u64 {
        self.spans.iter().filter_map(|s| s.duration_ms).sum()
    }

    /// Number of LLM calls in this trace.
    pub fn llm_call_count(&self) -> usize {
        self.spans
            .iter()
            .filter(|s| s.kind == SpanKind::LlmCall)
            .count()
    }

    /// Number of tool executions in this trace.
    pub fn tool_execution_count(&self) -> usize {
        self.spans
            .iter()
            .filter(|s| s.kind == SpanKind::ToolExecution)
            .count()
    }
}

/// A point-in-time usage snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Total input tokens recorded.
    pub total_input_tokens: u64,
    /// Total output tokens recorded.
    pub total_output_tokens: u64,
    /// Total number of LLM calls.
    pub llm_calls: u64,
    /// Total number of tool executions.
    pub tool_executions: u64,
    /// Number of traces recorded.
    pub trace_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_lifecycle() {
        let mut span = Span::new(SpanKind::LlmCall, "qwen-2.5-72b");
        assert!(span.ended_at.is_none());
        assert_eq!(span.total_tokens(), 0);

        span.record_tokens(100, 50);
        assert_eq!(span.total_tokens(), 150);

        span.end(true);
        assert!(span.ended_at.is_some());
        assert!(span.success.unwrap());
        assert!(span.duration_ms.is_some());
    }

    #[test]
    fn span_with_parent() {
        let parent = Span::new(SpanKind::Turn, "iteration-1");
        let child = Span::new(SpanKind::LlmCall, "gpt-4o").with_parent(&parent.id);
        assert_eq!(child.parent_id, Some(parent.id));
    }

    #[test]
    fn trace_aggregation() {
        let mut trace = Trace::new("task-1");

        let mut s1 = Span::new(SpanKind::LlmCall, "qwen-2.5-72b");
        s1.record_tokens(100, 50);
        s1.end(true);
        trace.add_span(s1);

        let mut s2 = Span::new(SpanKind::ToolExecution, "read_file");
        s2.end(true);
        trace.add_span(s2);

        let mut s3 = Span::new(SpanKind::LlmCall, "qwen-2.5-72b");
        s3.record_tokens(200, 100);
        s3.end(true);
        trace.add_span(s3);

        trace.end();

        assert_eq!(trace.total_tokens(), 450);
        assert_eq!(trace.llm_call_count(), 2);
        assert_eq!(trace.tool_execution_count(), 1);
        assert!(trace.ended_at.is_some());
    }

    #[test]
    fn span_kind_display() {
        assert_eq!(SpanKind::LlmCall.to_string(), "llm_call");
        assert_eq!(SpanKind::ToolExecution.to_string(), "tool_execution");
        assert_eq!(SpanKind::Turn.to_string(), "turn");
    }

    #[test]
    fn trace_serialization_roundtrip() {
        let mut trace = Trace::new("task-42");
        let mut s = Span::new(SpanKind::ToolExecution, "execute_code");
        s.end(true);
        trace.add_span(s);
        trace.end();

        let json = serde_json::to_string(&trace).unwrap();
        let roundtrip: Trace = serde_json::from_str(&json).unwrap();

        assert_eq!(roundtrip.task_id, "task-42");
        assert_eq!(roundtrip.spans.len(), 1);
    }
}

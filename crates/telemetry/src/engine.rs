//! Thread-safe telemetry engine — collects spans into traces and keeps
//! running totals for usage reports.

use crate::model::*;
use std::sync::RwLock;

/// The core telemetry engine.
///
/// Thread-safe via `RwLock`. Tracks execution spans grouped into
/// per-task traces.
pub struct TelemetryEngine {
    /// All recorded traces (most recent last).
    traces: RwLock<Vec<Trace>>,
    /// Running totals.
    totals: RwLock<RunningTotals>,
}

/// Internal running totals for fast snapshots.
#[derive(Debug, Default)]
struct RunningTotals {
    total_input_tokens: u64,
    total_output_tokens: u64,
    total_llm_calls: u64,
    total_tool_execs: u64,
}

impl TelemetryEngine {
    /// Create a new telemetry engine.
    pub fn new() -> Self {
        Self {
            traces: RwLock::new(Vec::new()),
            totals: RwLock::new(RunningTotals::default()),
        }
    }

    // ── Trace management ──────────────────────────────────────────────

    /// Start a new trace for a task.
    pub fn start_trace(&self, task_id: impl Into<String>) -> String {
        let trace = Trace::new(task_id);
        let id = trace.id.clone();
        let mut traces = self.traces.write().unwrap();

        // Auto-prune completed traces if too many accumulate
        const MAX_TRACES: usize = 5_000;
        if traces.len() >= MAX_TRACES {
            let drain_count = MAX_TRACES / 10;
            let mut removed = 0;
            traces.retain(|t| {
                if removed >= drain_count {
                    return true;
                }
                if t.ended_at.is_some() {
                    removed += 1;
                    return false;
                }
                true
            });
        }

        traces.push(trace);
        id
    }

    /// End a trace.
    pub fn end_trace(&self, trace_id: &str) {
        let mut traces = self.traces.write().unwrap();
        if let Some(trace) = traces.iter_mut().find(|t| t.id == trace_id) {
            trace.end();
        }
    }

    /// Record a completed span in a trace and update running totals.
    pub fn record_span(&self, trace_id: &str, span: Span) {
        {
            let mut totals = self.totals.write().unwrap();
            totals.total_input_tokens += span.input_tokens.unwrap_or(0) as u64;
            totals.total_output_tokens += span.output_tokens.unwrap_or(0) as u64;

            match span.kind {
                SpanKind::LlmCall => totals.total_llm_calls += 1,
                SpanKind::ToolExecution => totals.total_tool_execs += 1,
                SpanKind::Turn => {}
            }
        }

        let mut traces = self.traces.write().unwrap();
        if let Some(trace) = traces.iter_mut().find(|t| t.id == trace_id) {
            trace.add_span(span);
        }
    }

    // ── Queries ───────────────────────────────────────────────────────

    /// Get a specific trace by ID.
    pub fn get_trace(&self, trace_id: &str) -> Option<Trace> {
        let traces = self.traces.read().unwrap();
        traces.iter().find(|t| t.id == trace_id).cloned()
    }

    /// List recent traces (most recent first).
    pub fn recent_traces(&self, limit: usize) -> Vec<Trace> {
        let traces = self.traces.read().unwrap();
        traces.iter().rev().take(limit).cloned().collect()
    }

    /// Get traces for a specific task.
    pub fn traces_for_task(&self, task_id: &str) -> Vec<Trace> {
        let traces = self.traces.read().unwrap();
        traces
            .iter()
            .filter(|t| t.task_id == task_id)
            .cloned()
            .collect()
    }

    /// Total number of traces recorded.
    pub fn trace_count(&self) -> usize {
        self.traces.read().unwrap().len()
    }

    /// Get a real-time usage snapshot.
    pub fn usage_snapshot(&self) -> UsageSnapshot {
        let totals = self.totals.read().unwrap();
        UsageSnapshot {
            total_input_tokens: totals.total_input_tokens,
            total_output_tokens: totals.total_output_tokens,
            llm_calls: totals.total_llm_calls,
            tool_executions: totals.total_tool_execs,
            trace_count: self.traces.read().unwrap().len() as u64,
        }
    }
}

impl Default for TelemetryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_lifecycle() {
        let engine = TelemetryEngine::new();
        let trace_id = engine.start_trace("task-1");

        let mut span = Span::new(SpanKind::LlmCall, "gpt-4o");
        span.record_tokens(100, 40);
        span.end(true);
        engine.record_span(&trace_id, span);

        engine.end_trace(&trace_id);

        let trace = engine.get_trace(&trace_id).unwrap();
        assert_eq!(trace.spans.len(), 1);
        assert!(trace.ended_at.is_some());
        assert_eq!(trace.total_tokens(), 140);
    }

    #[test]
    fn totals_accumulate_across_traces() {
        let engine = TelemetryEngine::new();

        for i in 0..3 {
            let trace_id = engine.start_trace(format!("task-{i}"));
            let mut llm = Span::new(SpanKind::LlmCall, "gpt-4o");
            llm.record_tokens(50, 25);
            llm.end(true);
            engine.record_span(&trace_id, llm);

            let mut tool = Span::new(SpanKind::ToolExecution, "shell");
            tool.end(true);
            engine.record_span(&trace_id, tool);
            engine.end_trace(&trace_id);
        }

        let snap = engine.usage_snapshot();
        assert_eq!(snap.llm_calls, 3);
        assert_eq!(snap.tool_executions, 3);
        assert_eq!(snap.total_input_tokens, 150);
        assert_eq!(snap.total_output_tokens, 75);
        assert_eq!(snap.trace_count, 3);
    }

    #[test]
    fn traces_for_task_filters() {
        let engine = TelemetryEngine::new();
        engine.start_trace("task-a");
        engine.start_trace("task-b");
        engine.start_trace("task-a");

        assert_eq!(engine.traces_for_task("task-a").len(), 2);
        assert_eq!(engine.traces_for_task("task-b").len(), 1);
        assert_eq!(engine.trace_count(), 3);
    }

    #[test]
    fn recent_traces_most_recent_first() {
        let engine = TelemetryEngine::new();
        engine.start_trace("first");
        engine.start_trace("second");

        let recent = engine.recent_traces(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].task_id, "second");
    }
}

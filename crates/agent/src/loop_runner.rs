//! The ReAct loop — generate, parse, dispatch, observe, repeat.
//!
//! Each iteration sends the conversation to the provider, interprets the
//! assistant turn as either a tool call or a final answer, and feeds tool
//! observations back in. Three guards keep the loop bounded:
//!
//! - an iteration cap (hard ceiling on provider calls per turn)
//! - loop detection (the same tool called with the same arguments over
//!   and over terminates the turn)
//! - a consecutive parse-failure ceiling (a model that never produces a
//!   usable turn gets a bounded number of corrective retries)
//!
//! Cancellation is checked at every state transition and raced against
//! in-flight generation and tool execution, so a cancelled turn stops
//! promptly and its partial output is discarded.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tessel_core::{
    AgentError, Conversation, DomainEvent, Error, EventBus, Message, MessageToolCall, Provider,
    ProviderRequest, ToolCall, ToolRegistry, Usage,
};
use tessel_telemetry::{Span, SpanKind, TelemetryEngine};

use crate::parser::{self, ParsedOutput, TOOL_CALL_END, TOOL_CALL_START};
use crate::stream_event::AgentStreamEvent;

const DEFAULT_MAX_ITERATIONS: u32 = 15;
const DEFAULT_LOOP_REPEAT_THRESHOLD: u32 = 3;
const DEFAULT_PARSE_FAILURE_LIMIT: u32 = 3;

/// Drives one task to completion against a provider and a tool registry.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    event_bus: Arc<EventBus>,
    telemetry: Option<Arc<TelemetryEngine>>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_iterations: u32,
    loop_repeat_threshold: u32,
    parse_failure_limit: u32,
    events: Option<mpsc::UnboundedSender<AgentStreamEvent>>,
}

/// Mutable bookkeeping for one turn.
struct TurnState {
    iterations: u32,
    parse_failures: u32,
    /// Trailing window of (tool name, normalized arguments) pairs.
    window: VecDeque<(String, String)>,
    window_cap: usize,
}

impl TurnState {
    fn new(loop_repeat_threshold: u32) -> Self {
        Self {
            iterations: 0,
            parse_failures: 0,
            window: VecDeque::new(),
            window_cap: loop_repeat_threshold.max(1) as usize,
        }
    }

    /// Record a call and return the length of the trailing run of
    /// identical calls, this one included.
    fn record_call(&mut self, name: &str, normalized_args: &str) -> u32 {
        self.window
            .push_back((name.to_string(), normalized_args.to_string()));
        if self.window.len() > self.window_cap {
            self.window.pop_front();
        }
        let newest = self
            .window
            .back()
            .cloned()
            .unwrap_or_else(|| (String::new(), String::new()));
        self.window.iter().rev().take_while(|p| **p == newest).count() as u32
    }
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            tools,
            event_bus,
            telemetry: None,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            loop_repeat_threshold: DEFAULT_LOOP_REPEAT_THRESHOLD,
            parse_failure_limit: DEFAULT_PARSE_FAILURE_LIMIT,
            events: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_loop_repeat_threshold(mut self, threshold: u32) -> Self {
        self.loop_repeat_threshold = threshold.max(2);
        self
    }

    pub fn with_parse_failure_limit(mut self, limit: u32) -> Self {
        self.parse_failure_limit = limit.max(1);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<TelemetryEngine>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Forward lifecycle events to a channel (e.g., for a live CLI view).
    pub fn with_stream_sender(mut self, sender: mpsc::UnboundedSender<AgentStreamEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Run a fresh task: builds the conversation and drives it to a
    /// final answer or a terminal error.
    pub async fn run_task(
        &self,
        system_prompt: &str,
        task: &str,
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        let mut conversation = Conversation::with_task(system_prompt, task);
        self.process(&mut conversation, cancel).await
    }

    /// Drive an existing conversation until the model produces a final
    /// answer or a guard trips.
    pub async fn process(
        &self,
        conversation: &mut Conversation,
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        let trace_id = self
            .telemetry
            .as_ref()
            .map(|t| t.start_trace(conversation.id.to_string()));

        let result = self.drive(conversation, cancel, trace_id.as_deref()).await;

        if let (Some(telemetry), Some(id)) = (&self.telemetry, &trace_id) {
            telemetry.end_trace(id);
        }
        if let Err(e) = &result {
            self.event_bus.publish(DomainEvent::TurnFailed {
                conversation_id: conversation.id.to_string(),
                error_message: e.to_string(),
                timestamp: Utc::now(),
            });
            self.emit(AgentStreamEvent::Failed {
                message: e.to_string(),
            });
        }
        result
    }

    async fn drive(
        &self,
        conversation: &mut Conversation,
        cancel: &CancellationToken,
        trace_id: Option<&str>,
    ) -> Result<String, Error> {
        let mut state = TurnState::new(self.loop_repeat_threshold);

        loop {
            self.ensure_live(cancel)?;

            state.iterations += 1;
            if state.iterations > self.max_iterations {
                warn!(
                    max_iterations = self.max_iterations,
                    "iteration limit reached without a final answer"
                );
                return Err(AgentError::IterationLimitExceeded(self.max_iterations).into());
            }

            debug!(iteration = state.iterations, "requesting generation");
            self.emit(AgentStreamEvent::GenerationStarted {
                iteration: state.iterations,
            });

            let message = self.generate(conversation, cancel, trace_id).await?;
            let action = interpret(&message);
            conversation.push(message);

            self.ensure_live(cancel)?;

            match action {
                ParsedOutput::FinalAnswer(answer) => {
                    info!(iterations = state.iterations, "turn completed");
                    self.event_bus.publish(DomainEvent::TurnCompleted {
                        conversation_id: conversation.id.to_string(),
                        iterations: state.iterations,
                        timestamp: Utc::now(),
                    });
                    self.emit(AgentStreamEvent::Completed {
                        answer: answer.clone(),
                        iterations: state.iterations,
                    });
                    return Ok(answer);
                }

                ParsedOutput::Failure(reason) => {
                    state.parse_failures += 1;
                    warn!(
                        %reason,
                        consecutive = state.parse_failures,
                        "assistant turn could not be interpreted"
                    );
                    if state.parse_failures >= self.parse_failure_limit {
                        return Err(
                            AgentError::ParseFailureLimitExceeded(self.parse_failure_limit).into(),
                        );
                    }
                    conversation.push(Message::user(format!(
                        "Your last message could not be interpreted: {reason}. \
                         Reply with either a plain-text final answer, or exactly one \
                         tool call wrapped in {TOOL_CALL_START}...{TOOL_CALL_END} \
                         containing a JSON object with \"name\" and \"arguments\"."
                    )));
                }

                ParsedOutput::Call(call) => {
                    state.parse_failures = 0;

                    let repeats = state.record_call(&call.name, &call.normalized_arguments());
                    if repeats >= self.loop_repeat_threshold {
                        warn!(tool = %call.name, repeats, "identical call repeated; stopping");
                        return Err(AgentError::LoopDetected {
                            tool: call.name,
                            repeats,
                        }
                        .into());
                    }

                    let observation = self.dispatch(&call, cancel, trace_id).await?;
                    match &call.id {
                        Some(id) => {
                            conversation.push(Message::tool_result(id.clone(), observation));
                        }
                        None => {
                            conversation.push(Message::user(format!("Observation: {observation}")));
                        }
                    }
                }
            }
        }
    }

    /// One provider call, streamed. Content deltas are forwarded as
    /// [`AgentStreamEvent::Chunk`]; tool calls and usage arrive on the
    /// final chunk. Cancellation drops the receiver mid-stream.
    async fn generate(
        &self,
        conversation: &Conversation,
        cancel: &CancellationToken,
        trace_id: Option<&str>,
    ) -> Result<Message, Error> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: conversation.messages.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tools.definitions(),
            stream: true,
        };

        let mut span = Span::new(SpanKind::LlmCall, &self.model);
        let mut rx = match self.provider.stream(request).await {
            Ok(rx) => rx,
            Err(e) => {
                span.end(false);
                self.record_span(trace_id, span);
                return Err(e.into());
            }
        };

        let mut content = String::new();
        let mut tool_calls: Vec<MessageToolCall> = Vec::new();
        let mut usage: Option<Usage> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    span.end(false);
                    self.record_span(trace_id, span);
                    return Err(AgentError::Cancelled.into());
                }
                chunk = rx.recv() => match chunk {
                    None => break,
                    Some(Err(e)) => {
                        span.end(false);
                        self.record_span(trace_id, span);
                        return Err(e.into());
                    }
                    Some(Ok(chunk)) => {
                        if let Some(delta) = chunk.content {
                            content.push_str(&delta);
                            self.emit(AgentStreamEvent::Chunk { content: delta });
                        }
                        if chunk.done {
                            tool_calls = chunk.tool_calls;
                            usage = chunk.usage;
                            break;
                        }
                    }
                }
            }
        }

        if let Some(u) = &usage {
            span.record_tokens(u.prompt_tokens, u.completion_tokens);
        }
        span.end(true);
        self.record_span(trace_id, span);

        self.event_bus.publish(DomainEvent::ResponseGenerated {
            conversation_id: conversation.id.to_string(),
            model: self.model.clone(),
            tokens_used: usage.as_ref().map(|u| u.total_tokens).unwrap_or(0),
            timestamp: Utc::now(),
        });

        let mut message = Message::assistant(content);
        message.tool_calls = tool_calls;
        Ok(message)
    }

    /// Run one tool call through the registry. Every failure comes back
    /// as a uniform observation string; only cancellation escapes as an
    /// error. The dispatch future is dropped on cancel, which kills any
    /// in-flight sandbox child.
    async fn dispatch(
        &self,
        call: &ToolCall,
        cancel: &CancellationToken,
        trace_id: Option<&str>,
    ) -> Result<String, Error> {
        debug!(tool = %call.name, "dispatching tool call");
        self.emit(AgentStreamEvent::ToolCallStarted {
            name: call.name.clone(),
        });

        let mut span = Span::new(SpanKind::ToolExecution, &call.name);
        let started = Instant::now();

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                span.end(false);
                self.record_span(trace_id, span);
                return Err(AgentError::Cancelled.into());
            }
            result = self.tools.dispatch(call) => result,
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        span.end(result.success);
        self.record_span(trace_id, span);

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: result.success,
            duration_ms,
            timestamp: Utc::now(),
        });
        self.emit(AgentStreamEvent::ToolCallCompleted {
            name: call.name.clone(),
            success: result.success,
            duration_ms,
        });

        Ok(result.observation().to_string())
    }

    fn ensure_live(&self, cancel: &CancellationToken) -> Result<(), Error> {
        if cancel.is_cancelled() {
            Err(AgentError::Cancelled.into())
        } else {
            Ok(())
        }
    }

    fn emit(&self, event: AgentStreamEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn record_span(&self, trace_id: Option<&str>, span: Span) {
        if let (Some(telemetry), Some(id)) = (&self.telemetry, trace_id) {
            telemetry.record_span(id, span);
        }
    }
}

/// Decide what an assistant turn means.
///
/// Native (structured) tool calls take priority over the text protocol;
/// one call per turn, trailing calls are dropped.
fn interpret(message: &Message) -> ParsedOutput {
    if let Some(first) = message.tool_calls.first() {
        if message.tool_calls.len() > 1 {
            warn!(
                count = message.tool_calls.len(),
                "assistant requested multiple tool calls; using the first"
            );
        }
        return native_to_call(first);
    }
    parser::parse_output(&message.content)
}

fn native_to_call(call: &MessageToolCall) -> ParsedOutput {
    let raw = call.arguments.trim();
    let arguments = if raw.is_empty() {
        serde_json::Map::new()
    } else {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(Value::Null) => serde_json::Map::new(),
            Ok(_) => {
                return ParsedOutput::Failure(format!(
                    "tool call '{}' arguments must be a JSON object",
                    call.name
                ));
            }
            Err(e) => {
                return ParsedOutput::Failure(format!(
                    "tool call '{}' arguments did not decode: {e}",
                    call.name
                ));
            }
        }
    };
    ParsedOutput::Call(ToolCall {
        id: Some(call.id.clone()),
        name: call.name.clone(),
        arguments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tessel_core::{
        ParamType, ProviderError, ProviderResponse, Role, Tool, ToolArgs, ToolError,
        ToolParameter, ToolSchema,
    };

    /// Replays canned assistant turns; repeats the last one when the
    /// script runs out.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<String>>,
        last: Mutex<String>,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
                last: Mutex::new("out of script".to_string()),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            let content = match self.replies.lock().unwrap().pop_front() {
                Some(next) => {
                    *self.last.lock().unwrap() = next.clone();
                    next
                }
                None => self.last.lock().unwrap().clone(),
            };
            Ok(ProviderResponse {
                message: Message::assistant(content),
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                model: "scripted".to_string(),
            })
        }
    }

    /// Always answers with one native (structured) tool call, then text.
    struct NativeCallProvider {
        called: AtomicU32,
    }

    #[async_trait]
    impl Provider for NativeCallProvider {
        fn name(&self) -> &str {
            "native"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            let message = if self.called.fetch_add(1, Ordering::SeqCst) == 0 {
                let mut m = Message::assistant("");
                m.tool_calls = vec![MessageToolCall {
                    id: "call_1".to_string(),
                    name: "ping".to_string(),
                    arguments: "{}".to_string(),
                }];
                m
            } else {
                Message::assistant("done")
            };
            Ok(ProviderResponse {
                message,
                usage: None,
                model: "native".to_string(),
            })
        }
    }

    struct PingTool {
        schema: ToolSchema,
        calls: Arc<AtomicU32>,
    }

    impl PingTool {
        fn new(calls: Arc<AtomicU32>) -> Self {
            let schema = ToolSchema::new(
                "ping",
                "Replies with pong",
                vec![ToolParameter::optional(
                    "n",
                    ParamType::Integer,
                    "Sequence number",
                )],
            )
            .expect("static schema");
            Self { schema, calls }
        }
    }

    #[async_trait]
    impl Tool for PingTool {
        fn schema(&self) -> &ToolSchema {
            &self.schema
        }

        async fn execute(&self, _args: ToolArgs) -> std::result::Result<String, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("pong".to_string())
        }
    }

    fn harness(provider: Arc<dyn Provider>) -> (AgentLoop, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let registry = ToolRegistry::builder()
            .with(Box::new(PingTool::new(calls.clone())))
            .build()
            .unwrap();
        let agent = AgentLoop::new(
            provider,
            Arc::new(registry),
            Arc::new(EventBus::default()),
            "test-model",
        )
        .with_max_iterations(8);
        (agent, calls)
    }

    const PING_CALL: &str = r#"<tool_call>{"name":"ping","arguments":{}}</tool_call>"#;

    #[tokio::test]
    async fn plain_answer_completes_in_one_iteration() {
        let (agent, calls) = harness(Arc::new(ScriptedProvider::new(&["All done."])));
        let answer = agent
            .run_task("You are helpful.", "say done", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, "All done.");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tool_call_observation_feeds_next_iteration() {
        let (agent, calls) = harness(Arc::new(ScriptedProvider::new(&[PING_CALL, "done"])));
        let mut conversation = Conversation::with_task("sys", "use ping");
        let answer = agent
            .process(&mut conversation, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(conversation
            .messages
            .iter()
            .any(|m| m.content.contains("Observation: pong")));
    }

    #[tokio::test]
    async fn loop_detected_at_exactly_third_identical_call() {
        // Script exhausts and repeats the same call forever.
        let (agent, calls) = harness(Arc::new(ScriptedProvider::new(&[PING_CALL])));
        let agent = agent.with_loop_repeat_threshold(3);
        let err = agent
            .run_task("sys", "loop forever", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Agent(AgentError::LoopDetected { repeats: 3, .. })
        ));
        // The third identical call is detected before dispatch.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn different_arguments_do_not_trip_loop_detection() {
        let a = r#"<tool_call>{"name":"ping","arguments":{"n":1}}</tool_call>"#;
        let b = r#"<tool_call>{"name":"ping","arguments":{"n":2}}</tool_call>"#;
        let (agent, calls) = harness(Arc::new(ScriptedProvider::new(&[a, b, a, b, "ok"])));
        let answer = agent
            .run_task("sys", "alternate", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn iteration_limit_is_terminal() {
        let a = r#"<tool_call>{"name":"ping","arguments":{"n":1}}</tool_call>"#;
        let b = r#"<tool_call>{"name":"ping","arguments":{"n":2}}</tool_call>"#;
        let (agent, calls) = harness(Arc::new(ScriptedProvider::new(&[a, b, a, b, a, b])));
        let agent = agent.with_max_iterations(4);
        let err = agent
            .run_task("sys", "never finish", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Agent(AgentError::IterationLimitExceeded(4))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn consecutive_parse_failures_hit_ceiling() {
        let garbage = "<tool_call>{never closed";
        let (agent, calls) = harness(Arc::new(ScriptedProvider::new(&[garbage])));
        let agent = agent.with_parse_failure_limit(3);
        let err = agent
            .run_task("sys", "garbage", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Agent(AgentError::ParseFailureLimitExceeded(3))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn single_parse_failure_gets_corrective_observation() {
        let (agent, _) = harness(Arc::new(ScriptedProvider::new(&[
            "<tool_call>{oops",
            "recovered",
        ])));
        let mut conversation = Conversation::with_task("sys", "try again");
        let answer = agent
            .process(&mut conversation, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, "recovered");
        assert!(conversation
            .messages
            .iter()
            .any(|m| m.content.contains("could not be interpreted")));
    }

    #[tokio::test]
    async fn successful_call_resets_parse_failure_count() {
        let garbage = "<tool_call>{oops";
        let (agent, calls) = harness(Arc::new(ScriptedProvider::new(&[
            garbage, garbage, PING_CALL, garbage, garbage, "end",
        ])));
        let agent = agent.with_parse_failure_limit(3);
        let answer = agent
            .run_task("sys", "flaky", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, "end");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pre_cancelled_token_short_circuits() {
        let (agent, calls) = harness(Arc::new(ScriptedProvider::new(&["never seen"])));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = agent.run_task("sys", "task", &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Agent(AgentError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn native_tool_calls_take_priority_over_content() {
        let provider = Arc::new(NativeCallProvider {
            called: AtomicU32::new(0),
        });
        let (agent, calls) = harness(provider);
        let mut conversation = Conversation::with_task("sys", "native");
        let answer = agent
            .process(&mut conversation, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Native calls carry an id, so the observation is a tool message.
        assert!(conversation
            .messages
            .iter()
            .any(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some("call_1")));
    }

    #[tokio::test]
    async fn unknown_tool_becomes_observation_not_error() {
        let bad = r#"<tool_call>{"name":"nope","arguments":{}}</tool_call>"#;
        let (agent, _) = harness(Arc::new(ScriptedProvider::new(&[bad, "moving on"])));
        let mut conversation = Conversation::with_task("sys", "bad tool");
        let answer = agent
            .process(&mut conversation, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, "moving on");
        assert!(conversation
            .messages
            .iter()
            .any(|m| m.content.contains("nope")));
    }

    #[tokio::test]
    async fn domain_events_published_for_tools_and_completion() {
        let calls = Arc::new(AtomicU32::new(0));
        let registry = ToolRegistry::builder()
            .with(Box::new(PingTool::new(calls)))
            .build()
            .unwrap();
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let agent = AgentLoop::new(
            Arc::new(ScriptedProvider::new(&[PING_CALL, "fin"])),
            Arc::new(registry),
            bus,
            "test-model",
        );
        agent
            .run_task("sys", "events", &CancellationToken::new())
            .await
            .unwrap();

        let mut saw_tool = false;
        let mut saw_completed = false;
        while let Ok(event) = rx.try_recv() {
            match event.as_ref() {
                DomainEvent::ToolExecuted { tool_name, success, .. } => {
                    assert_eq!(tool_name, "ping");
                    assert!(success);
                    saw_tool = true;
                }
                DomainEvent::TurnCompleted { iterations, .. } => {
                    assert_eq!(*iterations, 2);
                    saw_completed = true;
                }
                _ => {}
            }
        }
        assert!(saw_tool);
        assert!(saw_completed);
    }

    #[tokio::test]
    async fn stream_events_trace_the_turn_lifecycle() {
        let (agent, _) = harness(Arc::new(ScriptedProvider::new(&[PING_CALL, "done"])));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let agent = agent.with_stream_sender(tx);
        agent
            .run_task("sys", "watch me", &CancellationToken::new())
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        let kinds: Vec<&str> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(
            kinds,
            vec![
                "generation_started",
                "chunk",
                "tool_call_started",
                "tool_call_completed",
                "generation_started",
                "chunk",
                "completed",
            ]
        );
        match events.last().unwrap() {
            AgentStreamEvent::Completed { answer, iterations } => {
                assert_eq!(answer, "done");
                assert_eq!(*iterations, 2);
            }
            other => panic!("unexpected final event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_turn_emits_failed_event() {
        let (agent, _) = harness(Arc::new(ScriptedProvider::new(&[PING_CALL])));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let agent = agent.with_stream_sender(tx).with_loop_repeat_threshold(3);
        agent
            .run_task("sys", "loop forever", &CancellationToken::new())
            .await
            .unwrap_err();

        let mut saw_failed = false;
        while let Ok(event) = rx.try_recv() {
            if let AgentStreamEvent::Failed { message } = event {
                assert!(message.contains("ping"));
                saw_failed = true;
            }
        }
        assert!(saw_failed);
    }

    #[tokio::test]
    async fn telemetry_trace_records_spans() {
        let (agent, _) = harness(Arc::new(ScriptedProvider::new(&[PING_CALL, "fin"])));
        let telemetry = Arc::new(TelemetryEngine::new());
        let agent = agent.with_telemetry(telemetry.clone());
        agent
            .run_task("sys", "traced", &CancellationToken::new())
            .await
            .unwrap();

        let traces = telemetry.recent_traces(1);
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].llm_call_count(), 2);
        assert_eq!(traces[0].tool_execution_count(), 1);
    }
}

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

use chronicle_store::EventStore;
use chronicle_types::{
    CompactBoundaryPayload, EventType, Message, RunId, SessionId, StopReason, TokenUsage,
    ToolCallId,
};

use crate::error::Result;
use crate::linearizer::SessionLinearizer;
use crate::offload::offload_tool_result;
use crate::session::SessionRuntime;

/// Domain signals arriving from the agent loop, provider streaming and
/// tool execution. The orchestrator is pure glue: each signal maps to
/// linearizer submissions, tracker updates and UI emissions — no business
/// rules beyond dispatch.
#[derive(Debug, Clone)]
pub enum AgentSignal {
    TurnStart {
        turn: u32,
    },
    TextDelta {
        delta: String,
    },
    ThinkingDelta {
        delta: String,
    },
    /// Forwarded partial message state (e.g. from a subagent); UI-only.
    MessageUpdate {
        content: String,
    },
    /// The turn stopped to run tools: flush the assistant message with its
    /// tool_use blocks.
    ToolUseBatch {
        usage: TokenUsage,
        latency: Option<u64>,
    },
    ResponseComplete {
        stop_reason: StopReason,
        usage: TokenUsage,
        latency: Option<u64>,
    },
    ToolExecutionStart {
        tool_call_id: ToolCallId,
        name: String,
        arguments: Value,
    },
    ToolExecutionEnd {
        tool_call_id: ToolCallId,
        output: String,
        is_error: bool,
        duration: Option<u64>,
        mime_type: Option<String>,
    },
    /// The provider stream ended without usable token counts.
    TokenExtractionFailed {
        message: String,
    },
    CompactionComplete {
        boundary: CompactBoundaryPayload,
    },
    HookTriggered {
        hook_name: String,
        hook_type: Option<String>,
    },
    HookCompleted {
        hook_name: String,
        success: bool,
        duration: Option<u64>,
    },
    AgentInterrupted,
}

/// Events emitted toward streaming clients (WebSocket-style).
///
/// `ToolEnded.output` carries the PRE-truncation content: clients render
/// full payloads (screenshots included) without a second round trip, while
/// the persisted event holds the compact pointered form.
#[derive(Debug, Clone)]
pub enum UiEvent {
    TurnStarted {
        session_id: SessionId,
        turn: u32,
    },
    MessageDelta {
        session_id: SessionId,
        delta: String,
    },
    ToolStarted {
        session_id: SessionId,
        tool_call_id: ToolCallId,
        name: String,
    },
    ToolEnded {
        session_id: SessionId,
        tool_call_id: ToolCallId,
        output: String,
        is_error: bool,
        duration: Option<u64>,
    },
    TurnCompleted {
        session_id: SessionId,
        turn: u32,
        stop_reason: StopReason,
    },
    Interrupted {
        session_id: SessionId,
        partial_content: String,
    },
}

const UI_CHANNEL_CAPACITY: usize = 256;

/// Thin per-session router from agent signals to the durable log, the
/// per-session trackers and the UI channel.
pub struct Orchestrator {
    store: EventStore,
    linearizer: Arc<SessionLinearizer>,
    session: SessionRuntime,
    run_id: RunId,
    ui_tx: broadcast::Sender<UiEvent>,
}

impl Orchestrator {
    pub fn new(
        store: EventStore,
        linearizer: Arc<SessionLinearizer>,
        session: SessionRuntime,
    ) -> Self {
        let (ui_tx, _) = broadcast::channel(UI_CHANNEL_CAPACITY);
        Self {
            store,
            linearizer,
            session,
            run_id: RunId::mint(),
            ui_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.ui_tx.subscribe()
    }

    pub fn session(&self) -> &SessionRuntime {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionRuntime {
        &mut self.session
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    fn session_id(&self) -> SessionId {
        self.session.record.id.clone()
    }

    fn persist(&self, event_type: EventType, payload: Value) -> Result<()> {
        self.linearizer.append_for_run(
            &self.session.record.id,
            event_type,
            payload,
            Some(self.run_id.clone()),
        )
    }

    fn emit(&self, event: UiEvent) {
        // No receivers is fine; streaming clients come and go.
        let _ = self.ui_tx.send(event);
    }

    /// Route one signal. Exhaustive: a new signal variant fails closed
    /// here at compile time.
    pub fn handle(&mut self, signal: AgentSignal) -> Result<()> {
        match signal {
            AgentSignal::TurnStart { turn } => {
                let model = self.session.context.model().to_string();
                self.session.turn_tracker.begin_turn(turn, &model);
                self.persist(
                    EventType::StreamTurnStart,
                    serde_json::json!({"turn": turn, "model": model}),
                )?;
                self.emit(UiEvent::TurnStarted {
                    session_id: self.session_id(),
                    turn,
                });
            }

            AgentSignal::TextDelta { delta } => {
                self.session.turn_tracker.on_text_delta(&delta);
                self.emit(UiEvent::MessageDelta {
                    session_id: self.session_id(),
                    delta,
                });
            }

            AgentSignal::ThinkingDelta { delta } => {
                self.session.turn_tracker.on_thinking_delta(&delta);
            }

            AgentSignal::MessageUpdate { content } => {
                self.emit(UiEvent::MessageDelta {
                    session_id: self.session_id(),
                    delta: content,
                });
            }

            AgentSignal::ToolUseBatch { usage, latency } => {
                self.flush_assistant(StopReason::ToolUse, usage, latency)?;
            }

            AgentSignal::ResponseComplete {
                stop_reason,
                usage,
                latency,
            } => {
                let turn = self.session.turn_tracker.turn();
                self.flush_assistant(stop_reason, usage, latency)?;
                if stop_reason.ends_turn() {
                    self.session.turn_count += 1;
                }
                self.persist(
                    EventType::StreamTurnEnd,
                    serde_json::json!({"turn": turn, "stopReason": stop_reason}),
                )?;
                self.emit(UiEvent::TurnCompleted {
                    session_id: self.session_id(),
                    turn,
                    stop_reason,
                });
            }

            AgentSignal::ToolExecutionStart {
                tool_call_id,
                name,
                arguments,
            } => {
                self.persist(
                    EventType::ToolCall,
                    serde_json::json!({
                        "toolCallId": tool_call_id,
                        "name": name,
                        "arguments": arguments,
                        "turn": self.session.turn_tracker.turn(),
                    }),
                )?;
                self.emit(UiEvent::ToolStarted {
                    session_id: self.session_id(),
                    tool_call_id,
                    name,
                });
            }

            AgentSignal::ToolExecutionEnd {
                tool_call_id,
                output,
                is_error,
                duration,
                mime_type,
            } => {
                // Persisted copy: offloaded/pointered. Wire copy: full.
                let offloaded =
                    offload_tool_result(&self.store, &output, mime_type.as_deref())?;

                let processed = self
                    .session
                    .context
                    .process_tool_result(&offloaded.persisted_content);
                self.session.context.add_message(Message::tool_result(
                    tool_call_id.clone(),
                    processed.content,
                    is_error,
                ));

                self.persist(
                    EventType::ToolResult,
                    serde_json::json!({
                        "toolCallId": tool_call_id,
                        "content": offloaded.persisted_content,
                        "isError": is_error,
                        "duration": duration,
                        "truncated": offloaded.truncated,
                        "blobId": offloaded.blob_id,
                    }),
                )?;

                self.emit(UiEvent::ToolEnded {
                    session_id: self.session_id(),
                    tool_call_id,
                    output,
                    is_error,
                    duration,
                });
            }

            AgentSignal::TokenExtractionFailed { message } => {
                self.persist(
                    EventType::ErrorAgent,
                    serde_json::json!({
                        "category": "TOKEN_EXTRACTION",
                        "message": message,
                        "turn": self.session.turn_tracker.turn(),
                    }),
                )?;
            }

            AgentSignal::CompactionComplete { boundary } => {
                self.persist(EventType::CompactBoundary, serde_json::to_value(&boundary)?)?;
            }

            AgentSignal::HookTriggered {
                hook_name,
                hook_type,
            } => {
                self.persist(
                    EventType::HookTriggered,
                    serde_json::json!({
                        "hookName": hook_name,
                        "hookType": hook_type,
                        "turn": self.session.turn_tracker.turn(),
                    }),
                )?;
            }

            AgentSignal::HookCompleted {
                hook_name,
                success,
                duration,
            } => {
                self.persist(
                    EventType::HookCompleted,
                    serde_json::json!({
                        "hookName": hook_name,
                        "success": success,
                        "duration": duration,
                    }),
                )?;
            }

            AgentSignal::AgentInterrupted => {
                let partial = self.session.turn_tracker.partial_text();
                self.persist(
                    EventType::AgentInterrupted,
                    serde_json::json!({
                        "partialContent": partial,
                        "turn": self.session.turn_tracker.turn(),
                    }),
                )?;
                self.emit(UiEvent::Interrupted {
                    session_id: self.session_id(),
                    partial_content: partial,
                });
            }
        }

        Ok(())
    }

    /// Flush streamed content as a durable `message.assistant`, updating
    /// the usage tracker and the context projection on the way.
    fn flush_assistant(
        &mut self,
        stop_reason: StopReason,
        usage: TokenUsage,
        latency: Option<u64>,
    ) -> Result<()> {
        let model = self.session.context.model().to_string();
        let turn_usage = self.session.usage.record(&self.store, &model, &usage)?;
        self.session
            .context
            .set_api_context_tokens(turn_usage.normalized.context_window_tokens);

        let payload = self.session.turn_tracker.flush(stop_reason, usage, latency);
        self.session.context.add_message(Message {
            role: chronicle_types::MessageRole::Assistant,
            content: payload.content.clone(),
            event_id: None,
            tool_call_id: None,
            is_error: false,
        });

        self.persist(EventType::MessageAssistant, serde_json::to_value(&payload)?)
    }
}

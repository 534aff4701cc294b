use chronicle_engine::{reconstruct, ContextConfig, ContextManager, TurnContentTracker};
use chronicle_store::{EventStore, SessionRecord};
use chronicle_types::{EventId, EventType, SessionEvent, ToolCallId};

use crate::error::{Error, Result};
use crate::linearizer::SessionLinearizer;
use crate::usage::TokenUsageTracker;

/// Options applied when opening a session into memory.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    pub tools: Vec<chronicle_engine::ToolDefinition>,
    pub rules_content: Option<String>,
    pub preserve_recent_turns: Option<usize>,
}

/// A session loaded into memory: the durable record plus every per-session
/// collaborator (projection, turn tracker, usage tracker).
///
/// Owned by exactly one worker; nothing here is shared across sessions.
#[derive(Debug)]
pub struct SessionRuntime {
    pub record: SessionRecord,
    pub context: ContextManager,
    pub turn_tracker: TurnContentTracker,
    pub usage: TokenUsageTracker,
    pub turn_count: u32,
    pub last_interrupted: Option<String>,
    pub pending_tool_ids: Vec<ToolCallId>,
}

impl SessionRuntime {
    /// Open a session: load the row, walk the chain, reconstruct state.
    /// The event log is not touched.
    pub fn open(store: &EventStore, id_or_prefix: &str, options: OpenOptions) -> Result<Self> {
        let record = store
            .get_session(id_or_prefix)?
            .ok_or_else(|| Error::NotFound(format!("session {id_or_prefix}")))?;

        let head = record
            .head_event_id
            .clone()
            .ok_or_else(|| Error::InvalidOperation(format!("session {} has no head", record.id)))?;

        let chain = store.get_ancestors(&head)?;
        let reconstruction = reconstruct(&chain)?;

        let model = reconstruction
            .latest_model
            .clone()
            .unwrap_or_else(|| record.model.clone());

        let mut context = ContextManager::new(ContextConfig {
            model: model.clone(),
            working_directory: record.working_directory.clone(),
            custom_system_prompt: reconstruction
                .system_prompt
                .clone()
                .or_else(|| record.system_prompt.clone()),
            tools: options.tools,
            rules_content: options.rules_content,
            preserve_recent_turns: options.preserve_recent_turns,
        });
        context.set_messages(reconstruction.messages);

        let usage = TokenUsageTracker::new(record.id.clone(), &model);

        Ok(Self {
            record,
            context,
            turn_tracker: TurnContentTracker::new(),
            usage,
            turn_count: reconstruction.turn_count,
            last_interrupted: reconstruction.last_interrupted,
            pending_tool_ids: reconstruction.pending_tool_ids,
        })
    }

    /// Fork this session at `at_event` into a new session, returning the
    /// opened runtime for the fork. The source chain is copied, never
    /// branched.
    pub fn fork(
        &self,
        store: &EventStore,
        at_event: &EventId,
        name: Option<&str>,
        reason: Option<&str>,
    ) -> Result<SessionRuntime> {
        let (forked, _) = store.fork_session(&self.record.id, at_event, name, reason)?;
        SessionRuntime::open(store, forked.id.as_str(), OpenOptions::default())
    }

    /// Synthesize cancellation `tool.result`s for calls left dangling by a
    /// cancelled run. Must complete before the next provider call, which
    /// cannot see a `tool_use` without a result.
    pub async fn resume_pending(&mut self, linearizer: &SessionLinearizer) -> Result<Vec<SessionEvent>> {
        let mut synthesized = Vec::with_capacity(self.pending_tool_ids.len());

        for tool_call_id in std::mem::take(&mut self.pending_tool_ids) {
            let payload = serde_json::json!({
                "toolCallId": tool_call_id.as_str(),
                "content": "Tool execution was cancelled before completion.",
                "isError": true,
            });
            let event = linearizer
                .append_and_wait(&self.record.id, EventType::ToolResult, payload)
                .await?;

            self.context.add_message(
                chronicle_types::Message::tool_result(
                    tool_call_id,
                    "Tool execution was cancelled before completion.",
                    true,
                )
                .with_event_id(event.id.clone()),
            );
            synthesized.push(event);
        }

        Ok(synthesized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_store::{AppendEvent, CreateSession};
    use serde_json::json;

    fn store_with_session() -> (EventStore, SessionRecord) {
        let store = EventStore::open_in_memory().unwrap();
        let (session, _) = store
            .create_session(&CreateSession {
                workspace_path: "/w".to_string(),
                working_directory: "/w".to_string(),
                model: "claude-haiku-4-5-20251001".to_string(),
                ..CreateSession::default()
            })
            .unwrap();
        (store, session)
    }

    #[test]
    fn open_rebuilds_projection_and_counters() {
        let (store, session) = store_with_session();

        store
            .append(&AppendEvent::new(
                session.id.clone(),
                EventType::MessageUser,
                json!({"content": "hello", "turn": 1}),
            ))
            .unwrap();
        store
            .append(&AppendEvent::new(
                session.id.clone(),
                EventType::MessageAssistant,
                json!({
                    "content": [{"type": "text", "text": "hi"}],
                    "turn": 1, "model": "claude-haiku-4-5-20251001", "stopReason": "end_turn",
                    "tokenUsage": {"inputTokens": 10, "outputTokens": 5}
                }),
            ))
            .unwrap();

        let runtime =
            SessionRuntime::open(&store, session.id.as_str(), OpenOptions::default()).unwrap();
        assert_eq!(runtime.context.messages().len(), 2);
        assert_eq!(runtime.turn_count, 1);
        assert!(runtime.pending_tool_ids.is_empty());
        assert_eq!(runtime.context.model(), "claude-haiku-4-5-20251001");
    }

    #[test]
    fn open_tracks_model_switches() {
        let (store, session) = store_with_session();
        store
            .append(&AppendEvent::new(
                session.id.clone(),
                EventType::ConfigModelSwitch,
                json!({
                    "previousModel": "claude-haiku-4-5-20251001",
                    "newModel": "claude-sonnet-4-5-20250929"
                }),
            ))
            .unwrap();

        let runtime =
            SessionRuntime::open(&store, session.id.as_str(), OpenOptions::default()).unwrap();
        assert_eq!(runtime.context.model(), "claude-sonnet-4-5-20250929");
    }

    #[test]
    fn open_missing_session_is_not_found() {
        let store = EventStore::open_in_memory().unwrap();
        let err =
            SessionRuntime::open(&store, "ses_missing", OpenOptions::default()).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn resume_synthesizes_cancellation_results() {
        let (store, session) = store_with_session();

        store
            .append(&AppendEvent::new(
                session.id.clone(),
                EventType::ToolCall,
                json!({"toolCallId": "toolu_dangling", "name": "Bash", "arguments": {}, "turn": 1}),
            ))
            .unwrap();

        let mut runtime =
            SessionRuntime::open(&store, session.id.as_str(), OpenOptions::default()).unwrap();
        assert_eq!(runtime.pending_tool_ids.len(), 1);

        let linearizer = SessionLinearizer::new(store.clone());
        let synthesized = runtime.resume_pending(&linearizer).await.unwrap();
        assert_eq!(synthesized.len(), 1);
        assert_eq!(synthesized[0].payload["toolCallId"], "toolu_dangling");
        assert_eq!(synthesized[0].payload["isError"], true);
        assert!(runtime.pending_tool_ids.is_empty());

        // Reopening now finds no pending calls.
        let reopened =
            SessionRuntime::open(&store, session.id.as_str(), OpenOptions::default()).unwrap();
        assert!(reopened.pending_tool_ids.is_empty());
    }

    #[test]
    fn fork_opens_an_independent_runtime() {
        let (store, session) = store_with_session();
        let user = store
            .append(&AppendEvent::new(
                session.id.clone(),
                EventType::MessageUser,
                json!({"content": "base", "turn": 1}),
            ))
            .unwrap();

        let runtime =
            SessionRuntime::open(&store, session.id.as_str(), OpenOptions::default()).unwrap();
        let fork = runtime.fork(&store, &user.id, Some("alt"), None).unwrap();

        assert_ne!(fork.record.id, runtime.record.id);
        assert_eq!(fork.context.messages().len(), 1);
        assert_eq!(fork.record.title.as_deref(), Some("alt"));
    }
}

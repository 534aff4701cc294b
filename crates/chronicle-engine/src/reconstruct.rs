use std::collections::{HashMap, HashSet};

use chronicle_types::{EventId, EventPayload, EventType, Message, SessionEvent, ToolCallId};

use crate::context::compaction::{COMPACTION_ACK, COMPACTION_SUMMARY_PREFIX};
use crate::error::{Error, Result};

// NOTE: Determinism
//
// Reconstruction is a pure fold over the event chain: identical chains
// always produce identical results, bit for bit, across calls and process
// restarts. Nothing here reads the clock, consults the store, or mutates
// the log.

/// In-memory session state rebuilt from an event chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    /// The message projection, with tombstoned events removed and each
    /// `compact.boundary` collapsing everything before it into the
    /// synthetic summary pair.
    pub messages: Vec<Message>,

    /// Model in effect at the head (initial model + any switches).
    pub latest_model: Option<String>,

    /// System prompt recorded at session start.
    pub system_prompt: Option<String>,

    /// Completed turns: assistant messages that did not stop for tools,
    /// excluding tombstoned ones.
    pub turn_count: u32,

    /// Partial assistant content from a trailing `agent.interrupted`, if
    /// the session stopped mid-stream.
    pub last_interrupted: Option<String>,

    /// `tool.call` IDs with no matching `tool.result` — resume logic must
    /// synthesize cancellation results for these before the next provider
    /// call.
    pub pending_tool_ids: Vec<ToolCallId>,
}

/// Rebuild session state from the chain returned by `get_ancestors`.
///
/// The chain must be a complete linear prefix: root first, sequences
/// dense, every parent pointer matching its predecessor. Violations
/// surface as `Reconstruction` errors naming the offending event.
pub fn reconstruct(chain: &[SessionEvent]) -> Result<Reconstruction> {
    validate_chain(chain)?;

    // Pass 1: deletion set. Tombstones may arrive after the event they
    // hide, so they are collected before messages are projected.
    let mut deleted: HashSet<EventId> = HashSet::new();
    for event in chain {
        if event.event_type == EventType::MessageDeleted
            && let Ok(EventPayload::MessageDeleted(payload)) = event.typed_payload()
        {
            deleted.insert(payload.target_event_id);
        }
    }

    let mut messages: Vec<Message> = Vec::new();
    let mut latest_model: Option<String> = None;
    let mut system_prompt: Option<String> = None;
    let mut turn_count: u32 = 0;
    let mut last_interrupted: Option<String> = None;
    let mut pending: HashMap<ToolCallId, ()> = HashMap::new();
    let mut pending_order: Vec<ToolCallId> = Vec::new();

    for event in chain {
        let payload = event.typed_payload().map_err(|e| Error::Reconstruction {
            event_id: event.id.to_string(),
            reason: e.to_string(),
        })?;

        match payload {
            EventPayload::SessionStart(p) => {
                latest_model = Some(p.model);
                system_prompt = p.system_prompt;
            }
            EventPayload::ConfigModelSwitch(p) => {
                latest_model = Some(p.new_model);
            }
            EventPayload::MessageUser(p) => {
                if !deleted.contains(&event.id) {
                    messages.push(Message {
                        role: chronicle_types::MessageRole::User,
                        content: p.content.to_blocks(),
                        event_id: Some(event.id.clone()),
                        tool_call_id: None,
                        is_error: false,
                    });
                    last_interrupted = None;
                }
            }
            EventPayload::MessageAssistant(p) => {
                if !deleted.contains(&event.id) {
                    if p.stop_reason.ends_turn() {
                        turn_count += 1;
                    }
                    messages.push(Message {
                        role: chronicle_types::MessageRole::Assistant,
                        content: p.content,
                        event_id: Some(event.id.clone()),
                        tool_call_id: None,
                        is_error: false,
                    });
                    last_interrupted = None;
                }
            }
            EventPayload::ToolCall(p) => {
                // Already represented by the assistant's tool_use block; no
                // message, but the call is pending until its result lands.
                if pending.insert(p.tool_call_id.clone(), ()).is_none() {
                    pending_order.push(p.tool_call_id);
                }
            }
            EventPayload::ToolResult(p) => {
                if pending.remove(&p.tool_call_id).is_none() {
                    return Err(Error::Reconstruction {
                        event_id: event.id.to_string(),
                        reason: format!(
                            "tool.result for {} has no prior tool.call on the chain",
                            p.tool_call_id
                        ),
                    });
                }
                pending_order.retain(|id| *id != p.tool_call_id);

                if !deleted.contains(&event.id) {
                    messages.push(
                        Message::tool_result(p.tool_call_id, p.content, p.is_error)
                            .with_event_id(event.id.clone()),
                    );
                }
            }
            EventPayload::CompactBoundary(p) => {
                messages.clear();
                messages.push(Message::user_text(format!(
                    "{COMPACTION_SUMMARY_PREFIX}{}",
                    p.summary
                )));
                messages.push(Message::assistant_text(COMPACTION_ACK));
            }
            EventPayload::AgentInterrupted(p) => {
                last_interrupted = Some(p.partial_content);
            }
            EventPayload::MessageDeleted(_) => {}
            // Lifecycle, streaming, subagent, hook, error, memory and rules
            // events do not contribute messages.
            EventPayload::SessionEnd(_)
            | EventPayload::SessionFork(_)
            | EventPayload::StreamTurnStart(_)
            | EventPayload::StreamTurnEnd(_)
            | EventPayload::SubagentSpawned(_)
            | EventPayload::SubagentCompleted(_)
            | EventPayload::SubagentFailed(_)
            | EventPayload::NotificationSubagentResult(_)
            | EventPayload::HookTriggered(_)
            | EventPayload::HookCompleted(_)
            | EventPayload::ErrorAgent(_)
            | EventPayload::MemoryLedger(_)
            | EventPayload::RulesLoaded(_) => {}
        }
    }

    Ok(Reconstruction {
        messages,
        latest_model,
        system_prompt,
        turn_count,
        last_interrupted,
        pending_tool_ids: pending_order,
    })
}

fn validate_chain(chain: &[SessionEvent]) -> Result<()> {
    let Some(root) = chain.first() else {
        return Ok(());
    };

    if root.event_type != EventType::SessionStart || root.parent_id.is_some() || root.sequence != 0
    {
        return Err(Error::Reconstruction {
            event_id: root.id.to_string(),
            reason: "chain root must be session.start with sequence 0 and no parent".to_string(),
        });
    }

    for pair in chain.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.sequence != prev.sequence + 1 {
            return Err(Error::Reconstruction {
                event_id: next.id.to_string(),
                reason: format!(
                    "sequence gap: {} follows {}",
                    next.sequence, prev.sequence
                ),
            });
        }
        if next.parent_id.as_ref() != Some(&prev.id) {
            return Err(Error::Reconstruction {
                event_id: next.id.to_string(),
                reason: "parent pointer does not match predecessor".to_string(),
            });
        }
        if next.session_id != prev.session_id {
            return Err(Error::Reconstruction {
                event_id: next.id.to_string(),
                reason: "chain crosses session boundaries".to_string(),
            });
        }
    }

    Ok(())
}

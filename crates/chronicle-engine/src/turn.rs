use serde_json::Value;

use chronicle_types::{
    AssistantMessagePayload, ContentBlock, StopReason, TokenUsage, ToolCallId,
};

/// Accumulates one turn's streamed assistant content until it can be
/// flushed as a durable `message.assistant` payload.
///
/// Deltas arrive in provider order; blocks are emitted in the order they
/// were opened (thinking before text before tool_use matches every current
/// provider, but the tracker preserves whatever order actually streamed).
#[derive(Debug, Default)]
pub struct TurnContentTracker {
    turn: u32,
    model: String,
    blocks: Vec<ContentBlock>,
}

impl TurnContentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a new turn. Any unflushed content is discarded — an
    /// interrupted turn persists its partial text via `partial_text`, not
    /// via flush.
    pub fn begin_turn(&mut self, turn: u32, model: &str) {
        self.turn = turn;
        self.model = model.to_string();
        self.blocks.clear();
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn on_text_delta(&mut self, delta: &str) {
        if let Some(ContentBlock::Text { text }) = self.blocks.last_mut() {
            text.push_str(delta);
        } else {
            self.blocks.push(ContentBlock::Text {
                text: delta.to_string(),
            });
        }
    }

    pub fn on_thinking_delta(&mut self, delta: &str) {
        if let Some(ContentBlock::Thinking { thinking }) = self.blocks.last_mut() {
            thinking.push_str(delta);
        } else {
            self.blocks.push(ContentBlock::Thinking {
                thinking: delta.to_string(),
            });
        }
    }

    pub fn on_tool_use(&mut self, id: ToolCallId, name: &str, arguments: Value) {
        self.blocks.push(ContentBlock::ToolUse {
            id,
            name: name.to_string(),
            arguments,
        });
    }

    /// Visible text accumulated so far; persisted on interruption.
    pub fn partial_text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool-use blocks opened this turn.
    pub fn tool_uses(&self) -> Vec<(ToolCallId, String, Value)> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse {
                    id,
                    name,
                    arguments,
                } => Some((id.clone(), name.clone(), arguments.clone())),
                _ => None,
            })
            .collect()
    }

    /// Drain into a durable assistant payload.
    pub fn flush(
        &mut self,
        stop_reason: StopReason,
        token_usage: TokenUsage,
        latency: Option<u64>,
    ) -> AssistantMessagePayload {
        let has_thinking = self
            .blocks
            .iter()
            .any(|b| matches!(b, ContentBlock::Thinking { .. }));

        AssistantMessagePayload {
            content: std::mem::take(&mut self.blocks),
            turn: self.turn,
            model: self.model.clone(),
            stop_reason,
            token_usage,
            latency,
            has_thinking: has_thinking.then_some(true),
        }
    }
}

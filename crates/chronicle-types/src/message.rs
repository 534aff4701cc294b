use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{EventId, ToolCallId};

/// A block of message content, in the shape providers exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Thinking { thinking: String },
    ToolUse {
        id: ToolCallId,
        name: String,
        arguments: Value,
    },
    Image { source: ImageSource },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// Visible text of this block, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Base64 image payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

impl ImageSource {
    pub fn base64(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            source_type: "base64".to_string(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }
}

/// Why the provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

impl StopReason {
    /// An assistant turn counts toward `turn_count` only when it did not
    /// stop to run tools.
    pub fn ends_turn(&self) -> bool {
        !matches!(self, StopReason::ToolUse)
    }
}

/// Role of a projected message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageRole {
    User,
    Assistant,
    ToolResult,
}

/// A message in the projection sent to the LLM.
///
/// `event_id` links back to the originating chain event when the message was
/// projected from one; synthetic messages (compaction summary pair) have
/// none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<ToolCallId>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: vec![ContentBlock::text(text)],
            event_id: None,
            tool_call_id: None,
            is_error: false,
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: vec![ContentBlock::text(text)],
            event_id: None,
            tool_call_id: None,
            is_error: false,
        }
    }

    pub fn tool_result(
        tool_call_id: ToolCallId,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self {
            role: MessageRole::ToolResult,
            content: vec![ContentBlock::text(content)],
            event_id: None,
            tool_call_id: Some(tool_call_id),
            is_error,
        }
    }

    pub fn with_event_id(mut self, event_id: EventId) -> Self {
        self.event_id = Some(event_id);
        self
    }

    /// Concatenated visible text across blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Total character count of the serialized content, the unit the
    /// estimation fallback divides by four.
    pub fn content_chars(&self) -> usize {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.len(),
                ContentBlock::Thinking { thinking } => thinking.len(),
                ContentBlock::ToolUse { arguments, .. } => {
                    serde_json::to_string(arguments).map(|s| s.len()).unwrap_or(0)
                }
                ContentBlock::Image { source } => source.data.len(),
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_block_serde_shape() {
        let block = ContentBlock::ToolUse {
            id: ToolCallId::from_raw("toolu_01"),
            name: "Read".to_string(),
            arguments: json!({"file_path": "/x.ts"}),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_use");
        assert_eq!(json["name"], "Read");
    }

    #[test]
    fn image_block_serde_shape() {
        let block = ContentBlock::Image {
            source: ImageSource::base64("image/png", "aGVsbG8="),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["source"]["type"], "base64");
        assert_eq!(json["source"]["media_type"], "image/png");
    }

    #[test]
    fn stop_reason_turn_accounting() {
        assert!(StopReason::EndTurn.ends_turn());
        assert!(StopReason::MaxTokens.ends_turn());
        assert!(!StopReason::ToolUse.ends_turn());
    }

    #[test]
    fn tool_result_message_shape() {
        let msg = Message::tool_result(ToolCallId::from_raw("toolu_02"), "output", true);
        assert_eq!(msg.role, MessageRole::ToolResult);
        assert!(msg.is_error);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "toolResult");
        assert_eq!(json["toolCallId"], "toolu_02");
    }

    #[test]
    fn message_text_concatenates_blocks() {
        let msg = Message {
            role: MessageRole::Assistant,
            content: vec![
                ContentBlock::text("one"),
                ContentBlock::Thinking { thinking: "hidden".to_string() },
                ContentBlock::text("two"),
            ],
            event_id: None,
            tool_call_id: None,
            is_error: false,
        };
        assert_eq!(msg.text(), "one\ntwo");
        assert_eq!(msg.content_chars(), "one".len() + "hidden".len() + "two".len());
    }
}

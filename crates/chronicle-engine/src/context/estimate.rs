use chronicle_types::Message;

use super::manager::ToolDefinition;

// Estimation fallback: 4 characters per token. Only consulted when the
// provider has not yet supplied an authoritative count for the turn.

pub fn estimate_text_tokens(text: &str) -> u64 {
    (text.len() as u64).div_ceil(4)
}

pub fn estimate_tool_tokens(tools: &[ToolDefinition]) -> u64 {
    tools
        .iter()
        .map(|tool| {
            serde_json::to_string(tool)
                .map(|json| (json.len() as u64).div_ceil(4))
                .unwrap_or(0)
        })
        .sum()
}

pub fn estimate_message_tokens(message: &Message) -> u64 {
    (message.content_chars() as u64).div_ceil(4)
}

pub fn estimate_messages_tokens(messages: &[Message]) -> u64 {
    messages.iter().map(estimate_message_tokens).sum()
}

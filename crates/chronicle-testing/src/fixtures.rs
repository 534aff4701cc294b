use serde_json::{json, Value};

/// `message.user` payload.
pub fn user_payload(text: &str, turn: u32) -> Value {
    json!({"content": text, "turn": turn})
}

/// `message.assistant` payload with a single text block.
pub fn assistant_text_payload(text: &str, turn: u32, model: &str, stop_reason: &str) -> Value {
    json!({
        "content": [{"type": "text", "text": text}],
        "turn": turn,
        "model": model,
        "stopReason": stop_reason,
        "tokenUsage": {"inputTokens": 100, "outputTokens": 20}
    })
}

/// `message.assistant` payload carrying tool_use blocks.
pub fn assistant_tool_use_payload(
    tool_uses: &[(&str, &str)],
    turn: u32,
    model: &str,
    stop_reason: &str,
) -> Value {
    let blocks: Vec<Value> = tool_uses
        .iter()
        .map(|(id, name)| json!({"type": "tool_use", "id": id, "name": name, "arguments": {}}))
        .collect();
    json!({
        "content": blocks,
        "turn": turn,
        "model": model,
        "stopReason": stop_reason,
        "tokenUsage": {"inputTokens": 100, "outputTokens": 20}
    })
}

/// `tool.call` payload.
pub fn tool_call_payload(tool_call_id: &str, name: &str, turn: u32) -> Value {
    json!({"toolCallId": tool_call_id, "name": name, "arguments": {}, "turn": turn})
}

/// `tool.result` payload.
pub fn tool_result_payload(tool_call_id: &str, content: &str) -> Value {
    json!({"toolCallId": tool_call_id, "content": content, "isError": false})
}

/// `config.model_switch` payload.
pub fn model_switch_payload(previous: &str, next: &str) -> Value {
    json!({"previousModel": previous, "newModel": next})
}

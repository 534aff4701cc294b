use chronicle_store::EventStore;
use chronicle_types::{format_truncation_notice, BlobId};

use crate::error::Result;

/// Tool results at or under this size embed directly in the event payload.
pub const MAX_TOOL_RESULT_SIZE: usize = 10_240;

/// Below this size a result is embedded without further consideration;
/// between this and `MAX_TOOL_RESULT_SIZE` it is still embedded, just
/// worth distinguishing for metrics.
pub const EMBED_DIRECT_SIZE: usize = 2_048;

/// A tool result after the offload policy was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct OffloadedResult {
    /// Content to persist in the `tool.result` payload: either the full
    /// result, or the first `MAX_TOOL_RESULT_SIZE` bytes plus the
    /// truncation notice pointing at the blob.
    pub persisted_content: String,
    pub truncated: bool,
    pub blob_id: Option<BlobId>,
    pub original_size: usize,
}

// NOTE: Deferred truncation
//
// The persisted copy is the compact form the LLM sees on reconstruction;
// streaming clients are handed the PRE-truncation content in the same
// breath (see the orchestrator's tool_end emission). Offload decides what
// the event row holds; it never touches what goes over the wire.

/// Apply the offload policy to one tool result.
pub fn offload_tool_result(
    store: &EventStore,
    content: &str,
    mime_type: Option<&str>,
) -> Result<OffloadedResult> {
    let size = content.len();
    if size <= MAX_TOOL_RESULT_SIZE {
        return Ok(OffloadedResult {
            persisted_content: content.to_string(),
            truncated: false,
            blob_id: None,
            original_size: size,
        });
    }

    let blob_id = store.blob_store(content.as_bytes(), mime_type)?;

    let mut cut = MAX_TOOL_RESULT_SIZE;
    while cut > 0 && !content.is_char_boundary(cut) {
        cut -= 1;
    }

    let mut persisted = content[..cut].to_string();
    persisted.push_str(&format_truncation_notice(size - cut, &blob_id));

    Ok(OffloadedResult {
        persisted_content: persisted,
        truncated: true,
        blob_id: Some(blob_id),
        original_size: size,
    })
}

use chronicle_types::TokenUsage;

use crate::error::{Error, Result};

/// Accumulates usage fields as they arrive over a provider stream.
///
/// Anthropic-like streams deliver input and cache counts with
/// `message_start` and the output count with `message_delta`; other
/// families deliver everything in one terminal chunk. Either way the
/// accumulator is fed what arrives and `finish()` decides whether enough
/// was seen. Counts are never fabricated: a stream that reported nothing
/// fails extraction.
#[derive(Debug, Clone, Default)]
pub struct UsageAccumulator {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    cache_read_tokens: Option<u64>,
    cache_creation_tokens: Option<u64>,
}

impl UsageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed counts from a `message_start` frame.
    pub fn on_message_start(
        &mut self,
        input_tokens: Option<u64>,
        cache_read_tokens: Option<u64>,
        cache_creation_tokens: Option<u64>,
    ) {
        if input_tokens.is_some() {
            self.input_tokens = input_tokens;
        }
        if cache_read_tokens.is_some() {
            self.cache_read_tokens = cache_read_tokens;
        }
        if cache_creation_tokens.is_some() {
            self.cache_creation_tokens = cache_creation_tokens;
        }
    }

    /// Feed the output count from a `message_delta` frame. Later frames
    /// supersede earlier ones (providers re-send the running total).
    pub fn on_message_delta(&mut self, output_tokens: Option<u64>) {
        if output_tokens.is_some() {
            self.output_tokens = output_tokens;
        }
    }

    /// Whether anything usable has been seen.
    pub fn has_any(&self) -> bool {
        self.input_tokens.is_some() || self.output_tokens.is_some()
    }

    /// Resolve into a raw usage record, or fail if the stream reported no
    /// counts at all.
    pub fn finish(self) -> Result<TokenUsage> {
        if !self.has_any() {
            return Err(Error::TokenExtraction(
                "stream carried neither input nor output token counts".to_string(),
            ));
        }

        Ok(TokenUsage {
            input_tokens: self.input_tokens.unwrap_or(0),
            output_tokens: self.output_tokens.unwrap_or(0),
            cache_read_tokens: self.cache_read_tokens,
            cache_creation_tokens: self.cache_creation_tokens,
        })
    }
}

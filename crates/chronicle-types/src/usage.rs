use serde::{Deserialize, Serialize};

/// Token usage as reported by a provider for one response, before
/// normalization. Field meanings differ per provider family; see the
/// normalizer in chronicle-providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_tokens: Option<u64>,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cache_read_tokens: None,
            cache_creation_tokens: None,
        }
    }

    pub fn cache_read(&self) -> u64 {
        self.cache_read_tokens.unwrap_or(0)
    }

    pub fn cache_creation(&self) -> u64 {
        self.cache_creation_tokens.unwrap_or(0)
    }
}

/// Provider-agnostic usage record, produced by the token normalizer.
///
/// `raw_*` fields preserve exactly what the provider reported so usage can
/// be re-derived later under a different policy; the remaining fields carry
/// the normalized semantics every consumer (UI, budget, billing) reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedUsage {
    pub raw_input_tokens: u64,
    pub raw_output_tokens: u64,
    pub raw_cache_read_tokens: u64,
    pub raw_cache_creation_tokens: u64,

    /// Tokens newly added to the context this turn (delta vs. baseline,
    /// floored at zero).
    pub new_input_tokens: u64,

    /// Total tokens occupying the context window after this response.
    pub context_window_tokens: u64,

    pub output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_accessors_default_to_zero() {
        let usage = TokenUsage::new(100, 20);
        assert_eq!(usage.cache_read(), 0);
        assert_eq!(usage.cache_creation(), 0);
    }

    #[test]
    fn usage_serde_is_camel_case() {
        let usage = TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
            cache_read_tokens: Some(3),
            cache_creation_tokens: None,
        };
        let json = serde_json::to_value(usage).unwrap();
        assert_eq!(json["inputTokens"], 10);
        assert_eq!(json["cacheReadTokens"], 3);
        assert!(json.get("cacheCreationTokens").is_none());
    }
}

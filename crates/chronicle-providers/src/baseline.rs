use chronicle_types::{NormalizedUsage, TokenUsage};

use crate::family::ProviderFamily;
use crate::normalize::normalize_usage;

// NOTE: Baseline lifetime
//
// The baseline deliberately survives agent-run boundaries: the first turn
// after a fresh user message should still show a meaningful per-turn delta
// instead of jumping to the full window size. The ONLY reset point is a
// provider-family switch, because `input_tokens` means different things on
// either side of the switch and a cross-family delta would be garbage.

/// Per-session context baseline used to compute per-turn deltas.
#[derive(Debug, Clone)]
pub struct ContextBaseline {
    family: ProviderFamily,
    previous_context_window_tokens: u64,
}

impl ContextBaseline {
    pub fn new(family: ProviderFamily) -> Self {
        Self {
            family,
            previous_context_window_tokens: 0,
        }
    }

    pub fn family(&self) -> ProviderFamily {
        self.family
    }

    pub fn previous_context_window_tokens(&self) -> u64 {
        self.previous_context_window_tokens
    }

    /// Fold one response's raw usage into the baseline, returning the
    /// normalized record. A family switch resets the baseline first, so the
    /// first post-switch delta equals the full window.
    pub fn observe(&mut self, family: ProviderFamily, raw: &TokenUsage) -> NormalizedUsage {
        if family != self.family {
            self.family = family;
            self.previous_context_window_tokens = 0;
        }

        let normalized = normalize_usage(family, raw, self.previous_context_window_tokens);
        self.previous_context_window_tokens = normalized.context_window_tokens;
        normalized
    }
}

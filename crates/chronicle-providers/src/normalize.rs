use chronicle_types::{NormalizedUsage, TokenUsage};

use crate::family::ProviderFamily;

// NOTE: Why normalization exists
//
// Providers disagree on what "input tokens" means:
// - Anthropic reports input_tokens EXCLUDING cache reads/creates; the
//   context window actually holds input + cache_read + cache_create.
// - OpenAI/Codex and Gemini report input_tokens INCLUDING cached tokens.
//
// Normalizing at this seam keeps UI, budget and billing logic
// provider-agnostic: everything downstream reads `context_window_tokens`
// and the per-turn `new_input_tokens` delta.

/// Total tokens occupying the context window for one response.
pub fn context_window_tokens(family: ProviderFamily, raw: &TokenUsage) -> u64 {
    match family {
        ProviderFamily::Anthropic => {
            raw.input_tokens + raw.cache_read() + raw.cache_creation()
        }
        ProviderFamily::OpenAi | ProviderFamily::Gemini => raw.input_tokens,
    }
}

/// Normalize one response's usage against the previous context-window
/// baseline (0 for the first turn or right after a provider switch).
pub fn normalize_usage(
    family: ProviderFamily,
    raw: &TokenUsage,
    previous_context_window_tokens: u64,
) -> NormalizedUsage {
    let context_window = context_window_tokens(family, raw);
    NormalizedUsage {
        raw_input_tokens: raw.input_tokens,
        raw_output_tokens: raw.output_tokens,
        raw_cache_read_tokens: raw.cache_read(),
        raw_cache_creation_tokens: raw.cache_creation(),
        new_input_tokens: context_window.saturating_sub(previous_context_window_tokens),
        context_window_tokens: context_window,
        output_tokens: raw.output_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anthropic_usage() -> TokenUsage {
        TokenUsage {
            input_tokens: 1_000,
            output_tokens: 200,
            cache_read_tokens: Some(8_000),
            cache_creation_tokens: Some(500),
        }
    }

    #[test]
    fn anthropic_window_includes_cache_tiers() {
        assert_eq!(
            context_window_tokens(ProviderFamily::Anthropic, &anthropic_usage()),
            9_500
        );
    }

    #[test]
    fn openai_window_is_raw_input() {
        let usage = TokenUsage {
            input_tokens: 12_000,
            output_tokens: 300,
            cache_read_tokens: Some(4_000),
            cache_creation_tokens: None,
        };
        assert_eq!(context_window_tokens(ProviderFamily::OpenAi, &usage), 12_000);
        assert_eq!(context_window_tokens(ProviderFamily::Gemini, &usage), 12_000);
    }

    #[test]
    fn delta_is_floored_at_zero() {
        let normalized = normalize_usage(ProviderFamily::Anthropic, &anthropic_usage(), 10_000);
        assert_eq!(normalized.new_input_tokens, 0);
        assert_eq!(normalized.context_window_tokens, 9_500);
    }

    #[test]
    fn delta_against_baseline() {
        let normalized = normalize_usage(ProviderFamily::Anthropic, &anthropic_usage(), 9_000);
        assert_eq!(normalized.new_input_tokens, 500);
        assert_eq!(normalized.raw_input_tokens, 1_000);
        assert_eq!(normalized.raw_cache_read_tokens, 8_000);
        assert_eq!(normalized.output_tokens, 200);
    }

    #[test]
    fn zero_baseline_reports_full_window() {
        let normalized = normalize_usage(ProviderFamily::Anthropic, &anthropic_usage(), 0);
        assert_eq!(normalized.new_input_tokens, 9_500);
    }
}

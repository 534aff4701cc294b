use std::collections::HashMap;

use crate::family::ProviderFamily;

/// Context-window specification for a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSpec {
    pub context_limit: u64,
    pub family: ProviderFamily,
}

fn anthropic_models() -> HashMap<&'static str, u64> {
    HashMap::from([
        ("claude-opus-4", 200_000),
        ("claude-sonnet-4", 200_000),
        ("claude-haiku-4", 200_000),
        ("claude-3-7-sonnet", 200_000),
        ("claude-3-5-sonnet", 200_000),
        ("claude-3-5-haiku", 200_000),
        ("claude-3", 200_000),
    ])
}

fn openai_models() -> HashMap<&'static str, u64> {
    HashMap::from([
        ("gpt-5.1-codex", 400_000),
        ("gpt-5-codex", 400_000),
        ("gpt-5", 400_000),
        ("gpt-4o-mini", 128_000),
        ("gpt-4o", 128_000),
        ("o1", 200_000),
        ("o3", 200_000),
    ])
}

fn gemini_models() -> HashMap<&'static str, u64> {
    HashMap::from([
        ("gemini-2.5-pro", 1_048_576),
        ("gemini-2.5-flash", 1_048_576),
        ("gemini-2.0-flash", 1_048_576),
        ("gemini-1.5-pro", 2_097_152),
        ("gemini-1.5-flash", 1_048_576),
    ])
}

/// Fallback for models no table knows. Matches the most common current
/// window (Sonnet-class) rather than failing, so budget checks keep
/// working with a conservative limit.
pub const DEFAULT_CONTEXT_LIMIT: u64 = 200_000;

/// Resolve a model's context window by longest prefix matching.
///
/// Providers release dated minor versions constantly
/// (`claude-sonnet-4-5-20250929`); exact matching would break on every
/// release while minor versions almost never change context limits.
/// Preferring the longest matching prefix keeps more specific entries
/// (e.g. `gpt-4o-mini`) from being shadowed by shorter ones (`gpt-4o`).
pub fn resolve_model_limit(model: &str) -> Option<ModelSpec> {
    let tables: [(ProviderFamily, HashMap<&str, u64>); 3] = [
        (ProviderFamily::Anthropic, anthropic_models()),
        (ProviderFamily::OpenAi, openai_models()),
        (ProviderFamily::Gemini, gemini_models()),
    ];

    let mut best: Option<(usize, u64, ProviderFamily)> = None;
    for (table_family, table) in &tables {
        for (prefix, limit) in table {
            if model.starts_with(prefix)
                && best.map(|(len, _, _)| prefix.len() > len).unwrap_or(true)
            {
                best = Some((prefix.len(), *limit, *table_family));
            }
        }
    }

    best.map(|(_, context_limit, family)| ModelSpec {
        context_limit,
        family,
    })
}

/// Context limit with the default fallback applied.
pub fn context_limit_or_default(model: &str) -> u64 {
    resolve_model_limit(model)
        .map(|spec| spec.context_limit)
        .unwrap_or(DEFAULT_CONTEXT_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_match_on_dated_versions() {
        assert_eq!(
            resolve_model_limit("claude-sonnet-4-5-20250929").unwrap().context_limit,
            200_000
        );
        assert_eq!(
            resolve_model_limit("claude-haiku-4-5-20251001").unwrap().context_limit,
            200_000
        );
        assert_eq!(
            resolve_model_limit("gemini-2.5-flash-exp").unwrap().context_limit,
            1_048_576
        );
    }

    #[test]
    fn longest_prefix_wins() {
        // gpt-4o-mini must not resolve through the shorter gpt-4o entry.
        assert_eq!(
            resolve_model_limit("gpt-4o-mini-2024-07-18").unwrap().context_limit,
            128_000
        );
        assert_eq!(
            resolve_model_limit("gpt-5.1-codex-max").unwrap().context_limit,
            400_000
        );
    }

    #[test]
    fn unknown_model_returns_none() {
        assert!(resolve_model_limit("mystery-model").is_none());
        assert_eq!(context_limit_or_default("mystery-model"), DEFAULT_CONTEXT_LIMIT);
    }

    #[test]
    fn spec_carries_family() {
        assert_eq!(
            resolve_model_limit("gemini-2.5-pro").unwrap().family,
            ProviderFamily::Gemini
        );
        assert_eq!(
            resolve_model_limit("gpt-4o").unwrap().family,
            ProviderFamily::OpenAi
        );
    }
}

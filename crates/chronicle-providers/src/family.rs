use serde::{Deserialize, Serialize};

/// Provider family, the unit at which token-reporting semantics differ.
///
/// The family is derived from the model identifier, not configured: a model
/// switch implies a family check, and crossing families resets the context
/// baseline (see `baseline.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    /// Anthropic-like: `input_tokens` excludes cache reads/writes, so the
    /// context window is `input + cache_read + cache_create`.
    Anthropic,
    /// OpenAI / Codex: `input_tokens` already includes cached tokens.
    OpenAi,
    /// Gemini: same accounting as OpenAI for context-window purposes.
    Gemini,
}

impl ProviderFamily {
    /// Detect the family from a model identifier. Unknown identifiers fall
    /// back to Anthropic semantics, which over- rather than under-counts
    /// the context window.
    pub fn from_model(model: &str) -> Self {
        let lower = model.to_ascii_lowercase();
        if lower.starts_with("gemini") {
            ProviderFamily::Gemini
        } else if lower.starts_with("gpt")
            || lower.starts_with("o1")
            || lower.starts_with("o3")
            || lower.contains("codex")
        {
            ProviderFamily::OpenAi
        } else {
            ProviderFamily::Anthropic
        }
    }

    /// Whether the provider allows the runtime to set a system prompt. For
    /// families that do not, tool-clarification text is prepended to the
    /// first user message of the turn instead.
    pub fn supports_system_prompt(&self) -> bool {
        !matches!(self, ProviderFamily::OpenAi)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderFamily::Anthropic => "anthropic",
            ProviderFamily::OpenAi => "openai",
            ProviderFamily::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_families_from_model_ids() {
        assert_eq!(
            ProviderFamily::from_model("claude-sonnet-4-5-20250929"),
            ProviderFamily::Anthropic
        );
        assert_eq!(
            ProviderFamily::from_model("claude-haiku-4-5-20251001"),
            ProviderFamily::Anthropic
        );
        assert_eq!(ProviderFamily::from_model("gpt-4o"), ProviderFamily::OpenAi);
        assert_eq!(
            ProviderFamily::from_model("gpt-5.1-codex-max"),
            ProviderFamily::OpenAi
        );
        assert_eq!(
            ProviderFamily::from_model("gemini-2.5-pro"),
            ProviderFamily::Gemini
        );
    }

    #[test]
    fn unknown_models_default_to_anthropic() {
        assert_eq!(
            ProviderFamily::from_model("mystery-model"),
            ProviderFamily::Anthropic
        );
    }

    #[test]
    fn system_prompt_support() {
        assert!(ProviderFamily::Anthropic.supports_system_prompt());
        assert!(ProviderFamily::Gemini.supports_system_prompt());
        assert!(!ProviderFamily::OpenAi.supports_system_prompt());
    }
}

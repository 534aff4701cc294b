use serde::{Deserialize, Serialize};
use serde_json::Value;

use chronicle_providers::{context_limit_or_default, ProviderFamily};
use chronicle_types::Message;

use super::estimate;

// NOTE: Projection, not truth
//
// The manager's `messages` is a projection of the durable chain (minus
// tombstones, plus at most one compaction-summary prefix). The chain is
// the truth; everything here can be rebuilt from it at any time. Budget
// numbers prefer the API-reported context size when one has arrived this
// session; component estimates are the fallback, never the authority.

/// A tool definition as sent to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Context usage severity against the model's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdLevel {
    Normal,
    Warning,
    Alert,
    Critical,
    Exceeded,
}

impl ThresholdLevel {
    pub fn from_usage(usage_percent: f64) -> Self {
        if usage_percent >= 0.95 {
            ThresholdLevel::Exceeded
        } else if usage_percent >= 0.85 {
            ThresholdLevel::Critical
        } else if usage_percent >= 0.70 {
            ThresholdLevel::Alert
        } else if usage_percent >= 0.50 {
            ThresholdLevel::Warning
        } else {
            ThresholdLevel::Normal
        }
    }
}

/// Per-component token estimates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBreakdown {
    pub system_prompt: u64,
    pub tools: u64,
    pub rules: u64,
    pub messages: u64,
}

/// Point-in-time view of the context budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    pub current_tokens: u64,
    pub context_limit: u64,
    pub usage_percent: f64,
    pub threshold_level: ThresholdLevel,
    pub breakdown: TokenBreakdown,
}

/// Result of a pre-turn budget check.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnCheck {
    pub can_proceed: bool,
    pub needs_compaction: bool,
    pub would_exceed_limit: bool,
    pub threshold_level: ThresholdLevel,
    pub current_tokens: u64,
    pub context_limit: u64,
}

/// A tool result after the dynamic context cap was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedToolResult {
    pub content: String,
    pub truncated: bool,
    pub original_size: Option<usize>,
}

/// Configuration for a new context manager.
#[derive(Debug, Clone, Default)]
pub struct ContextConfig {
    pub model: String,
    pub working_directory: String,
    pub custom_system_prompt: Option<String>,
    pub tools: Vec<ToolDefinition>,
    pub rules_content: Option<String>,
    /// Turns preserved verbatim through compaction (default 5).
    pub preserve_recent_turns: Option<usize>,
}

pub(crate) const DEFAULT_PRESERVE_RECENT_TURNS: usize = 5;

/// Maintains the in-memory message list for the next provider call and
/// enforces the model's context window.
pub struct ContextManager {
    model: String,
    provider_family: ProviderFamily,
    context_limit: u64,
    custom_system_prompt: Option<String>,
    working_directory: String,
    tools: Vec<ToolDefinition>,
    rules_content: Option<String>,
    messages: Vec<Message>,
    pub(crate) preserve_recent_turns: usize,

    system_prompt_tokens: Option<u64>,
    tools_tokens: Option<u64>,
    rules_tokens: Option<u64>,

    last_api_context_tokens: Option<u64>,
    on_over_threshold: Option<Box<dyn FnMut(ContextSnapshot) + Send>>,
}

impl std::fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextManager")
            .field("model", &self.model)
            .field("provider_family", &self.provider_family)
            .field("context_limit", &self.context_limit)
            .field("custom_system_prompt", &self.custom_system_prompt)
            .field("working_directory", &self.working_directory)
            .field("tools", &self.tools)
            .field("rules_content", &self.rules_content)
            .field("messages", &self.messages)
            .field("preserve_recent_turns", &self.preserve_recent_turns)
            .field("system_prompt_tokens", &self.system_prompt_tokens)
            .field("tools_tokens", &self.tools_tokens)
            .field("rules_tokens", &self.rules_tokens)
            .field("last_api_context_tokens", &self.last_api_context_tokens)
            .field("on_over_threshold", &self.on_over_threshold.is_some())
            .finish()
    }
}

impl ContextManager {
    pub fn new(config: ContextConfig) -> Self {
        let provider_family = ProviderFamily::from_model(&config.model);
        let context_limit = context_limit_or_default(&config.model);

        Self {
            model: config.model,
            provider_family,
            context_limit,
            custom_system_prompt: config.custom_system_prompt,
            working_directory: config.working_directory,
            tools: config.tools,
            rules_content: config.rules_content,
            messages: Vec::new(),
            preserve_recent_turns: config
                .preserve_recent_turns
                .unwrap_or(DEFAULT_PRESERVE_RECENT_TURNS),
            system_prompt_tokens: None,
            tools_tokens: None,
            rules_tokens: None,
            last_api_context_tokens: None,
            on_over_threshold: None,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_family(&self) -> ProviderFamily {
        self.provider_family
    }

    pub fn context_limit(&self) -> u64 {
        self.context_limit
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn working_directory(&self) -> &str {
        &self.working_directory
    }

    /// Callback fired when a model switch lands the context over the
    /// compaction threshold.
    pub fn set_over_threshold_callback(
        &mut self,
        callback: impl FnMut(ContextSnapshot) + Send + 'static,
    ) {
        self.on_over_threshold = Some(Box::new(callback));
    }

    // ── Projection updates ──────────────────────────────────────────────

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Replace the projection wholesale. The API-reported context count no
    /// longer describes these messages, so budget queries fall back to
    /// component sums until the next provider response.
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.last_api_context_tokens = None;
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.last_api_context_tokens = None;
    }

    // ── System prompt ───────────────────────────────────────────────────

    /// The provider-facing system prompt. Families that forbid system
    /// prompts get an empty string; their clarification text travels on the
    /// first user message instead (`tool_clarification_text`).
    pub fn get_system_prompt(&self) -> String {
        if !self.provider_family.supports_system_prompt() {
            return String::new();
        }
        self.build_system_prompt()
    }

    /// Text prepended to the first user message of a turn for providers
    /// whose system prompt cannot be modified.
    pub fn tool_clarification_text(&self) -> Option<String> {
        if self.provider_family.supports_system_prompt() {
            return None;
        }
        Some(self.build_system_prompt())
    }

    fn build_system_prompt(&self) -> String {
        let mut prompt = match &self.custom_system_prompt {
            Some(custom) => custom.clone(),
            None => format!(
                "You are an AI coding agent. Working directory: {}",
                self.working_directory
            ),
        };
        if let Some(rules) = &self.rules_content {
            prompt.push_str("\n\n# Project rules\n\n");
            prompt.push_str(rules);
        }
        prompt
    }

    // ── Budget ──────────────────────────────────────────────────────────

    /// Record the provider-reported context size; authoritative for budget
    /// queries until the projection is replaced.
    pub fn set_api_context_tokens(&mut self, tokens: u64) {
        self.last_api_context_tokens = Some(tokens);
    }

    fn breakdown(&mut self) -> TokenBreakdown {
        if self.system_prompt_tokens.is_none() {
            self.system_prompt_tokens =
                Some(estimate::estimate_text_tokens(&self.build_system_prompt()));
        }
        if self.tools_tokens.is_none() {
            self.tools_tokens = Some(estimate::estimate_tool_tokens(&self.tools));
        }
        if self.rules_tokens.is_none() {
            self.rules_tokens = Some(
                self.rules_content
                    .as_deref()
                    .map(estimate::estimate_text_tokens)
                    .unwrap_or(0),
            );
        }

        TokenBreakdown {
            system_prompt: self.system_prompt_tokens.unwrap_or_default(),
            tools: self.tools_tokens.unwrap_or_default(),
            rules: self.rules_tokens.unwrap_or_default(),
            messages: estimate::estimate_messages_tokens(&self.messages),
        }
    }

    pub(crate) fn current_tokens(&mut self) -> u64 {
        match self.last_api_context_tokens {
            Some(tokens) => tokens,
            None => {
                let b = self.breakdown();
                b.system_prompt + b.tools + b.rules + b.messages
            }
        }
    }

    pub fn snapshot(&mut self) -> ContextSnapshot {
        let breakdown = self.breakdown();
        let current_tokens = self
            .last_api_context_tokens
            .unwrap_or(breakdown.system_prompt + breakdown.tools + breakdown.rules + breakdown.messages);
        let usage_percent = current_tokens as f64 / self.context_limit as f64;

        ContextSnapshot {
            current_tokens,
            context_limit: self.context_limit,
            usage_percent,
            threshold_level: ThresholdLevel::from_usage(usage_percent),
            breakdown,
        }
    }

    pub fn can_accept_turn(&mut self, estimated_response_tokens: u64) -> TurnCheck {
        let snapshot = self.snapshot();
        let level = snapshot.threshold_level;

        TurnCheck {
            can_proceed: level < ThresholdLevel::Critical,
            needs_compaction: level >= ThresholdLevel::Alert,
            would_exceed_limit: snapshot.current_tokens + estimated_response_tokens
                > snapshot.context_limit,
            threshold_level: level,
            current_tokens: snapshot.current_tokens,
            context_limit: snapshot.context_limit,
        }
    }

    pub fn should_compact(&mut self) -> bool {
        self.snapshot().usage_percent >= 0.70
    }

    /// Apply the dynamic size cap to a tool result before it enters the
    /// projection. The cap shrinks as the window fills:
    /// `min(4 * max(limit - current - 8000 - 10% of remaining, 2500), 100_000)`.
    pub fn process_tool_result(&mut self, content: &str) -> ProcessedToolResult {
        let limit = self.context_limit as i64;
        let current = self.current_tokens() as i64;
        let remaining = (limit - current).max(0);
        let headroom = (limit - current - 8_000 - remaining / 10).max(2_500);
        let max_bytes = ((headroom as u64) * 4).min(100_000) as usize;

        if content.len() <= max_bytes {
            return ProcessedToolResult {
                content: content.to_string(),
                truncated: false,
                original_size: None,
            };
        }

        let mut cut = max_bytes;
        while cut > 0 && !content.is_char_boundary(cut) {
            cut -= 1;
        }

        ProcessedToolResult {
            content: content[..cut].to_string(),
            truncated: true,
            original_size: Some(content.len()),
        }
    }

    // ── Model switching ─────────────────────────────────────────────────

    /// Switch the active model: provider family and context limit follow,
    /// component caches are invalidated, and the over-threshold callback
    /// fires if the smaller window is already past the compaction mark.
    pub fn switch_model(&mut self, new_model: &str) {
        self.model = new_model.to_string();
        self.provider_family = ProviderFamily::from_model(new_model);
        self.context_limit = context_limit_or_default(new_model);
        self.invalidate_estimates();

        if self.should_compact() {
            let snapshot = self.snapshot();
            if let Some(callback) = &mut self.on_over_threshold {
                callback(snapshot);
            }
        }
    }

    pub fn set_rules_content(&mut self, rules: Option<String>) {
        self.rules_content = rules;
        self.rules_tokens = None;
        self.system_prompt_tokens = None;
    }

    pub fn set_tools(&mut self, tools: Vec<ToolDefinition>) {
        self.tools = tools;
        self.tools_tokens = None;
    }

    pub fn set_working_directory(&mut self, working_directory: String) {
        self.working_directory = working_directory;
        self.system_prompt_tokens = None;
    }

    fn invalidate_estimates(&mut self) {
        self.system_prompt_tokens = None;
        self.tools_tokens = None;
        self.rules_tokens = None;
    }
}

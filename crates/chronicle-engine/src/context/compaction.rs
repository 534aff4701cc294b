use serde_json::Value;

use chronicle_types::{CompactBoundaryPayload, CompactRange, Message};

use crate::error::{Error, Result};

use super::estimate;
use super::manager::ContextManager;

/// Prefix of the synthetic user message carrying the summary.
pub const COMPACTION_SUMMARY_PREFIX: &str = "[Context from earlier in this conversation]\n\n";

/// Synthetic assistant acknowledgment following the summary.
pub const COMPACTION_ACK: &str =
    "I understand the previous context. Continuing from where we left off.";

/// Tokens budgeted for each synthetic wrapper message beyond the summary
/// text itself.
const WRAPPER_TOKENS: u64 = 50;

/// Output of the injected summarizer capability.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub narrative: String,
    pub extracted_data: Option<Value>,
}

/// Injected summarization capability. Implementations may call any
/// provider; the engine only requires a synchronous-return contract and is
/// agnostic to tokenization. A summarizer may reject a job (e.g. empty
/// input) by returning an error, in which case the projection is left
/// unchanged.
pub trait Summarizer {
    fn summarize(&self, messages: &[Message]) -> std::result::Result<Summary, String>;
}

/// What a compaction would do, without doing it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactionPreview {
    pub tokens_before: u64,
    pub tokens_after: u64,
    pub compression_ratio: f64,
    pub preserved_turns: usize,
    pub summarized_turns: usize,
    pub summary: String,
    pub extracted_data: Option<Value>,
}

/// Result of an executed compaction.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactionOutcome {
    pub tokens_before: u64,
    pub tokens_after: u64,
    pub compression_ratio: f64,
    /// Payload for the durable `compact.boundary` marker; `None` when the
    /// compaction short-circuited as a no-op.
    pub boundary: Option<CompactBoundaryPayload>,
}

impl ContextManager {
    fn split_point(&self) -> usize {
        let preserve_count = self.preserve_recent_turns * 2;
        self.messages().len().saturating_sub(preserve_count)
    }

    /// Preview a compaction: summarize the prefix and estimate the
    /// post-compaction budget without touching the projection.
    pub fn preview_compaction(&mut self, summarizer: &dyn Summarizer) -> Result<CompactionPreview> {
        let tokens_before = self.current_tokens();
        let split = self.split_point();

        if split == 0 {
            return Ok(CompactionPreview {
                tokens_before,
                tokens_after: tokens_before,
                compression_ratio: 1.0,
                preserved_turns: self.messages().len() / 2,
                summarized_turns: 0,
                summary: String::new(),
                extracted_data: None,
            });
        }

        let summary = summarizer
            .summarize(&self.messages()[..split])
            .map_err(Error::Summarizer)?;
        let tokens_after = self.estimate_after(&summary.narrative, split);

        Ok(CompactionPreview {
            tokens_before,
            tokens_after,
            compression_ratio: ratio(tokens_after, tokens_before),
            preserved_turns: (self.messages().len() - split) / 2,
            summarized_turns: split / 2,
            summary: summary.narrative,
            extracted_data: summary.extracted_data,
        })
    }

    /// Execute a compaction: summarize the prefix, persist the boundary via
    /// `persist`, then swap in the new projection. If the summarizer or
    /// `persist` fails, the projection is unchanged and no boundary exists.
    pub fn execute_compaction(
        &mut self,
        summarizer: &dyn Summarizer,
        edited_summary: Option<String>,
        persist: impl FnOnce(&CompactBoundaryPayload) -> std::result::Result<(), String>,
    ) -> Result<CompactionOutcome> {
        let tokens_before = self.current_tokens();
        let split = self.split_point();

        if split == 0 {
            return Ok(CompactionOutcome {
                tokens_before,
                tokens_after: tokens_before,
                compression_ratio: 1.0,
                boundary: None,
            });
        }

        let narrative = match edited_summary {
            Some(edited) => edited,
            None => {
                summarizer
                    .summarize(&self.messages()[..split])
                    .map_err(Error::Summarizer)?
                    .narrative
            }
        };

        let tokens_after = self.estimate_after(&narrative, split);
        let boundary = CompactBoundaryPayload {
            range: CompactRange {
                from: 0,
                to: split as u32 - 1,
            },
            original_tokens: tokens_before,
            compacted_tokens: tokens_after,
            summary: narrative.clone(),
        };

        persist(&boundary).map_err(Error::Compaction)?;

        tracing::info!(
            tokens_before,
            tokens_after,
            summarized = split,
            "compacted context projection"
        );

        let mut next = Vec::with_capacity(self.messages().len() - split + 2);
        next.push(Message::user_text(format!(
            "{COMPACTION_SUMMARY_PREFIX}{narrative}"
        )));
        next.push(Message::assistant_text(COMPACTION_ACK));
        next.extend_from_slice(&self.messages()[split..]);
        self.set_messages(next);

        Ok(CompactionOutcome {
            tokens_before,
            tokens_after,
            compression_ratio: ratio(tokens_after, tokens_before),
            boundary: Some(boundary),
        })
    }

    /// Post-compaction estimate: fixed components + summary + wrapper
    /// constants + the preserved tail.
    fn estimate_after(&mut self, narrative: &str, split: usize) -> u64 {
        let snapshot = self.snapshot();
        let preserved: u64 = self.messages()[split..]
            .iter()
            .map(estimate::estimate_message_tokens)
            .sum();
        snapshot.breakdown.system_prompt
            + snapshot.breakdown.tools
            + estimate::estimate_text_tokens(narrative)
            + WRAPPER_TOKENS
            + WRAPPER_TOKENS
            + preserved
    }
}

fn ratio(after: u64, before: u64) -> f64 {
    if before == 0 {
        1.0
    } else {
        after as f64 / before as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::manager::ContextConfig;
    use chronicle_types::MessageRole;

    struct FixedSummarizer(&'static str);

    impl Summarizer for FixedSummarizer {
        fn summarize(&self, messages: &[Message]) -> std::result::Result<Summary, String> {
            if messages.is_empty() {
                return Err("nothing to summarize".to_string());
            }
            Ok(Summary {
                narrative: self.0.to_string(),
                extracted_data: None,
            })
        }
    }

    struct RejectingSummarizer;

    impl Summarizer for RejectingSummarizer {
        fn summarize(&self, _: &[Message]) -> std::result::Result<Summary, String> {
            Err("provider unavailable".to_string())
        }
    }

    fn manager_with_messages(count: usize) -> ContextManager {
        let mut manager = ContextManager::new(ContextConfig {
            model: "claude-sonnet-4-5-20250929".to_string(),
            working_directory: "/w".to_string(),
            preserve_recent_turns: Some(5),
            ..ContextConfig::default()
        });
        for i in 0..count {
            if i % 2 == 0 {
                manager.add_message(Message::user_text(format!("question {i}")));
            } else {
                manager.add_message(Message::assistant_text(format!("answer {i}")));
            }
        }
        manager
    }

    #[test]
    fn preview_reports_split() {
        let mut manager = manager_with_messages(50);
        let preview = manager
            .preview_compaction(&FixedSummarizer("summary text"))
            .unwrap();
        assert_eq!(preview.preserved_turns, 5);
        assert_eq!(preview.summarized_turns, 20);
        assert_eq!(preview.summary, "summary text");
        assert!(preview.tokens_after > 0);
    }

    #[test]
    fn short_projection_is_a_noop() {
        let mut manager = manager_with_messages(8);
        let preview = manager
            .preview_compaction(&FixedSummarizer("unused"))
            .unwrap();
        assert_eq!(preview.compression_ratio, 1.0);
        assert_eq!(preview.summarized_turns, 0);

        let outcome = manager
            .execute_compaction(&FixedSummarizer("unused"), None, |_| Ok(()))
            .unwrap();
        assert!(outcome.boundary.is_none());
        assert_eq!(manager.messages().len(), 8);
    }

    #[test]
    fn execute_replaces_prefix_with_synthetic_pair() {
        let mut manager = manager_with_messages(50);
        let preserved_tail: Vec<_> = manager.messages()[40..].to_vec();

        let outcome = manager
            .execute_compaction(&FixedSummarizer("what happened before"), None, |_| Ok(()))
            .unwrap();

        let boundary = outcome.boundary.unwrap();
        assert_eq!(boundary.range.from, 0);
        assert_eq!(boundary.range.to, 39);
        assert_eq!(boundary.summary, "what happened before");

        assert_eq!(manager.messages().len(), 12);
        assert_eq!(manager.messages()[0].role, MessageRole::User);
        assert!(manager.messages()[0]
            .text()
            .starts_with(COMPACTION_SUMMARY_PREFIX));
        assert_eq!(manager.messages()[1].text(), COMPACTION_ACK);
        assert_eq!(&manager.messages()[2..], &preserved_tail[..]);
    }

    #[test]
    fn preview_and_execute_agree_on_tokens_after() {
        let mut manager = manager_with_messages(50);
        let preview = manager.preview_compaction(&FixedSummarizer("stable")).unwrap();
        let outcome = manager
            .execute_compaction(&FixedSummarizer("stable"), None, |_| Ok(()))
            .unwrap();
        assert_eq!(preview.tokens_after, outcome.tokens_after);
    }

    #[test]
    fn preserve_zero_summarizes_everything() {
        let mut manager = ContextManager::new(ContextConfig {
            model: "claude-sonnet-4-5-20250929".to_string(),
            working_directory: "/w".to_string(),
            preserve_recent_turns: Some(0),
            ..ContextConfig::default()
        });
        for i in 0..6 {
            manager.add_message(Message::user_text(format!("m{i}")));
        }

        let outcome = manager
            .execute_compaction(&FixedSummarizer("all of it"), None, |_| Ok(()))
            .unwrap();
        assert_eq!(outcome.boundary.unwrap().range.to, 5);
        assert_eq!(manager.messages().len(), 2);
    }

    #[test]
    fn summarizer_rejection_leaves_projection_unchanged() {
        let mut manager = manager_with_messages(50);
        let before = manager.messages().to_vec();

        let err = manager
            .execute_compaction(&RejectingSummarizer, None, |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, Error::Summarizer(_)));
        assert_eq!(manager.messages(), &before[..]);
    }

    #[test]
    fn persist_failure_leaves_projection_unchanged() {
        let mut manager = manager_with_messages(50);
        let before = manager.messages().to_vec();

        let err = manager
            .execute_compaction(&FixedSummarizer("s"), None, |_| {
                Err("storage offline".to_string())
            })
            .unwrap_err();
        assert!(matches!(err, Error::Compaction(_)));
        assert_eq!(manager.messages(), &before[..]);
    }

    #[test]
    fn edited_summary_overrides_summarizer() {
        let mut manager = manager_with_messages(30);
        let outcome = manager
            .execute_compaction(
                &FixedSummarizer("machine written"),
                Some("human edited".to_string()),
                |_| Ok(()),
            )
            .unwrap();
        assert_eq!(outcome.boundary.unwrap().summary, "human edited");
        assert!(manager.messages()[0].text().contains("human edited"));
    }
}

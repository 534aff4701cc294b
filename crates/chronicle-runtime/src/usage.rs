use chronicle_providers::{cost_for_model, ContextBaseline, ProviderFamily};
use chronicle_store::EventStore;
use chronicle_types::{NormalizedUsage, SessionId, TokenUsage};

use crate::error::Result;

/// One turn's normalized usage with its computed cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnUsage {
    pub normalized: NormalizedUsage,
    pub cost: f64,
}

/// Per-session usage tracker: owns the context baseline, normalizes each
/// response, prices it and folds the cost into the session row.
///
/// Cumulative token totals are maintained by the store when the
/// `message.assistant` event is appended; only cost needs an explicit
/// update because pricing lives outside the store.
#[derive(Debug)]
pub struct TokenUsageTracker {
    session_id: SessionId,
    baseline: ContextBaseline,
}

impl TokenUsageTracker {
    pub fn new(session_id: SessionId, model: &str) -> Self {
        Self {
            session_id,
            baseline: ContextBaseline::new(ProviderFamily::from_model(model)),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn family(&self) -> ProviderFamily {
        self.baseline.family()
    }

    /// Record one provider response: normalize against the baseline
    /// (resetting it if the model crossed provider families), compute the
    /// cost and persist it on the session row.
    pub fn record(
        &mut self,
        store: &EventStore,
        model: &str,
        raw: &TokenUsage,
    ) -> Result<TurnUsage> {
        let family = ProviderFamily::from_model(model);
        let normalized = self.baseline.observe(family, raw);
        let cost = cost_for_model(model, &normalized);

        store.add_session_cost(&self.session_id, cost)?;

        Ok(TurnUsage { normalized, cost })
    }
}

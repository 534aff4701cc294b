use once_cell::sync::Lazy;

use chronicle_types::NormalizedUsage;

/// Multiplied rates above a raw-input threshold (long-context tiers).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LongContextRates {
    /// Applies when `raw_input_tokens` is strictly greater than this.
    pub threshold: u64,
    pub input_multiplier: f64,
    pub output_multiplier: f64,
}

/// Per-million-token USD rates for a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelRates {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
    /// Cache writes are billed as a multiple of the input rate.
    pub cache_write_multiplier: f64,
    /// Cache reads are billed as a fraction of the input rate.
    pub cache_read_multiplier: f64,
    pub long_context: Option<LongContextRates>,
}

impl ModelRates {
    const fn flat(input_per_mtok: f64, output_per_mtok: f64) -> Self {
        Self {
            input_per_mtok,
            output_per_mtok,
            cache_write_multiplier: 1.25,
            cache_read_multiplier: 0.10,
            long_context: None,
        }
    }

    const fn with_long_context(mut self, threshold: u64, input: f64, output: f64) -> Self {
        self.long_context = Some(LongContextRates {
            threshold,
            input_multiplier: input,
            output_multiplier: output,
        });
        self
    }
}

/// Mid-tier (Sonnet-class) default for unknown models.
const DEFAULT_RATES: ModelRates =
    ModelRates::flat(3.0, 15.0).with_long_context(200_000, 2.0, 1.5);

/// Exact model-ID entries, consulted before pattern matching.
static EXACT_RATES: Lazy<Vec<(&'static str, ModelRates)>> = Lazy::new(|| {
    vec![
        (
            "claude-sonnet-4-5-20250929",
            ModelRates::flat(3.0, 15.0).with_long_context(200_000, 2.0, 1.5),
        ),
        ("claude-haiku-4-5-20251001", ModelRates::flat(1.0, 5.0)),
    ]
});

/// Canonical family-token patterns, most specific first.
static PATTERN_RATES: Lazy<Vec<(&'static str, ModelRates)>> = Lazy::new(|| {
    vec![
        ("opus", ModelRates::flat(15.0, 75.0)),
        (
            "sonnet",
            ModelRates::flat(3.0, 15.0).with_long_context(200_000, 2.0, 1.5),
        ),
        ("haiku", ModelRates::flat(1.0, 5.0)),
        ("gpt-4o-mini", ModelRates::flat(0.15, 0.60)),
        ("gpt-4o", ModelRates::flat(2.50, 10.00)),
        (
            "gemini-2.5-pro",
            ModelRates::flat(1.25, 10.00).with_long_context(200_000, 2.0, 1.5),
        ),
        ("gemini-2.5-flash", ModelRates::flat(0.30, 2.50)),
        ("gemini-2.0-flash", ModelRates::flat(0.10, 0.40)),
        ("gemini-1.5-pro", ModelRates::flat(1.25, 5.00)),
        ("gemini-1.5-flash", ModelRates::flat(0.075, 0.30)),
    ]
});

/// Rate lookup: exact ID, then family-token pattern, then the mid-tier
/// default.
pub fn rates_for_model(model: &str) -> ModelRates {
    for (id, rates) in EXACT_RATES.iter() {
        if model == *id {
            return *rates;
        }
    }
    for (token, rates) in PATTERN_RATES.iter() {
        if model.contains(token) {
            return *rates;
        }
    }
    DEFAULT_RATES
}

/// Cost in USD for one normalized usage record.
///
/// Long-context multipliers scale both rates when the raw input crosses
/// the threshold; cache-tier multipliers stack on top of the (possibly
/// multiplied) input rate.
pub fn compute_cost(rates: &ModelRates, usage: &NormalizedUsage) -> f64 {
    let (input_mult, output_mult) = match rates.long_context {
        Some(lc) if usage.raw_input_tokens > lc.threshold => {
            (lc.input_multiplier, lc.output_multiplier)
        }
        _ => (1.0, 1.0),
    };

    let input_rate = rates.input_per_mtok * input_mult;
    let output_rate = rates.output_per_mtok * output_mult;

    const MTOK: f64 = 1_000_000.0;
    input_rate * usage.raw_input_tokens as f64 / MTOK
        + output_rate * usage.output_tokens as f64 / MTOK
        + input_rate * rates.cache_write_multiplier * usage.raw_cache_creation_tokens as f64 / MTOK
        + input_rate * rates.cache_read_multiplier * usage.raw_cache_read_tokens as f64 / MTOK
}

/// Convenience: look up rates and compute in one call.
pub fn cost_for_model(model: &str, usage: &NormalizedUsage) -> f64 {
    compute_cost(&rates_for_model(model), usage)
}

//! Exchange span helpers.
//!
//! One span per submission on the producer side and one per processed
//! exchange on the consumer side. The `exchange.outcome` field is declared
//! empty and filled in by [`record_outcome`].

use tracing::Span;

use crate::model::{ExchangeId, WaitForTaskToComplete};

/// Start a span for a producer-side submission.
pub fn start_submit_span(endpoint: &str, exchange_id: &ExchangeId, wait: WaitForTaskToComplete) -> Span {
    tracing::info_span!(
        "seda.submit",
        "seda.endpoint" = endpoint,
        "exchange.id" = %exchange_id,
        "seda.wait" = %wait,
        "exchange.outcome" = tracing::field::Empty,
    )
}

/// Start a span for consumer-side processing of one exchange.
pub fn start_process_span(endpoint: &str, exchange_id: &ExchangeId) -> Span {
    tracing::info_span!(
        "seda.process",
        "seda.endpoint" = endpoint,
        "exchange.id" = %exchange_id,
        "exchange.outcome" = tracing::field::Empty,
    )
}

/// Record how the exchange ended ("completed", "timed_out", ...).
pub fn record_outcome(span: &Span, outcome: &str) {
    span.record("exchange.outcome", outcome);
}

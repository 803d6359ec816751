//! Metric instrument factories for seda-rs.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without one installed these are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("seda-rs")
}

/// Counter: exchanges accepted by the destination queue. Rejections are
/// counted by [`queue_rejected`] only.
/// Labels: `endpoint`, `wait`.
pub fn exchange_submitted() -> Counter<u64> {
    meter()
        .u64_counter("seda.exchange.submitted")
        .with_description("Number of exchanges accepted by a SEDA queue")
        .build()
}

/// Counter: submissions that gave up waiting.
/// Labels: `endpoint`.
pub fn exchange_timed_out() -> Counter<u64> {
    meter()
        .u64_counter("seda.exchange.timed_out")
        .with_description("Number of submissions that timed out waiting for completion")
        .build()
}

/// Counter: completions that arrived after the caller timed out.
/// Labels: `endpoint`.
pub fn exchange_late_signals() -> Counter<u64> {
    meter()
        .u64_counter("seda.exchange.late_signals")
        .with_description("Completion signals discarded because the caller already timed out")
        .build()
}

/// Counter: exchanges processed by consumers.
/// Labels: `endpoint`, `result` ("ok" | "failed").
pub fn exchange_processed() -> Counter<u64> {
    meter()
        .u64_counter("seda.exchange.processed")
        .with_description("Number of exchanges processed by consumers")
        .build()
}

/// Counter: exchanges the queue refused.
/// Labels: `endpoint`, `reason` ("full" | "closed").
pub fn queue_rejected() -> Counter<u64> {
    meter()
        .u64_counter("seda.queue.rejected")
        .with_description("Number of exchanges rejected by the destination queue")
        .build()
}

/// Histogram: time a caller spent waiting for completion.
/// Labels: `endpoint`.
pub fn exchange_wait_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("seda.exchange.wait_ms")
        .with_description("Time spent waiting for task completion")
        .with_unit("ms")
        .build()
}

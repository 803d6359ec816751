//! Correlated copies and result copy-back.
//!
//! The asynchronous side never sees the caller's exchange. It works on a
//! deep copy that carries the original's identity as its correlation id,
//! and only the results of that copy ever flow back.

use std::collections::BTreeMap;

use crate::model::{Exchange, Failure};

/// Build the copy that travels through the queue.
///
/// The copy gets a fresh identity, `correlation_id == original.id()`, an
/// empty completion registry, and `from_endpoint` set to `endpoint_uri`.
/// Payload and headers are deep-cloned.
pub fn create_correlated_copy(original: &Exchange, endpoint_uri: &str) -> Exchange {
    let mut copy = Exchange::with_pattern(original.pattern, original.body.clone());
    copy.headers = original.headers.clone();
    copy.out = original.out.clone();
    copy.failure = original.failure.clone();
    copy.set_correlation_id(original.id());
    copy.from_endpoint = Some(endpoint_uri.to_string());
    copy
}

/// Snapshot of what a completed exchange produced.
///
/// Captured on the consumer side so it can be handed to the waiting caller
/// without sharing the completed exchange itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeResults {
    pub out: Option<serde_json::Value>,
    pub failure: Option<Failure>,
    pub headers: BTreeMap<String, serde_json::Value>,
}

impl ExchangeResults {
    pub fn capture(completed: &Exchange) -> Self {
        Self {
            out: completed.out.clone(),
            failure: completed.failure.clone(),
            headers: completed.headers.clone(),
        }
    }

    /// Write these results onto `original`, replacing its result and
    /// failure slots and its headers.
    pub fn apply_to(self, original: &mut Exchange) {
        original.out = self.out;
        original.failure = self.failure;
        original.headers = self.headers;
    }
}

/// Copy results from a completed copy back onto the original.
pub fn copy_results(original: &mut Exchange, completed: &Exchange) {
    ExchangeResults::capture(completed).apply_to(original);
}

//! The exchange: the unit of work handed across the queue.
//!
//! An exchange carries a payload, a result slot, a failure slot, its own
//! identity plus an optional correlation identity, and an append-only
//! registry of completion callbacks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Newtype for exchange IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExchangeId(pub Uuid);

impl ExchangeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Pattern
// ---------------------------------------------------------------------------

/// Message exchange pattern. Decides whether the caller expects a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangePattern {
    /// One-way; nothing comes back.
    #[default]
    InOnly,
    /// Request/reply.
    InOut,
}

impl std::fmt::Display for ExchangePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExchangePattern::InOnly => "in_only",
            ExchangePattern::InOut => "in_out",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Failure
// ---------------------------------------------------------------------------

/// A failure recorded on an exchange. These are state, not returned errors:
/// the caller inspects [`Exchange::failure`] after submission returns.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    #[error("timed out after {timeout_ms} ms waiting for task to complete at [{endpoint}]")]
    TimedOut { timeout_ms: u64, endpoint: String },

    #[error("processing failed: {message}")]
    Processing { message: String },

    #[error("exchange dropped at [{endpoint}] before completion")]
    Abandoned { endpoint: String },
}

impl Failure {
    pub fn processing(message: impl Into<String>) -> Self {
        Failure::Processing {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Completion callbacks
// ---------------------------------------------------------------------------

/// Handler invoked when processing of an exchange finishes.
///
/// Implemented for any `Fn(&Exchange) + Send + Sync` closure.
pub trait OnCompletion: Send + Sync {
    fn on_done(&self, completed: &Exchange);
}

impl<F> OnCompletion for F
where
    F: Fn(&Exchange) + Send + Sync,
{
    fn on_done(&self, completed: &Exchange) {
        self(completed)
    }
}

// ---------------------------------------------------------------------------
// Exchange
// ---------------------------------------------------------------------------

/// A unit of work passed through a SEDA queue.
#[derive(Serialize, Deserialize)]
pub struct Exchange {
    id: ExchangeId,

    /// Identity of the exchange this one was copied from, if any.
    correlation_id: Option<ExchangeId>,

    pub pattern: ExchangePattern,

    /// URI of the endpoint this exchange was last received from.
    pub from_endpoint: Option<String>,

    /// Request payload. Opaque to the hand-off machinery.
    pub body: serde_json::Value,

    pub headers: BTreeMap<String, serde_json::Value>,

    /// Result slot.
    pub out: Option<serde_json::Value>,

    /// Failure slot.
    pub failure: Option<Failure>,

    pub created_at: DateTime<Utc>,

    #[serde(skip)]
    on_completion: Vec<Arc<dyn OnCompletion>>,
}

impl Exchange {
    /// Create a one-way exchange carrying `body`.
    pub fn new(body: serde_json::Value) -> Self {
        Self::with_pattern(ExchangePattern::InOnly, body)
    }

    /// Create a request/reply exchange carrying `body`.
    pub fn in_out(body: serde_json::Value) -> Self {
        Self::with_pattern(ExchangePattern::InOut, body)
    }

    pub fn with_pattern(pattern: ExchangePattern, body: serde_json::Value) -> Self {
        Self {
            id: ExchangeId::new(),
            correlation_id: None,
            pattern,
            from_endpoint: None,
            body,
            headers: BTreeMap::new(),
            out: None,
            failure: None,
            created_at: Utc::now(),
            on_completion: Vec::new(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.headers.insert(key.into(), value);
        self
    }

    pub fn id(&self) -> ExchangeId {
        self.id
    }

    pub fn correlation_id(&self) -> Option<ExchangeId> {
        self.correlation_id
    }

    pub(crate) fn set_correlation_id(&mut self, id: ExchangeId) {
        self.correlation_id = Some(id);
    }

    /// Does the caller expect a reply?
    pub fn is_out_capable(&self) -> bool {
        self.pattern == ExchangePattern::InOut
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Register a completion callback. Callbacks are only ever appended.
    pub fn add_on_completion(&mut self, callback: impl OnCompletion + 'static) {
        self.on_completion.push(Arc::new(callback));
    }

    pub fn on_completion_count(&self) -> usize {
        self.on_completion.len()
    }

    /// Finish processing: invoke every registered callback once with this
    /// exchange as the completed argument.
    ///
    /// The registry is drained, so calling `done` again does nothing.
    pub fn done(&mut self) {
        let callbacks = std::mem::take(&mut self.on_completion);
        for callback in callbacks {
            callback.on_done(self);
        }
    }

    /// Result if set, otherwise the request body.
    pub fn response(&self) -> &serde_json::Value {
        self.out.as_ref().unwrap_or(&self.body)
    }
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("id", &self.id)
            .field("correlation_id", &self.correlation_id)
            .field("pattern", &self.pattern)
            .field("from_endpoint", &self.from_endpoint)
            .field("body", &self.body)
            .field("headers", &self.headers)
            .field("out", &self.out)
            .field("failure", &self.failure)
            .field("on_completion", &self.on_completion.len())
            .finish()
    }
}

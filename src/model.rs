//! Core data model.
//!
//! An exchange is something handed to a queue. The wait policy decides
//! whether the submitting caller blocks until the exchange has been
//! processed on the other side.

pub mod exchange;

pub use exchange::{Exchange, ExchangeId, ExchangePattern, Failure, OnCompletion};

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ---------------------------------------------------------------------------
// Wait policy
// ---------------------------------------------------------------------------

/// Whether a submission waits for the consumer to finish the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitForTaskToComplete {
    /// Fire and forget.
    Never,
    /// Wait only when the exchange is out-capable.
    #[default]
    IfReplyExpected,
    /// Always wait.
    Always,
}

impl WaitForTaskToComplete {
    /// Resolve against a concrete exchange: should the caller block?
    pub fn should_wait(self, exchange: &Exchange) -> bool {
        match self {
            WaitForTaskToComplete::Never => false,
            WaitForTaskToComplete::IfReplyExpected => exchange.is_out_capable(),
            WaitForTaskToComplete::Always => true,
        }
    }
}

impl std::fmt::Display for WaitForTaskToComplete {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WaitForTaskToComplete::Never => "Never",
            WaitForTaskToComplete::IfReplyExpected => "IfReplyExpected",
            WaitForTaskToComplete::Always => "Always",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for WaitForTaskToComplete {
    type Err = Error;

    /// Accepts `Never`, `IfReplyExpected`, `Always` in any case, with or
    /// without `-`/`_` separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "never" => Ok(WaitForTaskToComplete::Never),
            "ifreplyexpected" => Ok(WaitForTaskToComplete::IfReplyExpected),
            "always" => Ok(WaitForTaskToComplete::Always),
            _ => Err(Error::Config(format!(
                "unknown waitForTaskToComplete value: {s}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-call options
// ---------------------------------------------------------------------------

/// Per-submission overrides. Anything left `None` falls back to the
/// producer's configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmitOptions {
    pub wait: Option<WaitForTaskToComplete>,
    /// Milliseconds; `<= 0` waits indefinitely.
    pub timeout_ms: Option<i64>,
}

impl SubmitOptions {
    pub fn wait(mut self, wait: WaitForTaskToComplete) -> Self {
        self.wait = Some(wait);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

//! Error types for seda-rs.
//!
//! `Error` is what a call can fail with synchronously. Outcomes that are
//! recorded on an exchange instead of being returned live in
//! [`crate::model::exchange::Failure`].

use thiserror::Error;

/// Why a destination queue refused an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue is full")]
    Full,

    #[error("queue is closed")]
    Closed,
}

impl QueueError {
    /// Short label used in logs and metric attributes.
    pub fn as_str(self) -> &'static str {
        match self {
            QueueError::Full => "full",
            QueueError::Closed => "closed",
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("exchange rejected by {endpoint}: {source}")]
    EnqueueRejected {
        endpoint: String,
        #[source]
        source: QueueError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

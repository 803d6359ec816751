//! # seda-rs
//!
//! Staged, queue-mediated hand-off of work between async tasks.
//!
//! A [`producer::SedaProducer`] puts a correlated copy of an exchange on a
//! bounded queue and, depending on its wait policy, waits for a
//! [`consumer::SedaConsumer`] to finish it, with an optional timeout. The
//! copy's results are copied back onto the caller's exchange exactly once,
//! and never after the caller has given up waiting.

pub mod config;
pub mod consumer;
pub mod correlate;
pub mod endpoint;
pub mod error;
pub mod model;
pub mod producer;
pub mod queue;
pub mod telemetry;
pub mod waiter;

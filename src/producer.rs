//! SEDA producer: hands exchanges to a queue and optionally waits for the
//! consumer to finish them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tracing::{Instrument, debug, trace, warn};
use uuid::Uuid;

use crate::correlate::create_correlated_copy;
use crate::endpoint::SedaEndpoint;
use crate::error::{Error, Result};
use crate::model::{Exchange, Failure, SubmitOptions, WaitForTaskToComplete};
use crate::queue::ExchangeQueue;
use crate::telemetry::exchange::{record_outcome, start_submit_span};
use crate::telemetry::metrics;
use crate::waiter::{WaitOutcome, Waiter};

/// Submits exchanges to one destination queue.
///
/// Cheap to clone; all clones share the queue. Each `submit` call is
/// independent, so many tasks may submit through the same producer at once.
#[derive(Clone)]
pub struct SedaProducer {
    id: Uuid,
    endpoint_uri: String,
    queue: Arc<dyn ExchangeQueue>,
    endpoint: Option<SedaEndpoint>,
    wait_for_task_to_complete: WaitForTaskToComplete,
    /// Milliseconds; `<= 0` waits indefinitely.
    timeout_ms: i64,
}

impl SedaProducer {
    /// Build a producer over any queue. Endpoints use this through
    /// [`SedaEndpoint::create_producer`].
    pub fn new(
        endpoint_uri: impl Into<String>,
        queue: Arc<dyn ExchangeQueue>,
        wait_for_task_to_complete: WaitForTaskToComplete,
        timeout_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint_uri: endpoint_uri.into(),
            queue,
            endpoint: None,
            wait_for_task_to_complete,
            timeout_ms,
        }
    }

    pub(crate) fn attached(mut self, endpoint: SedaEndpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn endpoint_uri(&self) -> &str {
        &self.endpoint_uri
    }

    pub fn wait_for_task_to_complete(&self) -> WaitForTaskToComplete {
        self.wait_for_task_to_complete
    }

    pub fn timeout_ms(&self) -> i64 {
        self.timeout_ms
    }

    /// Register with the owning endpoint, if any.
    pub fn start(&self) {
        if let Some(ref endpoint) = self.endpoint {
            endpoint.on_producer_started(self.id);
        }
    }

    /// Unregister from the owning endpoint, if any.
    pub fn stop(&self) {
        if let Some(ref endpoint) = self.endpoint {
            endpoint.on_producer_stopped(self.id);
        }
    }

    /// Submit with the producer's configured wait policy and timeout.
    pub async fn submit(&self, exchange: &mut Exchange) -> Result<()> {
        self.submit_with(exchange, SubmitOptions::default()).await
    }

    /// Submit an exchange.
    ///
    /// A correlated copy goes onto the queue; `exchange` itself never
    /// leaves the caller. If the resolved wait policy says to wait, the
    /// copy's results are copied back onto `exchange` once the consumer
    /// finishes it. If a positive timeout elapses first, a
    /// [`Failure::TimedOut`] is recorded on `exchange` instead and the call
    /// still returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EnqueueRejected`] if the queue refuses the copy. No
    /// completion callback from this call will ever fire in that case.
    pub async fn submit_with(&self, exchange: &mut Exchange, options: SubmitOptions) -> Result<()> {
        let wait = options.wait.unwrap_or(self.wait_for_task_to_complete);
        let timeout_ms = options.timeout_ms.unwrap_or(self.timeout_ms);

        let span = start_submit_span(&self.endpoint_uri, &exchange.id(), wait);
        async {
            let mut copy = create_correlated_copy(exchange, &self.endpoint_uri);

            if !wait.should_wait(exchange) {
                // No wait, e.g. in-only: enqueue and return.
                self.enqueue(copy, wait)?;
                record_outcome(&span, "enqueued");
                return Ok(());
            }

            let mut waiter = Waiter::new(self.endpoint_uri.clone());
            if let Some(callback) = waiter.callback() {
                copy.add_on_completion(callback);
            }
            self.enqueue(copy, wait)?;

            let started = Instant::now();
            let outcome = if timeout_ms > 0 {
                trace!(
                    endpoint = %self.endpoint_uri,
                    timeout_ms,
                    "waiting for task to complete using timeout"
                );
                waiter
                    .wait_timeout(Duration::from_millis(timeout_ms as u64))
                    .await
            } else {
                trace!(endpoint = %self.endpoint_uri, "waiting for task to complete (blocking)");
                waiter.wait().await
            };
            metrics::exchange_wait_ms().record(
                started.elapsed().as_secs_f64() * 1000.0,
                &[KeyValue::new("endpoint", self.endpoint_uri.clone())],
            );

            match outcome {
                WaitOutcome::Signaled(results) => {
                    results.apply_to(exchange);
                    record_outcome(
                        &span,
                        if exchange.is_failed() { "failed" } else { "completed" },
                    );
                }
                WaitOutcome::TimedOut => {
                    warn!(
                        endpoint = %self.endpoint_uri,
                        exchange = %exchange.id(),
                        timeout_ms,
                        "timed out waiting for task to complete"
                    );
                    metrics::exchange_timed_out()
                        .add(1, &[KeyValue::new("endpoint", self.endpoint_uri.clone())]);
                    exchange.failure = Some(Failure::TimedOut {
                        timeout_ms: timeout_ms as u64,
                        endpoint: self.endpoint_uri.clone(),
                    });
                    record_outcome(&span, "timed_out");
                }
                WaitOutcome::Abandoned => {
                    warn!(
                        endpoint = %self.endpoint_uri,
                        exchange = %exchange.id(),
                        "exchange dropped before completion"
                    );
                    exchange.failure = Some(Failure::Abandoned {
                        endpoint: self.endpoint_uri.clone(),
                    });
                    record_outcome(&span, "abandoned");
                }
            }
            Ok::<_, Error>(())
        }
        .instrument(span.clone())
        .await
    }

    /// Hand the copy to the queue. Only accepted copies count as submitted.
    fn enqueue(&self, copy: Exchange, wait: WaitForTaskToComplete) -> Result<()> {
        let id = copy.id();
        let correlation_id = copy.correlation_id();
        match self.queue.enqueue(copy) {
            Ok(()) => {
                debug!(
                    endpoint = %self.endpoint_uri,
                    exchange = %id,
                    correlation_id = ?correlation_id.map(|c| c.to_string()),
                    "exchange enqueued"
                );
                metrics::exchange_submitted().add(
                    1,
                    &[
                        KeyValue::new("endpoint", self.endpoint_uri.clone()),
                        KeyValue::new("wait", wait.to_string()),
                    ],
                );
                Ok(())
            }
            Err(reason) => {
                warn!(endpoint = %self.endpoint_uri, exchange = %id, %reason, "exchange rejected");
                metrics::queue_rejected().add(
                    1,
                    &[
                        KeyValue::new("endpoint", self.endpoint_uri.clone()),
                        KeyValue::new("reason", reason.as_str()),
                    ],
                );
                Err(Error::EnqueueRejected {
                    endpoint: self.endpoint_uri.clone(),
                    source: reason,
                })
            }
        }
    }
}

impl std::fmt::Debug for SedaProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SedaProducer")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint_uri)
            .field("wait_for_task_to_complete", &self.wait_for_task_to_complete)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

//! Consumer pool: dequeues exchanges, runs a processor on each, and fires
//! the exchange's completion callbacks when processing ends.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use futures::FutureExt as _;
use opentelemetry::KeyValue;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

use crate::endpoint::SedaEndpoint;
use crate::model::{Exchange, Failure};
use crate::telemetry::exchange::{record_outcome, start_process_span};
use crate::telemetry::metrics;

/// Business processing applied to each dequeued exchange.
///
/// Put the reply in `exchange.out`. An `Err`, or a panic inside `process`,
/// is recorded on the exchange as [`Failure::Processing`]; either way the
/// exchange's completion callbacks fire afterwards and the worker carries on.
pub trait Processor: Send + Sync + 'static {
    fn process(
        &self,
        exchange: &mut Exchange,
    ) -> impl Future<Output = std::result::Result<(), String>> + Send;
}

/// Adapts a synchronous closure into a [`Processor`].
pub struct FnProcessor<F>(pub F);

impl<F> Processor for FnProcessor<F>
where
    F: Fn(&mut Exchange) -> std::result::Result<(), String> + Send + Sync + 'static,
{
    async fn process(&self, exchange: &mut Exchange) -> std::result::Result<(), String> {
        (self.0)(exchange)
    }
}

/// A running pool of consumer workers on one endpoint.
///
/// Dropping the handle without [`SedaConsumer::stop`] leaves the workers
/// running, detached, until the endpoint is closed and drained.
#[must_use = "dropping the consumer detaches its workers; call `stop` or `join`"]
pub struct SedaConsumer<P> {
    id: Uuid,
    endpoint: SedaEndpoint,
    processor: Arc<P>,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
    processed: Arc<AtomicUsize>,
}

impl<P: Processor> SedaConsumer<P> {
    /// Spawn `concurrent_consumers` workers on the current tokio runtime and
    /// register with the endpoint.
    pub fn start(endpoint: SedaEndpoint, processor: P) -> Self {
        let id = Uuid::new_v4();
        let processor = Arc::new(processor);
        let processed = Arc::new(AtomicUsize::new(0));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let count = endpoint.config().concurrent_consumers.max(1);
        let workers = (0..count)
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    id,
                    endpoint.clone(),
                    Arc::clone(&processor),
                    shutdown_rx.clone(),
                    Arc::clone(&processed),
                ))
            })
            .collect();

        endpoint.on_consumer_started(id);
        info!(endpoint = %endpoint.uri(), consumer_id = %id, workers = count, "consumer started");

        Self {
            id,
            endpoint,
            processor,
            shutdown,
            workers,
            processed,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Exchanges processed so far, across all workers.
    pub fn processed_count(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    /// Ask every worker to stop after its current exchange.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Shut down, wait for all workers to exit, and unregister from the
    /// endpoint. Exchanges still queued stay queued until another consumer
    /// takes them; callers waiting on them keep waiting, bounded only by
    /// their timeout.
    pub async fn stop(self) {
        self.shutdown();
        self.join().await;
    }

    /// Wait for all workers to exit without asking them to, e.g. after the
    /// endpoint was closed and the queue is draining. Unregisters from the
    /// endpoint afterwards.
    pub async fn join(mut self) {
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                warn!(endpoint = %self.endpoint.uri(), "consumer worker ended abnormally: {e}");
            }
        }
        self.endpoint.on_consumer_stopped(self.id);
        info!(endpoint = %self.endpoint.uri(), consumer_id = %self.id, "consumer stopped");
    }
}

async fn run_worker<P: Processor>(
    worker: usize,
    consumer_id: Uuid,
    endpoint: SedaEndpoint,
    processor: Arc<P>,
    mut shutdown: watch::Receiver<bool>,
    processed: Arc<AtomicUsize>,
) {
    debug!(endpoint = %endpoint.uri(), worker, "consumer worker running");

    // Set once the `SedaConsumer` handle is dropped without a shutdown. The
    // worker then keeps consuming until the endpoint is closed and drained.
    let mut detached = false;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let next = if detached {
            endpoint.queue().dequeue().await
        } else {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!(
                            endpoint = %endpoint.uri(),
                            worker,
                            "consumer handle dropped without stop; worker runs until the endpoint closes"
                        );
                        detached = true;
                    }
                    continue;
                }
                item = endpoint.queue().dequeue() => item,
            }
        };

        let Some(exchange) = next else {
            // Closed and drained.
            break;
        };

        process_one(&endpoint, processor.as_ref(), exchange).await;
        processed.fetch_add(1, Ordering::Relaxed);
    }

    if detached {
        endpoint.on_consumer_stopped(consumer_id);
    }
    debug!(endpoint = %endpoint.uri(), worker, "consumer worker exiting");
}

async fn process_one<P: Processor>(endpoint: &SedaEndpoint, processor: &P, mut exchange: Exchange) {
    let span = start_process_span(endpoint.uri(), &exchange.id());

    async {
        let started = Instant::now();
        let caught = AssertUnwindSafe(processor.process(&mut exchange))
            .catch_unwind()
            .await;
        let result = caught.unwrap_or_else(|panic| {
            error!(exchange = %exchange.id(), "processor panicked");
            Err(format!("processor panicked: {}", panic_message(panic.as_ref())))
        });

        match result {
            Ok(()) => {
                debug!(
                    exchange = %exchange.id(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "exchange processed"
                );
                record_outcome(&span, "completed");
            }
            Err(error) => {
                warn!(exchange = %exchange.id(), %error, "processing failed");
                exchange.failure = Some(Failure::processing(error));
                record_outcome(&span, "failed");
            }
        }
        metrics::exchange_processed().add(
            1,
            &[
                KeyValue::new("endpoint", endpoint.uri().to_string()),
                KeyValue::new(
                    "result",
                    if exchange.is_failed() { "failed" } else { "ok" },
                ),
            ],
        );

        exchange.done();
    }
    .instrument(span.clone())
    .await
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "no panic details"
    }
}

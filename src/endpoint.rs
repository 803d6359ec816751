//! SEDA endpoint: owns one bounded queue and hands out producers and
//! consumers bound to it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::debug;
use uuid::Uuid;

use crate::config::EndpointConfig;
use crate::consumer::{Processor, SedaConsumer};
use crate::error::Result;
use crate::producer::SedaProducer;
use crate::queue::BoundedQueue;

/// Handle to a SEDA endpoint. Cheap to clone.
#[derive(Clone)]
pub struct SedaEndpoint {
    inner: Arc<EndpointInner>,
}

struct EndpointInner {
    config: EndpointConfig,
    uri: String,
    queue: Arc<BoundedQueue>,
    producers: Mutex<HashSet<Uuid>>,
    consumers: Mutex<HashSet<Uuid>>,
}

impl SedaEndpoint {
    pub fn new(config: EndpointConfig) -> Result<Self> {
        config.validate()?;
        let uri = config.uri();
        let queue = Arc::new(BoundedQueue::new(config.size));
        Ok(Self {
            inner: Arc::new(EndpointInner {
                config,
                uri,
                queue,
                producers: Mutex::new(HashSet::new()),
                consumers: Mutex::new(HashSet::new()),
            }),
        })
    }

    /// Parse a `seda:` URI and create the endpoint it describes.
    pub fn from_uri(uri: &str) -> Result<Self> {
        Self::new(EndpointConfig::from_uri(uri)?)
    }

    pub fn uri(&self) -> &str {
        &self.inner.uri
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.inner.config
    }

    pub fn queue(&self) -> &Arc<BoundedQueue> {
        &self.inner.queue
    }

    /// A producer using this endpoint's wait policy and timeout.
    pub fn create_producer(&self) -> SedaProducer {
        SedaProducer::new(
            self.inner.uri.clone(),
            self.inner.queue.clone(),
            self.inner.config.wait_for_task_to_complete,
            self.inner.config.timeout_ms,
        )
        .attached(self.clone())
    }

    /// Start `concurrent_consumers` workers running `processor`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use = "dropping the consumer detaches its workers; call `stop` or `join`"]
    pub fn create_consumer<P: Processor>(&self, processor: P) -> SedaConsumer<P> {
        SedaConsumer::start(self.clone(), processor)
    }

    /// Stop accepting new exchanges.
    pub fn close(&self) {
        debug!(endpoint = %self.inner.uri, "closing endpoint queue");
        self.inner.queue.close();
    }

    pub fn producer_count(&self) -> usize {
        lock(&self.inner.producers).len()
    }

    pub fn consumer_count(&self) -> usize {
        lock(&self.inner.consumers).len()
    }

    pub(crate) fn on_producer_started(&self, id: Uuid) {
        lock(&self.inner.producers).insert(id);
    }

    pub(crate) fn on_producer_stopped(&self, id: Uuid) {
        lock(&self.inner.producers).remove(&id);
    }

    pub(crate) fn on_consumer_started(&self, id: Uuid) {
        lock(&self.inner.consumers).insert(id);
    }

    pub(crate) fn on_consumer_stopped(&self, id: Uuid) {
        lock(&self.inner.consumers).remove(&id);
    }
}

fn lock(set: &Mutex<HashSet<Uuid>>) -> std::sync::MutexGuard<'_, HashSet<Uuid>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl std::fmt::Debug for SedaEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SedaEndpoint")
            .field("uri", &self.inner.uri)
            .field("queue", &self.inner.queue)
            .finish()
    }
}

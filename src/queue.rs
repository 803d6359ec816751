//! Destination queues.
//!
//! Producers only need [`ExchangeQueue::enqueue`]; consumers pull from a
//! [`BoundedQueue`] owned by the endpoint.

use std::sync::RwLock;

use tokio::sync::{Mutex, Notify, mpsc};

use crate::error::QueueError;
use crate::model::Exchange;

/// A thread-safe, FIFO destination for exchanges.
///
/// `enqueue` must not wait for space: a full queue is reported as
/// [`QueueError::Full`] and the exchange is dropped.
pub trait ExchangeQueue: Send + Sync {
    fn enqueue(&self, exchange: Exchange) -> Result<(), QueueError>;
}

/// Bounded multi-producer, multi-consumer queue on a tokio channel.
pub struct BoundedQueue {
    tx: mpsc::Sender<Exchange>,
    rx: Mutex<mpsc::Receiver<Exchange>>,
    /// Held shared across check-and-send in `enqueue`, exclusively by
    /// `close`, so nothing is accepted once `close` returns.
    closed: RwLock<bool>,
    closed_notify: Notify,
}

impl BoundedQueue {
    /// Create a queue holding at most `capacity` exchanges (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
            closed: RwLock::new(false),
            closed_notify: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Number of exchanges waiting to be dequeued.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stop accepting exchanges. Already-queued exchanges can still be
    /// dequeued; once they are gone `dequeue` returns `None`.
    pub fn close(&self) {
        *self
            .closed
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = true;
        self.closed_notify.notify_waiters();
    }

    /// Take the next exchange, waiting for one to arrive.
    ///
    /// Returns `None` when the queue is closed and drained. Cancel-safe.
    pub async fn dequeue(&self) -> Option<Exchange> {
        let mut rx = self.rx.lock().await;
        loop {
            if self.is_closed() {
                return rx.try_recv().ok();
            }

            let notified = self.closed_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_closed() {
                continue;
            }

            tokio::select! {
                item = rx.recv() => return item,
                _ = &mut notified => continue,
            }
        }
    }
}

impl ExchangeQueue for BoundedQueue {
    fn enqueue(&self, exchange: Exchange) -> Result<(), QueueError> {
        let closed = self
            .closed
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *closed {
            return Err(QueueError::Closed);
        }
        self.tx.try_send(exchange).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }
}

impl std::fmt::Debug for BoundedQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

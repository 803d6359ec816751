//! One-shot completion gate between a consumer-side signal and a
//! caller-side timeout.
//!
//! The gate starts `Armed` and is moved exactly once, by `compare_exchange`,
//! to either `Signaled` (the completion callback won) or `TimedOut` (the
//! waiting caller gave up first). Whoever loses the exchange does nothing:
//! a late signal is dropped, and a timeout that loses to a concurrent signal
//! takes the signalled results instead.
//!
//! Results travel from the winning signal to the waiting caller over a
//! oneshot channel, so the caller is the only one that ever touches its
//! own exchange.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use opentelemetry::KeyValue;
use tokio::sync::oneshot;
use tracing::trace;

use crate::correlate::ExchangeResults;
use crate::model::{Exchange, OnCompletion};
use crate::telemetry::metrics;

const ARMED: u8 = 0;
const SIGNALED: u8 = 1;
const TIMED_OUT: u8 = 2;

/// Observable state of a [`CompletionGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Armed,
    Signaled,
    TimedOut,
}

impl GateState {
    fn from_u8(v: u8) -> Self {
        match v {
            SIGNALED => GateState::Signaled,
            TIMED_OUT => GateState::TimedOut,
            _ => GateState::Armed,
        }
    }
}

/// The shared half of a waiter, owned by the completion callback.
pub struct CompletionGate {
    state: AtomicU8,
    tx: Mutex<Option<oneshot::Sender<ExchangeResults>>>,
    endpoint: String,
}

impl CompletionGate {
    pub fn state(&self) -> GateState {
        GateState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Deliver a completion. Returns `true` only for the call that wins the
    /// gate; every later call (after a timeout, or a repeated callback) is
    /// discarded.
    pub fn signal(&self, completed: &Exchange) -> bool {
        if let Err(current) =
            self.state
                .compare_exchange(ARMED, SIGNALED, Ordering::AcqRel, Ordering::Acquire)
        {
            match GateState::from_u8(current) {
                GateState::TimedOut => {
                    trace!(
                        endpoint = %self.endpoint,
                        exchange = %completed.id(),
                        response = %completed.response(),
                        "timeout occurred, response ignored"
                    );
                    metrics::exchange_late_signals()
                        .add(1, &[KeyValue::new("endpoint", self.endpoint.clone())]);
                }
                _ => {
                    trace!(
                        endpoint = %self.endpoint,
                        exchange = %completed.id(),
                        "completion already signalled, ignoring repeat"
                    );
                }
            }
            return false;
        }

        trace!(
            endpoint = %self.endpoint,
            exchange = %completed.id(),
            response = %completed.response(),
            "completion signalled"
        );

        let results = ExchangeResults::capture(completed);
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(tx) = tx {
            // Receiver gone means the caller's future was dropped; nothing to do.
            let _ = tx.send(results);
        }
        true
    }

    fn try_time_out(&self) -> bool {
        self.state
            .compare_exchange(ARMED, TIMED_OUT, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl std::fmt::Debug for CompletionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "onDone at [{}] ({:?})", self.endpoint, self.state())
    }
}

/// How a wait ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    /// The completion callback won; carries the completed copy's results.
    Signaled(ExchangeResults),
    /// The bound elapsed first.
    TimedOut,
    /// The copy was dropped without ever being completed.
    Abandoned,
}

/// The caller's half. Create one per submission, register
/// [`Waiter::callback`] on the copy, then wait.
pub struct Waiter {
    gate: Weak<CompletionGate>,
    callback_gate: Option<Arc<CompletionGate>>,
    rx: oneshot::Receiver<ExchangeResults>,
}

impl Waiter {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let (tx, rx) = oneshot::channel();
        let gate = Arc::new(CompletionGate {
            state: AtomicU8::new(ARMED),
            tx: Mutex::new(Some(tx)),
            endpoint: endpoint.into(),
        });
        Self {
            gate: Arc::downgrade(&gate),
            callback_gate: Some(gate),
            rx,
        }
    }

    /// Take the completion callback. Only the first call returns `Some`.
    ///
    /// The waiter itself holds the gate weakly, so once the callback (and
    /// the exchange carrying it) is dropped unsignalled the wait resolves
    /// as [`WaitOutcome::Abandoned`].
    pub fn callback(&mut self) -> Option<impl OnCompletion + 'static> {
        let gate = self.callback_gate.take()?;
        Some(move |completed: &Exchange| {
            gate.signal(completed);
        })
    }

    /// The gate, while anything still holds it.
    pub fn gate(&self) -> Option<Arc<CompletionGate>> {
        self.gate.upgrade()
    }

    /// Current gate state, or `None` once the gate has been dropped.
    pub fn state(&self) -> Option<GateState> {
        self.gate.upgrade().map(|gate| gate.state())
    }

    /// Block until the gate is signalled.
    pub async fn wait(mut self) -> WaitOutcome {
        // Unused callback would otherwise keep the gate alive forever.
        self.callback_gate = None;
        match self.rx.await {
            Ok(results) => WaitOutcome::Signaled(results),
            Err(_) => WaitOutcome::Abandoned,
        }
    }

    /// Block until the gate is signalled or `timeout` elapses.
    pub async fn wait_timeout(mut self, timeout: Duration) -> WaitOutcome {
        self.callback_gate = None;
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(results)) => WaitOutcome::Signaled(results),
            Ok(Err(_)) => WaitOutcome::Abandoned,
            Err(_elapsed) => match self.gate.upgrade() {
                Some(gate) => {
                    if gate.try_time_out() {
                        WaitOutcome::TimedOut
                    } else {
                        // Lost to a signal already in flight; its results are
                        // on their way.
                        drop(gate);
                        match self.rx.await {
                            Ok(results) => WaitOutcome::Signaled(results),
                            Err(_) => WaitOutcome::Abandoned,
                        }
                    }
                }
                None => match self.rx.try_recv() {
                    Ok(results) => WaitOutcome::Signaled(results),
                    Err(_) => WaitOutcome::Abandoned,
                },
            },
        }
    }
}

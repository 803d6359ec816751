//! Tests for the completion gate: signal vs. timeout, repeats, abandonment.

use serde_json::json;
use seda_rs::correlate::ExchangeResults;
use seda_rs::model::{Exchange, Failure, OnCompletion};
use seda_rs::waiter::{GateState, WaitOutcome, Waiter};
use std::time::Duration;

fn completed_with(out: serde_json::Value) -> Exchange {
    let mut exchange = Exchange::in_out(json!("request"));
    exchange.out = Some(out);
    exchange
}

#[tokio::test]
async fn signal_before_wait_resolves_signaled() {
    let mut waiter = Waiter::new("seda:test");
    let callback = waiter.callback().expect("first callback");

    callback.on_done(&completed_with(json!("pong")));
    assert_eq!(waiter.state(), Some(GateState::Signaled));

    match waiter.wait().await {
        WaitOutcome::Signaled(results) => assert_eq!(results.out, Some(json!("pong"))),
        other => panic!("expected Signaled, got {other:?}"),
    }
}

#[tokio::test]
async fn callback_is_handed_out_once() {
    let mut waiter = Waiter::new("seda:test");
    assert!(waiter.callback().is_some());
    assert!(waiter.callback().is_none());
}

#[tokio::test]
async fn repeated_signal_copies_results_at_most_once() {
    let mut waiter = Waiter::new("seda:test");
    let callback = waiter.callback().expect("callback");

    callback.on_done(&completed_with(json!("first")));
    callback.on_done(&completed_with(json!("second")));
    callback.on_done(&completed_with(json!("third")));

    match waiter.wait_timeout(Duration::from_secs(1)).await {
        WaitOutcome::Signaled(ExchangeResults { out, .. }) => {
            assert_eq!(out, Some(json!("first")));
        }
        other => panic!("expected Signaled, got {other:?}"),
    }
}

#[tokio::test]
async fn bounded_wait_resolves_when_signal_arrives_in_time() {
    let mut waiter = Waiter::new("seda:test");
    let callback = waiter.callback().expect("callback");

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let mut completed = Exchange::in_out(json!("req"));
        completed.failure = Some(Failure::processing("consumer said no"));
        callback.on_done(&completed);
    });

    match waiter.wait_timeout(Duration::from_secs(2)).await {
        WaitOutcome::Signaled(results) => {
            assert_eq!(results.failure, Some(Failure::processing("consumer said no")));
        }
        other => panic!("expected Signaled, got {other:?}"),
    }
}

#[tokio::test]
async fn timeout_wins_and_late_signal_is_discarded() {
    let mut waiter = Waiter::new("seda:test");
    let callback = waiter.callback().expect("callback");
    let gate = waiter.gate().expect("gate is alive");

    let outcome = waiter.wait_timeout(Duration::from_millis(30)).await;
    assert_eq!(outcome, WaitOutcome::TimedOut);
    assert_eq!(gate.state(), GateState::TimedOut);

    // The late signal loses and leaves the gate where it was.
    assert!(!gate.signal(&completed_with(json!("too late"))));
    callback.on_done(&completed_with(json!("still too late")));
    assert_eq!(gate.state(), GateState::TimedOut);
}

#[tokio::test]
async fn only_first_signal_wins_the_gate() {
    let waiter = Waiter::new("seda:test");
    let gate = waiter.gate().expect("gate is alive");
    let other = Waiter::new("seda:other");

    assert_eq!(gate.state(), GateState::Armed);
    assert!(gate.signal(&completed_with(json!(1))));
    assert!(!gate.signal(&completed_with(json!(2))));
    assert_eq!(gate.state(), GateState::Signaled);

    // Gates are per submission.
    assert_eq!(other.state(), Some(GateState::Armed));
}

#[tokio::test]
async fn dropping_callback_unsignalled_abandons_the_wait() {
    let mut waiter = Waiter::new("seda:test");
    let mut copy = Exchange::in_out(json!("req"));
    copy.add_on_completion(waiter.callback().expect("callback"));

    // The consumer drops the copy without completing it.
    drop(copy);

    assert_eq!(waiter.state(), None);
    assert_eq!(waiter.wait().await, WaitOutcome::Abandoned);
}

#[tokio::test]
async fn unbounded_wait_resolves_via_exchange_done() {
    let mut waiter = Waiter::new("seda:test");
    let mut copy = Exchange::in_out(json!("req"));
    copy.add_on_completion(waiter.callback().expect("callback"));

    let consumer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        copy.out = Some(json!("resp"));
        copy.done();
    });

    match waiter.wait().await {
        WaitOutcome::Signaled(results) => assert_eq!(results.out, Some(json!("resp"))),
        other => panic!("expected Signaled, got {other:?}"),
    }
    consumer.await.expect("consumer task");
}

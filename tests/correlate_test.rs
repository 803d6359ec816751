//! Tests for correlated copies and result copy-back.

use serde_json::json;
use seda_rs::correlate::{ExchangeResults, copy_results, create_correlated_copy};
use seda_rs::model::{Exchange, ExchangePattern, Failure};

#[test]
fn copy_has_fresh_identity_and_correlates_to_original() {
    let original = Exchange::in_out(json!({"order": 42})).header("tenant", json!("acme"));

    let copy = create_correlated_copy(&original, "seda:orders");

    assert_ne!(copy.id(), original.id());
    assert_eq!(copy.correlation_id(), Some(original.id()));
    assert_eq!(copy.pattern, ExchangePattern::InOut);
    assert_eq!(copy.body, original.body);
    assert_eq!(copy.headers, original.headers);
    assert_eq!(copy.from_endpoint.as_deref(), Some("seda:orders"));
}

#[test]
fn copy_starts_with_empty_completion_registry() {
    let mut original = Exchange::new(json!("payload"));
    original.add_on_completion(|_: &Exchange| {});
    assert_eq!(original.on_completion_count(), 1);

    let copy = create_correlated_copy(&original, "seda:a");
    assert_eq!(copy.on_completion_count(), 0);
    assert_eq!(original.on_completion_count(), 1);
}

#[test]
fn mutating_copy_does_not_touch_original() {
    let original = Exchange::in_out(json!({"items": [1, 2, 3]}));
    let mut copy = create_correlated_copy(&original, "seda:a");

    copy.body["items"]
        .as_array_mut()
        .expect("items is an array")
        .push(json!(4));
    copy.headers.insert("processed".to_string(), json!(true));

    assert_eq!(original.body, json!({"items": [1, 2, 3]}));
    assert!(original.headers.is_empty());
}

#[test]
fn copy_results_moves_result_slot() {
    let mut original = Exchange::in_out(json!("ping"));
    let mut completed = create_correlated_copy(&original, "seda:a");
    completed.out = Some(json!("pong"));
    completed
        .headers
        .insert("handled-by".to_string(), json!("worker-1"));

    copy_results(&mut original, &completed);

    assert_eq!(original.out, Some(json!("pong")));
    assert!(original.failure.is_none());
    assert_eq!(original.headers.get("handled-by"), Some(&json!("worker-1")));
    // The original keeps its own identity.
    assert_ne!(original.id(), completed.id());
    assert_eq!(original.body, json!("ping"));
}

#[test]
fn copy_results_moves_failure_slot() {
    let mut original = Exchange::in_out(json!("ping"));
    let mut completed = create_correlated_copy(&original, "seda:a");
    completed.failure = Some(Failure::processing("boom"));

    copy_results(&mut original, &completed);

    assert!(original.out.is_none());
    assert_eq!(original.failure, Some(Failure::processing("boom")));
}

#[test]
fn captured_results_are_detached_from_the_completed_exchange() {
    let mut original = Exchange::in_out(json!(1));
    let mut completed = create_correlated_copy(&original, "seda:a");
    completed.out = Some(json!(2));

    let results = ExchangeResults::capture(&completed);
    completed.out = Some(json!(3));
    results.apply_to(&mut original);

    assert_eq!(original.out, Some(json!(2)));
}

#[test]
fn done_fires_each_callback_once() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    let calls = Arc::new(AtomicUsize::new(0));
    let mut exchange = Exchange::new(json!(null));
    for _ in 0..3 {
        let calls = Arc::clone(&calls);
        exchange.add_on_completion(move |_: &Exchange| {
            calls.fetch_add(1, Ordering::SeqCst);
        });
    }

    exchange.done();
    exchange.done();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(exchange.on_completion_count(), 0);
}

//! Tests for the bounded queue's close semantics under concurrent producers.

use serde_json::json;
use seda_rs::error::QueueError;
use seda_rs::model::Exchange;
use seda_rs::queue::{BoundedQueue, ExchangeQueue};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::test]
async fn close_rejects_and_drains_what_was_accepted() {
    let queue = BoundedQueue::new(4);
    queue.enqueue(Exchange::new(json!(1))).unwrap();
    queue.enqueue(Exchange::new(json!(2))).unwrap();
    queue.close();

    assert_eq!(queue.enqueue(Exchange::new(json!(3))), Err(QueueError::Closed));
    assert!(queue.dequeue().await.is_some());
    assert!(queue.dequeue().await.is_some());
    assert!(queue.dequeue().await.is_none());
}

#[tokio::test]
async fn close_wakes_an_idle_dequeue() {
    let queue = Arc::new(BoundedQueue::new(4));
    let waiting = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.dequeue().await.is_none() })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    queue.close();

    let drained = tokio::time::timeout(Duration::from_secs(1), waiting)
        .await
        .expect("dequeue woke on close")
        .unwrap();
    assert!(drained);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn nothing_is_accepted_once_close_returns() {
    for round in 0..50 {
        let queue = Arc::new(BoundedQueue::new(10_000));
        let accepted = Arc::new(AtomicUsize::new(0));

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let accepted = Arc::clone(&accepted);
                std::thread::spawn(move || {
                    loop {
                        match queue.enqueue(Exchange::new(json!(round))) {
                            Ok(()) => {
                                accepted.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(QueueError::Full) => std::thread::yield_now(),
                            Err(QueueError::Closed) => break,
                        }
                    }
                })
            })
            .collect();

        let drainer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let mut drained = 0usize;
                while queue.dequeue().await.is_some() {
                    drained += 1;
                }
                drained
            })
        };

        tokio::time::sleep(Duration::from_millis(2)).await;
        queue.close();

        let drained = drainer.await.unwrap();
        for producer in producers {
            producer.join().unwrap();
        }

        assert_eq!(drained, accepted.load(Ordering::SeqCst), "round {round}");
        assert!(queue.is_empty(), "round {round}: item accepted after close");
    }
}

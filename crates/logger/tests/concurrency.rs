//! Many producers sharing one service

use proven_logger::test_support::CaptureSink;
use proven_logger::{Delivery, LogService, LogServiceOptions, ServiceContext};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::time::Duration;

const THREADS: usize = 8;
const PER_THREAD: usize = 250;

fn run(delivery: Delivery) -> Vec<String> {
    let sink = CaptureSink::new();
    let service = LogService::initialize_with_options(
        sink.clone(),
        ServiceContext::new("test", "concurrency", "producers", "1"),
        LogServiceOptions::builder()
            .cancellation_deadline(Duration::from_millis(10))
            .delivery(delivery)
            .build(),
    )
    .unwrap();

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|thread| {
            let log = service.new_context(&format!("thread-{thread}"), "produce");
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                for seq in 0..PER_THREAD {
                    // Vary sizes so interleaved writes would be visible.
                    let padding = "x".repeat(seq % 97);
                    log.info_with_details(&seq.to_string(), &padding);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    service.finish();

    sink.entries()
}

fn assert_whole_and_ordered(entries: &[String]) {
    assert_eq!(entries.len(), THREADS * PER_THREAD);

    let mut next_seq: HashMap<String, usize> = HashMap::new();
    for entry in entries {
        // Every write is exactly one complete object.
        let value: Value = serde_json::from_str(entry)
            .unwrap_or_else(|e| panic!("torn or merged entry: {e}\n{entry}"));

        let site = value["site"].as_str().unwrap().to_string();
        let seq: usize = value["msg"].as_str().unwrap().parse().unwrap();
        assert_eq!(value["details"].as_str().unwrap().len(), seq % 97);

        let expected = next_seq.entry(site.clone()).or_default();
        assert_eq!(seq, *expected, "out of order for {site}");
        *expected += 1;
    }

    assert_eq!(next_seq.len(), THREADS);
    assert!(next_seq.values().all(|&n| n == PER_THREAD));
}

#[test]
fn test_locked_delivery_under_contention() {
    assert_whole_and_ordered(&run(Delivery::Locked));
}

#[test]
fn test_queued_delivery_under_contention() {
    assert_whole_and_ordered(&run(Delivery::Queued { capacity: 16 }));
}

#[test]
fn test_queue_of_one_still_delivers_everything() {
    assert_whole_and_ordered(&run(Delivery::Queued { capacity: 1 }));
}

use super::consumer::acknowledgement;
use super::{Broker, Consumer, ConsumerReport, Message, PriorityQueue, ShutdownCoordinator};
use crate::client::SessionId;
use crate::client::recorder::Recorder;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn msg(session: u64, timestamp: u64, text: &str, priority: u32) -> Message {
    Message::new(SessionId::new(session), timestamp, text.as_bytes().to_vec(), priority)
}

#[test]
fn test_message_stamped_defaults() {
    let first = Message::stamped(SessionId::new(3), b"hi".to_vec());
    let second = Message::stamped(SessionId::new(3), b"hi".to_vec());
    assert_eq!(first.priority(), 1);
    assert_eq!(first.session_id(), SessionId::new(3));
    assert_eq!(first.text(), b"hi");
    assert!(second.timestamp() >= first.timestamp());
}

#[test]
fn test_message_display() {
    let m = msg(2, 15, "hello", 1);
    assert_eq!(m.to_string(), "[client-2][15][hello][1]");
}

#[test]
fn test_queue_orders_by_priority_then_timestamp() {
    let queue = PriorityQueue::new();
    queue.push(msg(0, 30, "low-late", 1));
    queue.push(msg(0, 50, "high-late", 5));
    queue.push(msg(0, 10, "low-early", 1));
    queue.push(msg(0, 20, "high-early", 5));
    queue.push(msg(0, 5, "zero", 0));
    queue.shutdown();

    let order: Vec<String> = std::iter::from_fn(|| queue.pop())
        .map(|m| String::from_utf8(m.text().to_vec()).unwrap())
        .collect();
    assert_eq!(
        order,
        ["high-early", "high-late", "low-early", "low-late", "zero"]
    );
}

#[test]
fn test_queue_is_fifo_for_identical_keys() {
    let queue = PriorityQueue::new();
    for i in 0..10 {
        queue.push(msg(i, 7, &i.to_string(), 1));
    }
    queue.shutdown();

    let ids: Vec<u64> = std::iter::from_fn(|| queue.pop())
        .map(|m| m.session_id().get())
        .collect();
    assert_eq!(ids, (0..10).collect::<Vec<_>>());
}

#[test]
fn test_queue_pop_order_holds_for_interleaved_pushes() {
    let queue = PriorityQueue::new();
    // deterministic pseudo-random keys
    let mut seed: u64 = 0x2545_f491;
    for i in 0..200 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let priority = (seed >> 33) as u32 % 4;
        let timestamp = (seed >> 40) % 50;
        queue.push(msg(i, timestamp, "x", priority));
    }
    queue.shutdown();

    let popped: Vec<Message> = std::iter::from_fn(|| queue.pop()).collect();
    assert_eq!(popped.len(), 200);
    for pair in popped.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(a.priority() >= b.priority());
        if a.priority() == b.priority() {
            assert!(a.timestamp() <= b.timestamp());
        }
    }
}

#[test]
fn test_push_after_shutdown_is_discarded() {
    let queue = PriorityQueue::new();
    queue.push(msg(0, 1, "kept", 1));
    queue.shutdown();
    queue.push(msg(0, 2, "dropped", 1));

    assert_eq!(queue.size(), 1);
    assert_eq!(queue.discarded(), 1);
    assert_eq!(queue.pop().unwrap().text(), b"kept");
    assert!(queue.pop().is_none());
}

#[test]
fn test_sentinel_is_idempotent() {
    let queue = PriorityQueue::new();
    queue.shutdown();
    queue.shutdown();
    assert!(queue.is_shutdown());
    for _ in 0..5 {
        assert!(queue.pop().is_none());
    }
}

#[test]
fn test_shutdown_wakes_blocked_popper() {
    let queue = Arc::new(PriorityQueue::new());
    let popper = {
        let queue = queue.clone();
        thread::spawn(move || queue.pop())
    };

    thread::sleep(Duration::from_millis(50));
    let started = Instant::now();
    queue.shutdown();

    assert!(popper.join().unwrap().is_none());
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_push_wakes_blocked_popper() {
    let queue = Arc::new(PriorityQueue::new());
    let popper = {
        let queue = queue.clone();
        thread::spawn(move || queue.pop())
    };

    thread::sleep(Duration::from_millis(50));
    queue.push(msg(4, 1, "wake", 1));

    let popped = popper.join().unwrap().expect("message");
    assert_eq!(popped.text(), b"wake");
}

#[test]
fn test_concurrent_producers_every_message_popped_once() {
    const PRODUCERS: u64 = 8;
    const PER_PRODUCER: u64 = 250;

    let queue = Arc::new(PriorityQueue::new());
    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || {
            let mut count = 0u64;
            while queue.pop().is_some() {
                count += 1;
            }
            count
        })
    };

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    queue.push(Message::stamped(SessionId::new(p), i.to_string().into_bytes()));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    queue.shutdown();

    assert_eq!(consumer.join().unwrap(), PRODUCERS * PER_PRODUCER);
    assert_eq!(queue.discarded(), 0);
}

#[test]
fn test_broker_session_ids_are_monotonic() {
    let broker = Broker::new();
    let ids: Vec<u64> = (0..4).map(|_| broker.next_session_id().get()).collect();
    assert_eq!(ids, [0, 1, 2, 3]);
    assert!(broker.is_running());
}

#[test]
fn test_acknowledgement_format() {
    assert_eq!(acknowledgement(&msg(0, 0, "hello", 1)), b"Received: hello\n");
    assert_eq!(acknowledgement(&msg(0, 0, "", 1)), b"Received: \n");
}

#[test]
fn test_consumer_delivers_to_originating_session() {
    let broker = Arc::new(Broker::new());
    let a = Arc::new(Recorder::default());
    let b = Arc::new(Recorder::default());
    broker.registry().insert(SessionId::new(1), a.clone());
    broker.registry().insert(SessionId::new(2), b.clone());

    broker.queue().push(msg(1, 1, "a", 1));
    broker.queue().push(msg(2, 2, "b", 1));
    broker.queue().shutdown();

    let report = Consumer::new(broker).run();
    assert_eq!(report.delivered, 2);
    assert_eq!(a.sent(), "Received: a\n");
    assert_eq!(b.sent(), "Received: b\n");
}

#[test]
fn test_consumer_counts_misses_and_failures() {
    let broker = Arc::new(Broker::new());
    broker
        .registry()
        .insert(SessionId::new(1), Arc::new(Recorder::failing()));

    broker.queue().push(msg(1, 1, "broken pipe", 1));
    broker.queue().push(msg(9, 2, "gone", 1));
    broker.queue().shutdown();

    let report = Consumer::new(broker).run();
    assert_eq!(
        report,
        ConsumerReport {
            delivered: 0,
            failed: 1,
            evicted: 0,
            missed: 1,
        }
    );
    assert_eq!(report.consumed(), 2);
}

#[test]
fn test_consumer_closes_session_that_stops_reading() {
    let broker = Arc::new(Broker::new());
    let stalled = Arc::new(Recorder::stalled());
    let healthy = Arc::new(Recorder::default());
    broker.registry().insert(SessionId::new(1), stalled.clone());
    broker.registry().insert(SessionId::new(2), healthy.clone());

    broker.queue().push(msg(1, 1, "flood", 1));
    broker.queue().push(msg(1, 2, "flood", 1));
    broker.queue().push(msg(2, 3, "hello", 1));
    broker.queue().shutdown();

    let report = Consumer::new(broker.clone()).run();
    assert_eq!(
        report,
        ConsumerReport {
            delivered: 1,
            failed: 1,
            evicted: 1,
            missed: 1,
        }
    );
    assert!(stalled.is_closed());
    assert!(broker.registry().lookup(SessionId::new(1)).is_none());
    assert_eq!(healthy.sent(), "Received: hello\n");
}

#[test]
fn test_coordinator_wakes_spawned_consumer() {
    let broker = Arc::new(Broker::new());
    let coordinator = ShutdownCoordinator::new(broker.clone());
    let handle = Consumer::spawn(broker.clone()).unwrap();

    thread::sleep(Duration::from_millis(50));
    assert!(!coordinator.is_shutdown());
    coordinator.shutdown();
    coordinator.shutdown();

    let report = handle.join().unwrap();
    assert_eq!(report.consumed(), 0);
    assert!(coordinator.is_shutdown());
    assert!(!broker.is_running());
    assert!(broker.queue().is_shutdown());
}

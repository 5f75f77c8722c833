use crate::{CellConfig, Error, RegistryRecord, SegmentBuffer};
use core::time::Duration;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::scope;
use std::time::Instant;

const THRESHOLD: f64 = 0.75;
const TIMEOUT: Duration = Duration::from_millis(200);

fn record(value: u64, step: u64) -> RegistryRecord {
    let mut record = RegistryRecord::init("order", &CellConfig::default());
    record.value = value;
    record.step = step;
    record
}

#[test]
fn concurrent_allocations_cover_the_range_exactly() {
    const N: usize = 50;

    let buffer = SegmentBuffer::new(&record(100, 50));
    let seen = Mutex::new(HashSet::new());

    scope(|s| {
        for _ in 0..N {
            s.spawn(|| {
                // The standby is never filled; expansion requests are ignored.
                let value = buffer.allocate(THRESHOLD, TIMEOUT, || {}).unwrap();
                assert!(seen.lock().unwrap().insert(value), "duplicate {value}");
            });
        }
    });

    let seen = seen.into_inner().unwrap();
    let expected: HashSet<u64> = (100..100 + N as u64).collect();
    assert_eq!(seen, expected);
}

#[test]
fn allocations_within_a_segment_increase() {
    let buffer = SegmentBuffer::new(&record(7, 10));
    let values: Vec<u64> = (0..10)
        .map(|_| buffer.allocate(THRESHOLD, TIMEOUT, || {}).unwrap())
        .collect();
    assert_eq!(values, (7..17).collect::<Vec<_>>());
}

#[test]
fn needs_expansion_tracks_threshold() {
    let buffer = SegmentBuffer::new(&record(1000, 100));
    assert!(!buffer.needs_expansion(THRESHOLD));

    for _ in 0..74 {
        buffer.allocate(THRESHOLD, TIMEOUT, || {}).unwrap();
    }
    assert!(!buffer.needs_expansion(THRESHOLD));

    buffer.allocate(THRESHOLD, TIMEOUT, || {}).unwrap();
    assert!(buffer.needs_expansion(THRESHOLD));
}

#[test]
fn needs_expansion_is_false_while_standby_is_ready() {
    let buffer = SegmentBuffer::new(&record(1000, 100));
    for _ in 0..90 {
        buffer.allocate(THRESHOLD, TIMEOUT, || {}).unwrap();
    }
    assert!(buffer.needs_expansion(THRESHOLD));
    // Crossing the threshold claimed the refill slot.
    assert!(buffer.is_expanding());

    buffer.fill_standby(&record(5000, 100));
    assert!(buffer.is_next_ready());
    assert!(!buffer.is_expanding());
    assert!(!buffer.needs_expansion(THRESHOLD));
}

#[test]
fn expansion_is_single_flight() {
    let buffer = SegmentBuffer::new(&record(0, 10));
    assert!(buffer.begin_expansion());
    assert!(!buffer.begin_expansion());
    buffer.end_expansion();
    assert!(buffer.begin_expansion());
}

#[test]
fn allocate_triggers_expansion_once_past_threshold() {
    let buffer = SegmentBuffer::new(&record(0, 100));
    let triggered = AtomicUsize::new(0);

    for _ in 0..100 {
        buffer
            .allocate(THRESHOLD, TIMEOUT, || {
                triggered.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
    }
    // Expansion flag is never released, so only the first trigger fires.
    assert_eq!(triggered.load(Ordering::Relaxed), 1);
    assert!(buffer.is_expanding());
}

#[test]
fn promote_requires_ready_standby() {
    let buffer = SegmentBuffer::new(&record(0, 2));
    assert_eq!(buffer.allocate(THRESHOLD, TIMEOUT, || {}).unwrap(), 0);
    assert_eq!(buffer.allocate(THRESHOLD, TIMEOUT, || {}).unwrap(), 1);
    assert!(!buffer.promote());
    assert_eq!(buffer.snapshot().active, 0);

    assert!(buffer.begin_expansion());
    buffer.fill_standby(&record(500, 10));
    assert!(buffer.promote());

    let snapshot = buffer.snapshot();
    assert_eq!(snapshot.active, 1);
    assert_eq!(snapshot.value, 500);
    assert_eq!(snapshot.max, 509);
    assert!(!snapshot.next_ready);

    assert!(!buffer.promote());
}

#[test]
fn promote_keeps_a_live_active_segment() {
    let buffer = SegmentBuffer::new(&record(0, 10));
    assert_eq!(buffer.allocate(THRESHOLD, TIMEOUT, || {}).unwrap(), 0);

    assert!(buffer.begin_expansion());
    buffer.fill_standby(&record(500, 10));
    // A late caller must not skip the nine values still in the active slot.
    assert!(!buffer.promote());

    let snapshot = buffer.snapshot();
    assert_eq!(snapshot.active, 0);
    assert!(snapshot.next_ready);
    for expected in 1..10 {
        assert_eq!(buffer.allocate(THRESHOLD, TIMEOUT, || {}).unwrap(), expected);
    }
    assert_eq!(buffer.allocate(THRESHOLD, TIMEOUT, || {}).unwrap(), 500);
}

#[test]
fn exhausted_segment_switches_to_standby() {
    let buffer = SegmentBuffer::new(&record(0, 2));
    assert_eq!(buffer.allocate(THRESHOLD, TIMEOUT, || {}).unwrap(), 0);
    assert_eq!(buffer.allocate(THRESHOLD, TIMEOUT, || {}).unwrap(), 1);

    // Simulate a refill that has already landed.
    buffer.fill_standby(&record(40, 2));
    assert_eq!(buffer.allocate(THRESHOLD, TIMEOUT, || {}).unwrap(), 40);
    assert_eq!(buffer.allocate(THRESHOLD, TIMEOUT, || {}).unwrap(), 41);
}

#[test]
fn exhausted_segment_waits_for_inflight_refill() {
    let buffer = SegmentBuffer::new(&record(0, 1));
    assert_eq!(buffer.allocate(THRESHOLD, TIMEOUT, || {}).unwrap(), 0);

    scope(|s| {
        s.spawn(|| {
            std::thread::sleep(Duration::from_millis(20));
            buffer.fill_standby(&record(900, 10));
        });
        let value = buffer
            .allocate(THRESHOLD, Duration::from_secs(5), || {})
            .unwrap();
        assert_eq!(value, 900);
    });
}

#[test]
fn allocate_times_out_when_standby_never_fills() {
    let buffer = SegmentBuffer::new(&record(0, 1));
    buffer.allocate(THRESHOLD, TIMEOUT, || {}).unwrap();

    let start = Instant::now();
    let err = buffer.allocate(THRESHOLD, TIMEOUT, || {}).unwrap_err();
    let elapsed = start.elapsed();

    match err {
        Error::Timeout { name, waited } => {
            assert_eq!(name, "order");
            assert!(waited >= TIMEOUT);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(elapsed >= TIMEOUT);
    assert!(elapsed < TIMEOUT + Duration::from_millis(500), "{elapsed:?}");
}

#[test]
fn refill_hint_reports_active_step() {
    let buffer = SegmentBuffer::new(&record(0, 64));
    let (step, elapsed) = buffer.refill_hint();
    assert_eq!(step, 64);
    assert!(elapsed < Duration::from_secs(5));
}

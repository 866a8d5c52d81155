// Sampling: degraded reads, processes exiting mid-tick, overlapping ticks

use super::support::{engine, FakeSystem, Failure, MB};
use std::thread;
use std::time::Duration;

#[test]
fn test_denied_process_keeps_previous_values() {
    let fake = FakeSystem::new();
    fake.spawn(700, "antivirus.exe", 12.0, 100);
    let engine = engine(&fake);
    engine.sample_tick().unwrap();

    fake.fail_metrics(700, Some(Failure::Denied));
    fake.set_cpu(700, 90.0);
    let set = engine.sample_tick().unwrap().unwrap();

    let snapshot = set.get(700).unwrap();
    assert!(snapshot.degraded);
    assert_eq!(snapshot.cpu_percent, 12.0);
    assert_eq!(snapshot.resident_bytes, 100 * MB);
}

#[test]
fn test_denied_process_without_history_reads_zero() {
    let fake = FakeSystem::new();
    fake.spawn(701, "lsass.exe", 3.0, 40);
    fake.spawn(702, "app.exe", 8.0, 60);
    fake.fail_metrics(701, Some(Failure::Always));
    let engine = engine(&fake);

    let set = engine.sample_tick().unwrap().unwrap();
    assert_eq!(set.len(), 2);

    let denied = set.get(701).unwrap();
    assert!(denied.degraded);
    assert_eq!(denied.cpu_percent, 0.0);
    assert_eq!(denied.resident_bytes, 0);
    assert!(!set.get(702).unwrap().degraded);
}

#[test]
fn test_process_exiting_mid_tick_is_dropped() {
    let fake = FakeSystem::new();
    fake.spawn(703, "installer.exe", 30.0, 200);
    fake.spawn(704, "app.exe", 8.0, 60);
    fake.vanish_after_listing(703);
    let engine = engine(&fake);

    let set = engine.sample_tick().unwrap().unwrap();
    assert!(set.get(703).is_none());
    assert!(set.get(704).is_some());
    assert_eq!(set.len(), 1);
}

#[test]
fn test_overlapping_tick_is_skipped() {
    let fake = FakeSystem::new();
    fake.spawn(705, "app.exe", 8.0, 60);
    fake.slow_listing(Duration::from_millis(400));
    let engine = engine(&fake);

    thread::scope(|scope| {
        let first = scope.spawn(|| engine.sample_tick());
        thread::sleep(Duration::from_millis(100));

        let second = engine.sample_tick().unwrap();
        assert!(second.is_none());

        let first = first.join().unwrap().unwrap();
        assert_eq!(first.unwrap().tick, 1);
    });
    assert_eq!(engine.snapshot().tick, 1);
}

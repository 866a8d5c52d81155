// Action executor: baselines, reverts, retries and capability gaps

use super::support::{engine, FakeSystem, Failure};
use corewarden::core::optimizer::{Action, Attribute, AttributeValue, Capability, PriorityClass};
use corewarden::WardenError;

#[test]
fn test_first_baseline_is_kept_across_changes() {
    let fake = FakeSystem::new();
    fake.spawn(500, "encoder.exe", 10.0, 200);
    let engine = engine(&fake);

    engine.apply(500, Action::SetPriority(PriorityClass::High)).unwrap();
    engine.apply(500, Action::SetPriority(PriorityClass::Idle)).unwrap();
    assert_eq!(fake.priority_of(500), Some(PriorityClass::Idle));

    let record = engine.revert_record(500).unwrap();
    assert_eq!(
        record.originals.get(&Attribute::Priority),
        Some(&AttributeValue::Priority(PriorityClass::Normal))
    );

    let report = engine.revert(500).unwrap();
    assert_eq!(report.restored, vec![AttributeValue::Priority(PriorityClass::Normal)]);
    assert_eq!(fake.priority_of(500), Some(PriorityClass::Normal));
}

#[test]
fn test_second_revert_has_nothing_to_do() {
    let fake = FakeSystem::new();
    fake.spawn(501, "worker.exe", 5.0, 50);
    let engine = engine(&fake);

    engine.apply(501, Action::LowerPriority).unwrap();
    engine.revert(501).unwrap();

    assert!(matches!(engine.revert(501), Err(WardenError::NothingToRevert(501))));
    assert!(!engine.has_revert(501));
}

#[test]
fn test_unchanged_value_records_no_baseline() {
    let fake = FakeSystem::new();
    fake.spawn(502, "idle.exe", 0.0, 10);
    fake.set_priority_of(502, PriorityClass::Idle);
    let engine = engine(&fake);

    // LowerPriority never raises a process already below BelowNormal
    let report = engine.apply(502, Action::LowerPriority).unwrap();
    assert!(!report.changed);
    assert_eq!(fake.priority_of(502), Some(PriorityClass::Idle));
    assert!(!engine.has_revert(502));
    assert_eq!(fake.count_calls("set_priority"), 0);
}

#[test]
fn test_kill_purges_revert_record() {
    let fake = FakeSystem::new();
    fake.spawn(503, "hung.exe", 0.0, 300);
    let engine = engine(&fake);

    engine.apply(503, Action::LowerPriority).unwrap();
    assert!(engine.has_revert(503));

    engine.apply(503, Action::Kill).unwrap();
    assert!(fake.process(503).is_none());
    assert!(!engine.has_revert(503));
    assert!(matches!(engine.revert(503), Err(WardenError::NothingToRevert(503))));
}

#[test]
fn test_apply_to_missing_process() {
    let fake = FakeSystem::new();
    let engine = engine(&fake);

    assert!(matches!(
        engine.apply(9999, Action::Trim),
        Err(WardenError::ProcessNotFound(9999))
    ));
    assert!(fake.calls().is_empty());
}

#[test]
fn test_revert_after_exit_reports_not_found() {
    let fake = FakeSystem::new();
    fake.spawn(504, "short.exe", 1.0, 10);
    let engine = engine(&fake);

    engine.apply(504, Action::LowerPriority).unwrap();
    fake.vanish(504);

    assert!(matches!(engine.revert(504), Err(WardenError::ProcessNotFound(504))));
    assert!(!engine.has_revert(504));
}

#[test]
fn test_revert_never_touches_reused_pid() {
    let fake = FakeSystem::new();
    fake.spawn(505, "old.exe", 1.0, 10);
    let engine = engine(&fake);

    engine.apply(505, Action::SetPriority(PriorityClass::High)).unwrap();
    fake.respawn(505, "new.exe");
    let calls_before = fake.count_calls("set_priority");

    assert!(matches!(engine.revert(505), Err(WardenError::ProcessNotFound(505))));
    assert_eq!(fake.count_calls("set_priority"), calls_before);
    assert_eq!(fake.priority_of(505), Some(PriorityClass::Normal));
}

#[test]
fn test_transient_revert_failure_is_retried() {
    let fake = FakeSystem::new();
    fake.spawn(506, "busy.exe", 1.0, 10);
    let engine = engine(&fake);

    engine.apply(506, Action::LowerPriority).unwrap();
    fake.fail_priority_sets(Some(Failure::Transient(2)));

    engine.revert(506).unwrap();
    assert_eq!(fake.priority_of(506), Some(PriorityClass::Normal));
    // one apply plus three revert attempts
    assert_eq!(fake.count_calls("set_priority"), 4);
}

#[test]
fn test_partial_revert_names_failed_attributes() {
    let fake = FakeSystem::new();
    fake.spawn(507, "stubborn.exe", 1.0, 10);
    let engine = engine(&fake);

    engine.apply(507, Action::LowerPriority).unwrap();
    engine.apply(507, Action::EcoThrottle).unwrap();
    assert!(fake.process(507).unwrap().eco);

    fake.fail_priority_sets(Some(Failure::Always));
    match engine.revert(507) {
        Err(WardenError::PartialRevert { pid, failed }) => {
            assert_eq!(pid, 507);
            assert_eq!(failed, vec![Attribute::Priority]);
        }
        other => panic!("expected partial revert, got {:?}", other),
    }

    assert!(!fake.process(507).unwrap().eco);
    // the failed attribute stays revertible
    let record = engine.revert_record(507).unwrap();
    assert!(record.originals.contains_key(&Attribute::Priority));
    assert!(!record.originals.contains_key(&Attribute::EcoThrottle));

    fake.fail_priority_sets(None);
    engine.revert(507).unwrap();
    assert_eq!(fake.priority_of(507), Some(PriorityClass::Normal));
}

#[test]
fn test_failed_first_change_leaves_no_baseline() {
    let fake = FakeSystem::new();
    fake.spawn(508, "service.exe", 1.0, 10);
    fake.fail_priority_sets(Some(Failure::Denied));
    let engine = engine(&fake);

    assert!(matches!(
        engine.apply(508, Action::LowerPriority),
        Err(WardenError::PermissionDenied(_))
    ));
    assert!(!engine.has_revert(508));
}

#[test]
fn test_capability_gap_reported_once() {
    let fake = FakeSystem::new();
    fake.spawn(509, "sync.exe", 1.0, 10);
    let engine = engine(&fake);

    for _ in 0..3 {
        assert!(matches!(
            engine.apply(509, Action::AssignThrottledGroup),
            Err(WardenError::Unsupported(Capability::ThrottledGroup))
        ));
    }
    assert_eq!(engine.capability_gaps(), vec![Capability::ThrottledGroup]);
    assert_eq!(fake.count_calls("assign_group"), 0);
}

#[test]
fn test_throttled_group_when_supported() {
    let fake = FakeSystem::with_grouping();
    fake.spawn(510, "sync.exe", 1.0, 10);
    let engine = engine(&fake);

    let report = engine.apply(510, Action::AssignThrottledGroup).unwrap();
    assert!(report.changed);
    assert!(fake.is_grouped(510));
    assert!(engine.capability_gaps().is_empty());
}

#[test]
fn test_protected_processes_are_refused() {
    let fake = FakeSystem::new();
    fake.spawn(511, "csrss.exe", 1.0, 10);
    fake.spawn(std::process::id(), "corewarden", 1.0, 10);
    let engine = engine(&fake);

    assert!(matches!(
        engine.apply(511, Action::Kill),
        Err(WardenError::Protected(_))
    ));
    assert!(matches!(
        engine.apply(std::process::id(), Action::LowerPriority),
        Err(WardenError::Protected(_))
    ));
    assert!(fake.calls().is_empty());
}

#[test]
fn test_zero_affinity_mask_is_rejected() {
    let fake = FakeSystem::new();
    fake.spawn(512, "render.exe", 1.0, 10);
    let engine = engine(&fake);

    assert!(engine.apply(512, Action::SetAffinity(0)).is_err());
    engine.apply(512, Action::SetAffinity(0x3)).unwrap();
    assert_eq!(fake.process(512).unwrap().affinity, 0x3);

    engine.revert(512).unwrap();
    assert_eq!(fake.process(512).unwrap().affinity, 0xF);
}

#[test]
fn test_revert_all_restores_every_process() {
    let fake = FakeSystem::new();
    fake.spawn(513, "a.exe", 1.0, 10);
    fake.spawn(514, "b.exe", 1.0, 10);
    let engine = engine(&fake);

    engine.apply(513, Action::LowerPriority).unwrap();
    engine.apply(514, Action::EcoThrottle).unwrap();

    let results = engine.revert_all();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(_, r)| r.is_ok()));
    assert_eq!(fake.priority_of(513), Some(PriorityClass::Normal));
    assert!(!fake.process(514).unwrap().eco);
}

#[test]
fn test_revert_restores_exact_native_priority() {
    let fake = FakeSystem::new();
    fake.spawn(520, "niced.exe", 5.0, 50);
    fake.set_nice_of(520, 3);
    let engine = engine(&fake);

    let report = engine.apply(520, Action::LowerPriority).unwrap();
    assert!(report.changed);
    assert_eq!(report.previous, Some(AttributeValue::NativePriority(3)));
    assert_eq!(fake.nice_of(520), Some(10));

    let report = engine.revert(520).unwrap();
    assert_eq!(report.restored, vec![AttributeValue::NativePriority(3)]);
    assert_eq!(fake.nice_of(520), Some(3));
    assert_eq!(fake.count_calls("set_native_priority 520 3"), 1);
}

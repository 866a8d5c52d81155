// End-to-end flows through sampling, rules, governor and revert

use super::support::{engine, engine_with, settings, FakeSystem};
use corewarden::core::optimizer::{Action, EffectOutcome, MemoryPriority, PriorityClass, Whitelist};
use corewarden::WardenError;

#[test]
fn test_background_chrome_lowered_then_reverted() {
    let fake = FakeSystem::new();
    fake.spawn(100, "game.exe", 55.0, 900);
    fake.spawn(4321, "chrome.exe", 42.0, 400);
    fake.set_foreground(Some(100));
    let engine = engine(&fake);

    let set = engine.sample_tick().unwrap().unwrap();
    assert_eq!(set.foreground, Some(100));

    let outcomes = engine.rules_tick();
    assert_eq!(outcomes.len(), 1);
    let outcome = &outcomes[0];
    assert_eq!(outcome.matched.pid, 4321);
    assert_eq!(outcome.matched.action, Action::LowerPriority);
    assert!(outcome.result.as_ref().unwrap().changed);

    assert_eq!(fake.priority_of(4321), Some(PriorityClass::BelowNormal));
    assert_eq!(fake.priority_of(100), Some(PriorityClass::Normal));
    assert!(engine.has_revert(4321));

    let effects = engine.effects_tick();
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].pid, 4321);
    assert!(matches!(effects[0].outcome, EffectOutcome::Measured { .. }));

    engine.revert(4321).unwrap();
    assert_eq!(fake.priority_of(4321), Some(PriorityClass::Normal));
    assert!(matches!(engine.revert(4321), Err(WardenError::NothingToRevert(4321))));
}

#[test]
fn test_governor_respects_whitelist_and_threshold() {
    let fake = FakeSystem::with_grouping();
    fake.spawn(200, "editor.exe", 80.0, 600);
    fake.spawn(201, "teams.exe", 35.0, 300);
    fake.spawn(202, "indexer.exe", 25.0, 150);
    fake.spawn(203, "notes.exe", 5.0, 80);
    fake.set_foreground(Some(200));

    let mut settings = settings();
    settings.governor_enabled = true;
    settings.policy.eco_cpu_threshold = 20.0;
    settings.policy.whitelist = Whitelist::new(["teams.exe"]);
    let engine = engine_with(&fake, settings);

    engine.sample_tick().unwrap();
    let governed = engine.governor_tick();

    assert_eq!(governed.len(), 1);
    assert_eq!(governed[0].pid, 202);
    assert!(governed[0].outcomes.iter().all(|(_, r)| r.is_ok()));

    let indexer = fake.process(202).unwrap();
    assert_eq!(indexer.priority, PriorityClass::BelowNormal);
    assert_eq!(indexer.memory_priority, MemoryPriority::Low);
    assert!(indexer.eco);
    assert!(fake.is_grouped(202));

    for untouched in [200, 201, 203] {
        let p = fake.process(untouched).unwrap();
        assert_eq!(p.priority, PriorityClass::Normal);
        assert!(!p.eco);
        assert!(!fake.is_grouped(untouched));
    }
}

#[test]
fn test_governed_process_is_not_reapplied_after_revert() {
    let fake = FakeSystem::new();
    fake.spawn(300, "backup.exe", 60.0, 100);

    let mut settings = settings();
    settings.governor_enabled = true;
    let engine = engine_with(&fake, settings);

    engine.sample_tick().unwrap();
    assert_eq!(engine.governor_tick().len(), 1);

    engine.revert(300).unwrap();
    engine.sample_tick().unwrap();
    assert!(engine.governor_tick().is_empty());
    assert_eq!(fake.priority_of(300), Some(PriorityClass::Normal));
}

#[test]
fn test_disabled_governor_does_nothing() {
    let fake = FakeSystem::new();
    fake.spawn(301, "backup.exe", 90.0, 2000);
    let engine = engine(&fake);

    engine.sample_tick().unwrap();
    assert!(engine.governor_tick().is_empty());
    assert!(fake.calls().is_empty());

    engine.set_governor_enabled(true);
    assert_eq!(engine.governor_tick().len(), 1);
}

#[test]
fn test_foreground_is_never_governed() {
    let fake = FakeSystem::new();
    fake.spawn(302, "game.exe", 95.0, 4000);
    fake.set_foreground(Some(302));

    let mut settings = settings();
    settings.governor_enabled = true;
    let engine = engine_with(&fake, settings);

    for _ in 0..3 {
        engine.sample_tick().unwrap();
        assert!(engine.governor_tick().is_empty());
    }
    assert!(fake.calls().is_empty());
}

#[test]
fn test_exited_process_records_are_dropped() {
    let fake = FakeSystem::new();
    fake.spawn(303, "chrome.exe", 40.0, 300);
    let engine = engine(&fake);

    engine.sample_tick().unwrap();
    engine.rules_tick();
    assert!(engine.has_revert(303));

    fake.vanish(303);
    engine.sample_tick().unwrap();
    assert!(!engine.has_revert(303));
    assert!(engine.snapshot().get(303).is_none());
}

#[test]
fn test_snapshot_publish_is_whole_tick() {
    let fake = FakeSystem::new();
    fake.spawn(304, "a.exe", 1.0, 10);
    let engine = engine(&fake);

    let first = engine.sample_tick().unwrap().unwrap();
    fake.spawn(305, "b.exe", 1.0, 10);
    let second = engine.sample_tick().unwrap().unwrap();

    // earlier readers keep their own consistent set
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 2);
    assert_eq!(second.tick, first.tick + 1);
    assert_eq!(engine.snapshot().tick, second.tick);
}

#[test]
fn test_governor_skips_process_that_gained_focus() {
    let fake = FakeSystem::new();
    fake.spawn(310, "render.exe", 70.0, 500);
    fake.spawn(311, "browser.exe", 50.0, 400);
    fake.set_foreground(Some(311));

    let mut settings = settings();
    settings.governor_enabled = true;
    let engine = engine_with(&fake, settings);
    engine.sample_tick().unwrap();

    // focus moves after the tick the governor works from
    fake.set_foreground(Some(310));
    let governed = engine.governor_tick();

    assert!(governed.is_empty());
    assert_eq!(fake.priority_of(310), Some(PriorityClass::Normal));
    assert!(!fake.process(310).unwrap().eco);

    // it is still a candidate once it loses focus again
    fake.set_foreground(Some(311));
    let governed = engine.governor_tick();
    assert_eq!(governed.len(), 1);
    assert_eq!(governed[0].pid, 310);
}

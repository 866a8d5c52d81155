// Profiles: power plan, governor flag and game-mode boost

use super::support::{engine, FakeSystem};
use corewarden::core::optimizer::{MemoryPriority, PowerPlan, PriorityClass};
use corewarden::WardenError;

#[test]
fn test_gaming_profile_boosts_foreground() {
    let fake = FakeSystem::new();
    fake.spawn(80, "game.exe", 70.0, 3000);
    fake.spawn(81, "launcher.exe", 2.0, 100);
    fake.set_foreground(Some(80));
    let engine = engine(&fake);
    engine.sample_tick().unwrap();

    let report = engine.apply_profile("gaming").unwrap();
    assert_eq!(report.profile.name, "Gaming");
    assert!(report.power_plan.is_ok());
    assert_eq!(fake.power_plan(), Some(PowerPlan::HighPerformance));
    assert!(engine.game_mode());
    assert!(engine.governor_enabled());

    let (pid, result) = report.boost.unwrap();
    assert_eq!(pid, 80);
    assert!(result.is_ok());
    assert_eq!(fake.priority_of(80), Some(PriorityClass::High));
    assert_eq!(fake.process(80).unwrap().memory_priority, MemoryPriority::Normal);
}

#[test]
fn test_game_mode_follows_new_foreground_once() {
    let fake = FakeSystem::new();
    fake.spawn(82, "game.exe", 70.0, 3000);
    fake.spawn(83, "chat.exe", 5.0, 200);
    fake.set_foreground(Some(82));
    let engine = engine(&fake);
    engine.sample_tick().unwrap();
    engine.apply_profile("Gaming").unwrap();

    fake.set_foreground(Some(83));
    engine.sample_tick().unwrap();
    assert_eq!(fake.priority_of(83), Some(PriorityClass::High));

    let boosts = fake.count_calls("set_priority 83");
    engine.sample_tick().unwrap();
    assert_eq!(fake.count_calls("set_priority 83"), boosts);
}

#[test]
fn test_everyday_profile_turns_game_mode_off() {
    let fake = FakeSystem::new();
    fake.spawn(84, "game.exe", 70.0, 3000);
    fake.set_foreground(Some(84));
    let engine = engine(&fake);
    engine.sample_tick().unwrap();

    engine.apply_profile("gaming").unwrap();
    let report = engine.apply_profile(" everyday ").unwrap();

    assert!(!engine.game_mode());
    assert!(!engine.governor_enabled());
    assert!(report.boost.is_none());
    assert_eq!(fake.power_plan(), Some(PowerPlan::Balanced));
    assert_eq!(engine.current_profile().unwrap().name, "Everyday");
    // earlier boost stays until reverted
    assert_eq!(fake.priority_of(84), Some(PriorityClass::High));
    engine.revert(84).unwrap();
    assert_eq!(fake.priority_of(84), Some(PriorityClass::Normal));
}

#[test]
fn test_unknown_profile_is_rejected() {
    let fake = FakeSystem::new();
    let engine = engine(&fake);

    assert!(matches!(engine.apply_profile("turbo"), Err(WardenError::Config(_))));
    assert!(engine.current_profile().is_none());
    assert!(fake.power_plan().is_none());
}

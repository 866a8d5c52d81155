// Rule evaluation through the engine

use super::support::{engine, engine_with, no_cooldown, settings, FakeSystem};
use corewarden::core::optimizer::{
    Action, PriorityClass, Rule, RuleAction, RuleCondition, RuleScope, Whitelist,
};

#[test]
fn test_cpu_condition_is_strict() {
    let fake = FakeSystem::new();
    fake.spawn(10, "chrome.exe", 30.0, 100);
    let engine = engine(&fake);

    engine.sample_tick().unwrap();
    assert!(engine.rules_tick().is_empty());

    fake.set_cpu(10, 30.5);
    engine.sample_tick().unwrap();
    assert_eq!(engine.rules_tick().len(), 1);
}

#[test]
fn test_background_scope_skips_foreground() {
    let fake = FakeSystem::new();
    fake.spawn(11, "chrome.exe", 70.0, 100);
    fake.set_foreground(Some(11));
    let engine = engine(&fake);

    engine.sample_tick().unwrap();
    assert!(engine.rules_tick().is_empty());
    assert_eq!(fake.priority_of(11), Some(PriorityClass::Normal));
}

#[test]
fn test_first_matching_rule_wins() {
    let fake = FakeSystem::new();
    fake.spawn(12, "chrome.exe", 50.0, 100);
    let engine = engine(&fake);

    let trim =
        Rule::new("chrome*", RuleScope::Always, RuleCondition::Always, RuleAction::Trim).unwrap();
    let index = engine.update_rules(|rules| Ok(rules.add(trim))).unwrap();
    assert_eq!(index, 2);

    engine.sample_tick().unwrap();
    let outcomes = engine.rules_tick();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].matched.action, Action::LowerPriority);

    engine
        .update_rules(|rules| rules.move_rule(index, 0))
        .unwrap();
    let engine_rules = engine.rules();
    assert_eq!(engine_rules.rules()[0].action, RuleAction::Trim);
}

#[test]
fn test_moved_rule_takes_precedence() {
    let fake = FakeSystem::new();
    fake.spawn(13, "chrome.exe", 50.0, 100);
    let mut settings = settings();
    let trim =
        Rule::new("chrome*", RuleScope::Always, RuleCondition::Always, RuleAction::Trim).unwrap();
    let index = settings.rules.add(trim);
    settings.rules.move_rule(index, 0).unwrap();
    let engine = engine_with(&fake, settings);

    engine.sample_tick().unwrap();
    let outcomes = engine.rules_tick();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].matched.action, Action::Trim);
    assert_eq!(fake.count_calls("trim 13"), 1);
    assert_eq!(fake.priority_of(13), Some(PriorityClass::Normal));
}

#[test]
fn test_invalid_edit_leaves_rules_unchanged() {
    let fake = FakeSystem::new();
    let engine = engine(&fake);
    let before = engine.rules();

    assert!(engine.update_rules(|rules| rules.remove(10)).is_err());
    assert_eq!(engine.rules(), before);
}

#[test]
fn test_whitelisted_process_never_matches() {
    let fake = FakeSystem::new();
    fake.spawn(14, "chrome.exe", 90.0, 100);
    let mut settings = settings();
    settings.policy.whitelist = Whitelist::new(["Chrome.exe"]);
    let engine = engine_with(&fake, settings);

    engine.sample_tick().unwrap();
    assert!(engine.rules_tick().is_empty());
}

#[test]
fn test_updater_rule_throttles_any_role() {
    let fake = FakeSystem::new();
    fake.spawn(15, "GoogleUpdater.exe", 0.5, 40);
    fake.set_foreground(Some(15));
    let engine = engine(&fake);

    engine.sample_tick().unwrap();
    let outcomes = engine.rules_tick();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].matched.action, Action::EcoThrottle);
    assert!(fake.process(15).unwrap().eco);
}

#[test]
fn test_rule_cooldown_limits_refiring() {
    let fake = FakeSystem::new();
    fake.spawn(16, "chrome.exe", 50.0, 100);
    let engine = engine(&fake);

    engine.sample_tick().unwrap();
    assert_eq!(engine.rules_tick().len(), 1);
    engine.sample_tick().unwrap();
    assert!(engine.rules_tick().is_empty());

    let fake = FakeSystem::new();
    fake.spawn(16, "chrome.exe", 50.0, 100);
    let engine = engine_with(&fake, no_cooldown(settings()));

    engine.sample_tick().unwrap();
    assert_eq!(engine.rules_tick().len(), 1);
    engine.sample_tick().unwrap();
    let again = engine.rules_tick();
    assert_eq!(again.len(), 1);
    assert!(!again[0].result.as_ref().unwrap().changed);
}

#[test]
fn test_leak_trend_rule() {
    let fake = FakeSystem::new();
    fake.spawn(17, "leaky.exe", 1.0, 100);
    let mut settings = settings();
    let rule =
        Rule::new("leaky", RuleScope::Always, RuleCondition::LeakTrend, RuleAction::Trim).unwrap();
    settings.rules.add(rule);
    let window = settings.health.window;
    let engine = engine_with(&fake, settings);

    for i in 0..window as u64 {
        fake.set_resident_mb(17, 100 + i * 20);
        engine.sample_tick().unwrap();
        if i + 1 < window as u64 {
            assert!(engine.rules_tick().is_empty());
        }
    }

    assert!(engine.health_flags(17).leak);
    let outcomes = engine.rules_tick();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].matched.action, Action::Trim);
}

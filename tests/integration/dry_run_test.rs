// Dry-run providers never reach the real setters

use super::support::{settings, FakeSystem};
use corewarden::core::optimizer::{
    Action, GroupingProvider, PowerPolicyProvider, PriorityClass, ProcessControlProvider,
    Providers,
};
use corewarden::platform::process::{DryRunControl, DryRunGrouping, DryRunPower};
use corewarden::Engine;
use std::sync::Arc;

fn dry_run_engine(fake: &Arc<FakeSystem>) -> Engine {
    let control: Arc<dyn ProcessControlProvider> = fake.clone();
    let power: Arc<dyn PowerPolicyProvider> = fake.clone();
    let grouping: Arc<dyn GroupingProvider> = fake.clone();
    let providers = Providers {
        info: fake.clone(),
        control: Arc::new(DryRunControl::new(control)),
        power: Arc::new(DryRunPower::new(power)),
        grouping: Arc::new(DryRunGrouping::new(grouping)),
    };
    Engine::new(providers, settings())
}

#[test]
fn test_dry_run_does_not_mutate() {
    let fake = FakeSystem::new();
    fake.spawn(90, "chrome.exe", 50.0, 1200);
    let engine = dry_run_engine(&fake);

    engine.sample_tick().unwrap();
    let outcomes = engine.rules_tick();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].result.as_ref().unwrap().changed);

    engine.apply(90, Action::Trim).unwrap();
    engine.apply(90, Action::EcoThrottle).unwrap();
    engine.apply(90, Action::Kill).unwrap();

    assert!(fake.calls().is_empty());
    let chrome = fake.process(90).unwrap();
    assert_eq!(chrome.priority, PriorityClass::Normal);
    assert!(!chrome.eco);
}

#[test]
fn test_dry_run_state_is_simulated_for_revert() {
    let fake = FakeSystem::new();
    fake.spawn(91, "app.exe", 5.0, 100);
    let engine = dry_run_engine(&fake);

    engine.apply(91, Action::SetPriority(PriorityClass::High)).unwrap();
    // the simulated value is visible, so a repeat is a no-op
    let again = engine.apply(91, Action::SetPriority(PriorityClass::High)).unwrap();
    assert!(!again.changed);

    let report = engine.revert(91).unwrap();
    assert_eq!(report.restored.len(), 1);
    assert!(fake.calls().is_empty());
}

//! Owned optimizer state and the tick functions that drive it.
//!
//! Each table has its own lock. A tick's snapshot set is built off to the side
//! and published with a single pointer swap, so readers never see a partial
//! tick. OS calls run without holding any table lock.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::advisor::{self, Advice, AdvisorThresholds, Suggestion};
use super::effects::{self, EffectSample, EffectsConfig, EffectsTracker};
use super::executor::{ActionExecutor, ActionReport, ExecutorConfig, Providers, RevertReport};
use super::governor::{GovernedProcess, Governor, GovernorPolicy};
use super::health::{HealthConfig, HealthFlags, HealthWatcher};
use super::journal::RevertRecord;
use super::profiles::{Profile, ProfileManager, ProfileReport};
use super::rules::{RuleMatch, RuleSet};
use super::sampler::Sampler;
use super::types::{Action, Capability, ProcessHandle, SnapshotSet};
use crate::error::Result;

/// Everything the engine is built from
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub health: HealthConfig,
    pub effects: EffectsConfig,
    pub executor: ExecutorConfig,
    pub policy: GovernorPolicy,
    pub rules: RuleSet,
    pub thresholds: AdvisorThresholds,
    pub governor_enabled: bool,
    /// Minimum gap before a rule fires the same action on the same process again
    pub rule_cooldown: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            health: HealthConfig::default(),
            effects: EffectsConfig::default(),
            executor: ExecutorConfig::default(),
            policy: GovernorPolicy::default(),
            rules: RuleSet::default(),
            thresholds: AdvisorThresholds::default(),
            governor_enabled: false,
            rule_cooldown: Duration::from_secs(60),
        }
    }
}

/// Result of submitting one rule match
#[derive(Debug)]
pub struct RuleOutcome {
    pub matched: RuleMatch,
    pub result: Result<ActionReport>,
}

pub struct Engine {
    executor: ActionExecutor,
    sampler: Mutex<Sampler>,
    snapshots: RwLock<Arc<SnapshotSet>>,
    health: Arc<Mutex<HealthWatcher>>,
    effects: Arc<Mutex<EffectsTracker>>,
    rules: RwLock<RuleSet>,
    policy: RwLock<GovernorPolicy>,
    thresholds: RwLock<AdvisorThresholds>,
    governor: Governor,
    profiles: ProfileManager,
    rule_cooldown: Duration,
    rule_fired: Mutex<HashMap<(ProcessHandle, Action), Instant>>,
}

impl Engine {
    pub fn new(providers: Providers, settings: EngineSettings) -> Self {
        let health = Arc::new(Mutex::new(HealthWatcher::new(settings.health)));
        let effects = Arc::new(Mutex::new(EffectsTracker::new(settings.effects)));
        let executor = ActionExecutor::new(
            providers,
            settings.executor,
            Arc::clone(&effects),
            Arc::clone(&health),
        );

        Self {
            executor,
            sampler: Mutex::new(Sampler::new()),
            snapshots: RwLock::new(Arc::new(SnapshotSet::default())),
            health,
            effects,
            rules: RwLock::new(settings.rules),
            policy: RwLock::new(settings.policy),
            thresholds: RwLock::new(settings.thresholds),
            governor: Governor::new(settings.governor_enabled),
            profiles: ProfileManager::new(),
            rule_cooldown: settings.rule_cooldown,
            rule_fired: Mutex::new(HashMap::new()),
        }
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    // ---- ticks ----

    /// Sample the process table and publish the result.
    ///
    /// Returns `Ok(None)` when a previous sample is still running.
    pub fn sample_tick(&self) -> Result<Option<Arc<SnapshotSet>>> {
        let Some(mut sampler) = self.sampler.try_lock() else {
            log::debug!("Sampler busy, skipping tick");
            return Ok(None);
        };

        let previous = self.snapshot();
        let set = Arc::new(sampler.sample(self.executor.info(), &previous)?);
        drop(sampler);

        self.health.lock().observe_all(&set);
        self.executor.forget_exited(&set);
        *self.snapshots.write() = Arc::clone(&set);
        log::trace!("Published tick {} ({} processes)", set.tick, set.len());

        self.profiles.follow_foreground(&set, &self.executor);
        Ok(Some(set))
    }

    /// Evaluate the rule set against the latest tick and submit the matches
    pub fn rules_tick(&self) -> Vec<RuleOutcome> {
        let set = self.snapshot();
        let matches = {
            let rules = self.rules.read();
            let policy = self.policy.read();
            let health = self.health.lock();
            rules.evaluate(&set, &health, &policy.whitelist)
        };

        let now = Instant::now();
        let mut outcomes = Vec::new();
        for matched in matches {
            let Some(handle) = set.get(matched.pid).map(|p| p.handle()) else {
                continue;
            };
            if !self.rule_due(handle, matched.action, now, &set) {
                continue;
            }

            let result = self.executor.apply(matched.pid, matched.action);
            match &result {
                Ok(report) if report.changed => log::info!(
                    "[Rule] {} -> PID {} ({})",
                    matched.action,
                    matched.pid,
                    matched.name
                ),
                Ok(_) => {}
                Err(e) => log::debug!(
                    "[Rule] {} on PID {} failed: {}",
                    matched.action,
                    matched.pid,
                    e
                ),
            }
            outcomes.push(RuleOutcome { matched, result });
        }
        outcomes
    }

    fn rule_due(
        &self,
        handle: ProcessHandle,
        action: Action,
        now: Instant,
        set: &SnapshotSet,
    ) -> bool {
        let mut fired = self.rule_fired.lock();
        fired.retain(|(h, _), _| set.contains_handle(h));
        match fired.get(&(handle, action)) {
            Some(last) if now.duration_since(*last) < self.rule_cooldown => false,
            _ => {
                fired.insert((handle, action), now);
                true
            }
        }
    }

    pub fn governor_tick(&self) -> Vec<GovernedProcess> {
        let set = self.snapshot();
        let policy = self.policy.read().clone();
        self.governor.tick(&set, &policy, &self.executor)
    }

    /// Complete effects measurements whose follow-up is due
    pub fn effects_tick(&self) -> Vec<EffectSample> {
        effects::finalize_due(&self.effects, self.executor.info(), Instant::now())
    }

    // ---- user operations ----

    pub fn apply(&self, pid: u32, action: Action) -> Result<ActionReport> {
        self.executor.apply(pid, action)
    }

    pub fn revert(&self, pid: u32) -> Result<RevertReport> {
        self.executor.revert(pid)
    }

    pub fn revert_all(&self) -> Vec<(u32, Result<RevertReport>)> {
        self.executor.revert_all()
    }

    pub fn advise(&self) -> Advice {
        let set = self.snapshot();
        let thresholds = self.thresholds.read().clone();
        let policy = self.policy.read();
        let health = self.health.lock();
        advisor::scan(&set, &health, &thresholds, &policy.whitelist)
    }

    pub fn apply_suggestions(
        &self,
        selection: &[Suggestion],
    ) -> Vec<(Suggestion, Result<ActionReport>)> {
        advisor::apply(&self.executor, selection)
    }

    pub fn apply_all_safe(&self, advice: &Advice) -> Vec<(Suggestion, Result<ActionReport>)> {
        advisor::apply_all_safe(&self.executor, advice)
    }

    pub fn apply_profile(&self, name: &str) -> Result<ProfileReport> {
        let set = self.snapshot();
        self.profiles.apply(name, &self.executor, &self.governor, &set)
    }

    // ---- settings ----

    pub fn rules(&self) -> RuleSet {
        self.rules.read().clone()
    }

    /// Edit the rule set in place; the closure's error leaves it unchanged
    pub fn update_rules<F, T>(&self, edit: F) -> Result<T>
    where
        F: FnOnce(&mut RuleSet) -> Result<T>,
    {
        let mut rules = self.rules.write();
        let mut draft = rules.clone();
        let out = edit(&mut draft)?;
        *rules = draft;
        Ok(out)
    }

    pub fn policy(&self) -> GovernorPolicy {
        self.policy.read().clone()
    }

    pub fn set_policy(&self, policy: GovernorPolicy) {
        *self.policy.write() = policy;
    }

    pub fn thresholds(&self) -> AdvisorThresholds {
        self.thresholds.read().clone()
    }

    pub fn set_thresholds(&self, thresholds: AdvisorThresholds) {
        *self.thresholds.write() = thresholds;
    }

    pub fn set_governor_enabled(&self, enabled: bool) {
        self.governor.set_enabled(enabled);
    }

    pub fn governor_enabled(&self) -> bool {
        self.governor.is_enabled()
    }

    // ---- read views ----

    pub fn snapshot(&self) -> Arc<SnapshotSet> {
        Arc::clone(&self.snapshots.read())
    }

    pub fn health_flags(&self, pid: u32) -> HealthFlags {
        self.health.lock().flag_set(pid)
    }

    pub fn has_revert(&self, pid: u32) -> bool {
        self.executor.has_revert(pid)
    }

    pub fn revert_record(&self, pid: u32) -> Option<RevertRecord> {
        self.executor.revert_record(pid)
    }

    pub fn tracked_pids(&self) -> Vec<u32> {
        self.executor.tracked_pids()
    }

    /// Revert baselines, for persisting between invocations
    pub fn journal_records(&self) -> Vec<RevertRecord> {
        self.executor.journal_records()
    }

    /// Adopt saved baselines of processes that are still running
    pub fn restore_journal(&self, records: Vec<RevertRecord>) -> usize {
        self.executor.restore_journal(records)
    }

    pub fn effects_history(&self) -> Vec<EffectSample> {
        self.effects.lock().history()
    }

    pub fn pending_effects(&self) -> usize {
        self.effects.lock().pending_count()
    }

    /// Seed effects history, e.g. from a previous session's export
    pub fn restore_effects(&self, samples: Vec<EffectSample>) {
        self.effects.lock().restore(samples);
    }

    pub fn capability_gaps(&self) -> Vec<Capability> {
        self.executor.capability_gaps()
    }

    pub fn game_mode(&self) -> bool {
        self.profiles.game_mode()
    }

    pub fn current_profile(&self) -> Option<Profile> {
        self.profiles.current()
    }
}

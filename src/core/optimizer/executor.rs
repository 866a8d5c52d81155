//! Applies resource-control actions and restores captured baselines.
//!
//! Every mutating action records the attribute's original value in the
//! [`RevertJournal`] before the first change, and every successful action
//! starts an effects measurement.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::effects::EffectsTracker;
use super::health::HealthWatcher;
use super::journal::{RevertJournal, RevertRecord};
use super::providers::{
    Capabilities, GroupingProvider, PowerPolicyProvider, ProcessControlProvider,
    ProcessInfoProvider,
};
use super::sampler;
use super::types::{
    Action, Attribute, AttributeValue, Capability, PriorityClass, ProcessEntry, ProcessHandle,
    ProcessSnapshot, Role, SnapshotSet,
};
use super::whitelist;
use crate::error::{Result, WardenError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_backoff_ms: 50,
        }
    }
}

/// Outcome of a successful [`ActionExecutor::apply`]
#[derive(Debug, Clone, PartialEq)]
pub struct ActionReport {
    pub pid: u32,
    pub name: String,
    pub action: Action,
    /// False when the target value was already in place
    pub changed: bool,
    pub previous: Option<AttributeValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RevertReport {
    pub pid: u32,
    pub restored: Vec<AttributeValue>,
}

/// Everything the executor needs from the OS
#[derive(Clone)]
pub struct Providers {
    pub info: Arc<dyn ProcessInfoProvider>,
    pub control: Arc<dyn ProcessControlProvider>,
    pub power: Arc<dyn PowerPolicyProvider>,
    pub grouping: Arc<dyn GroupingProvider>,
}

pub struct ActionExecutor {
    providers: Providers,
    capabilities: Capabilities,
    config: ExecutorConfig,
    journal: Mutex<RevertJournal>,
    effects: Arc<Mutex<EffectsTracker>>,
    health: Arc<Mutex<HealthWatcher>>,
    reported_gaps: Mutex<HashSet<Capability>>,
    // serializes read-capture-mutate sequences
    mutation: Mutex<()>,
}

impl ActionExecutor {
    pub fn new(
        providers: Providers,
        config: ExecutorConfig,
        effects: Arc<Mutex<EffectsTracker>>,
        health: Arc<Mutex<HealthWatcher>>,
    ) -> Self {
        let capabilities = Capabilities::probe(providers.grouping.as_ref());
        if !capabilities.throttled_group {
            log::info!("Throttled process grouping unavailable, using per-process throttling");
        }

        Self {
            providers,
            capabilities,
            config,
            journal: Mutex::new(RevertJournal::new()),
            effects,
            health,
            reported_gaps: Mutex::new(HashSet::new()),
            mutation: Mutex::new(()),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn info(&self) -> &dyn ProcessInfoProvider {
        self.providers.info.as_ref()
    }

    pub fn power(&self) -> &dyn PowerPolicyProvider {
        self.providers.power.as_ref()
    }

    /// Apply `action` to `pid`
    pub fn apply(&self, pid: u32, action: Action) -> Result<ActionReport> {
        let entry = self.providers.info.open(pid)?;
        if whitelist::is_protected(pid, &entry.name) {
            return Err(WardenError::protected(entry.name));
        }

        let handle = entry.handle;
        let before = match sampler::probe(self.info(), &handle, &entry.name) {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_process_gone() => return Err(WardenError::ProcessNotFound(pid)),
            Err(_) => degraded_snapshot(&entry),
        };

        let result = self.dispatch(&handle, action);
        let (changed, previous) = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.report_gap(&e);
                return Err(match e {
                    WardenError::ProcessNotFound(_) => WardenError::ProcessNotFound(pid),
                    other => other,
                });
            }
        };

        log::debug!(
            "Applied {} to PID {} ({}){}",
            action,
            pid,
            entry.name,
            if changed { "" } else { " [already in place]" }
        );
        self.effects.lock().begin(handle, action, before);

        Ok(ActionReport {
            pid,
            name: entry.name,
            action,
            changed,
            previous,
        })
    }

    fn dispatch(
        &self,
        handle: &ProcessHandle,
        action: Action,
    ) -> Result<(bool, Option<AttributeValue>)> {
        let control = self.providers.control.as_ref();
        let power = self.providers.power.as_ref();

        match action {
            Action::SetPriority(target) => {
                let _guard = self.mutation.lock();
                let current = control.priority(handle)?;
                self.mutate_priority(handle, current, target)
            }
            Action::LowerPriority => {
                let _guard = self.mutation.lock();
                let current = control.priority(handle)?;
                self.mutate_priority(handle, current, current.min(PriorityClass::BelowNormal))
            }
            Action::SetMemoryPriority(target) => {
                let _guard = self.mutation.lock();
                let current = control.memory_priority(handle)?;
                self.mutate(
                    handle,
                    AttributeValue::MemoryPriority(current),
                    AttributeValue::MemoryPriority(target),
                    || control.set_memory_priority(handle, target),
                )
            }
            Action::SetAffinity(mask) => {
                if mask == 0 {
                    return Err(WardenError::other("affinity mask selects no CPU"));
                }
                let _guard = self.mutation.lock();
                let current = control.affinity(handle)?;
                self.mutate(
                    handle,
                    AttributeValue::Affinity(current),
                    AttributeValue::Affinity(mask),
                    || control.set_affinity(handle, mask),
                )
            }
            Action::EcoThrottle => {
                let _guard = self.mutation.lock();
                let current = power.throttle_policy(handle)?;
                self.mutate(
                    handle,
                    AttributeValue::EcoThrottle(current),
                    AttributeValue::EcoThrottle(true),
                    || power.set_throttle_policy(handle, true),
                )
            }
            Action::Trim => control.trim_working_set(handle).map(|_| (true, None)),
            Action::AssignThrottledGroup => {
                if !self.capabilities.throttled_group {
                    return Err(WardenError::unsupported(Capability::ThrottledGroup));
                }
                self.providers
                    .grouping
                    .assign_to_throttled_group(handle)
                    .map(|_| (true, None))
            }
            Action::Suspend => control.suspend(handle).map(|_| (true, None)),
            Action::Resume => control.resume(handle).map(|_| (true, None)),
            Action::Kill => {
                control.kill(handle)?;
                self.journal.lock().purge(handle.pid);
                self.health.lock().forget(handle.pid);
                Ok((true, None))
            }
        }
    }

    /// Priority change whose baseline is the exact native value when the
    /// platform has one
    fn mutate_priority(
        &self,
        handle: &ProcessHandle,
        current: PriorityClass,
        target: PriorityClass,
    ) -> Result<(bool, Option<AttributeValue>)> {
        if current == target {
            return Ok((false, Some(AttributeValue::Priority(current))));
        }
        let control = self.providers.control.as_ref();
        let baseline = match control.native_priority(handle)? {
            Some(native) => AttributeValue::NativePriority(native),
            None => AttributeValue::Priority(current),
        };
        self.mutate(handle, baseline, AttributeValue::Priority(target), || {
            control.set_priority(handle, target)
        })
    }

    /// Capture the baseline if absent, then change the attribute
    fn mutate<F>(
        &self,
        handle: &ProcessHandle,
        current: AttributeValue,
        target: AttributeValue,
        set: F,
    ) -> Result<(bool, Option<AttributeValue>)>
    where
        F: FnOnce() -> Result<()>,
    {
        if current == target {
            return Ok((false, Some(current)));
        }

        let inserted = self.journal.lock().capture(handle, current);
        if let Err(e) = set() {
            if inserted {
                self.journal.lock().discard(handle.pid, current.attribute());
            }
            return Err(e);
        }
        Ok((true, Some(current)))
    }

    /// Restore every attribute recorded for `pid`
    pub fn revert(&self, pid: u32) -> Result<RevertReport> {
        let record = self
            .journal
            .lock()
            .get(pid)
            .cloned()
            .ok_or(WardenError::NothingToRevert(pid))?;
        let handle = record.handle();

        match self.providers.info.open(pid) {
            Ok(entry) if entry.handle == handle => {}
            Ok(_) | Err(WardenError::ProcessNotFound(_)) => {
                self.journal.lock().purge(pid);
                return Err(WardenError::ProcessNotFound(pid));
            }
            Err(e) => return Err(e),
        }

        let _guard = self.mutation.lock();
        let mut restored = Vec::new();
        let mut failed = Vec::new();

        for (attribute, value) in record.originals {
            match self.with_retry(|| self.restore(&handle, value)) {
                Ok(()) => {
                    self.journal.lock().restored(pid, attribute);
                    restored.push(value);
                }
                Err(e) if e.is_process_gone() => {
                    self.journal.lock().purge(pid);
                    return Err(WardenError::ProcessNotFound(pid));
                }
                Err(e) => {
                    log::warn!("Could not restore {} on PID {}: {}", attribute, pid, e);
                    self.report_gap(&e);
                    failed.push(attribute);
                }
            }
        }

        if failed.is_empty() {
            log::debug!("Reverted PID {} ({} attribute(s))", pid, restored.len());
            Ok(RevertReport { pid, restored })
        } else {
            Err(WardenError::PartialRevert { pid, failed })
        }
    }

    /// Revert every tracked process, e.g. on shutdown
    pub fn revert_all(&self) -> Vec<(u32, Result<RevertReport>)> {
        let pids = self.journal.lock().pids();
        pids.into_iter().map(|pid| (pid, self.revert(pid))).collect()
    }

    fn restore(&self, handle: &ProcessHandle, value: AttributeValue) -> Result<()> {
        let control = self.providers.control.as_ref();
        match value {
            AttributeValue::Priority(p) => control.set_priority(handle, p),
            AttributeValue::NativePriority(n) => control.set_native_priority(handle, n),
            AttributeValue::MemoryPriority(m) => control.set_memory_priority(handle, m),
            AttributeValue::Affinity(mask) => control.set_affinity(handle, mask),
            AttributeValue::EcoThrottle(on) => {
                self.providers.power.set_throttle_policy(handle, on)
            }
        }
    }

    fn with_retry<F>(&self, mut call: F) -> Result<()>
    where
        F: FnMut() -> Result<()>,
    {
        let attempts = self.config.retry_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call() {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < attempts => {
                    log::debug!("Transient failure (attempt {}/{}): {}", attempt, attempts, e);
                    std::thread::sleep(Duration::from_millis(
                        self.config.retry_backoff_ms * attempt as u64,
                    ));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Warn about a missing capability once, then stay quiet
    fn report_gap(&self, error: &WardenError) {
        if let WardenError::Unsupported(capability) = error {
            if self.reported_gaps.lock().insert(*capability) {
                log::warn!("{} is not available on this system; skipping", capability);
            } else {
                log::debug!("{} unavailable (already reported)", capability);
            }
        }
    }

    pub fn capability_gaps(&self) -> Vec<Capability> {
        self.reported_gaps.lock().iter().copied().collect()
    }

    pub fn has_revert(&self, pid: u32) -> bool {
        self.journal.lock().has_record(pid)
    }

    pub fn revert_record(&self, pid: u32) -> Option<RevertRecord> {
        self.journal.lock().get(pid).cloned()
    }

    pub fn journal_records(&self) -> Vec<RevertRecord> {
        self.journal.lock().records()
    }

    /// Adopt baselines saved by an earlier session.
    ///
    /// Records whose pid is gone or now names a different process are
    /// dropped. The liveness check runs before the journal lock is taken.
    pub fn restore_journal(&self, records: Vec<RevertRecord>) -> usize {
        let live: HashSet<ProcessHandle> = records
            .iter()
            .filter_map(|r| match self.providers.info.open(r.pid) {
                Ok(entry) if entry.handle == r.handle() => Some(entry.handle),
                _ => None,
            })
            .collect();
        let total = records.len();
        let adopted = self.journal.lock().adopt(records, |h| live.contains(h));
        if adopted < total {
            log::debug!("Discarded {} stale revert record(s)", total - adopted);
        }
        adopted
    }

    pub fn tracked_pids(&self) -> Vec<u32> {
        self.journal.lock().pids()
    }

    pub fn original(&self, pid: u32, attribute: Attribute) -> Option<AttributeValue> {
        self.journal.lock().original(pid, attribute)
    }

    /// Drop records of processes absent from the latest tick
    pub fn forget_exited(&self, set: &SnapshotSet) {
        let removed = self.journal.lock().retain_live(set);
        if removed > 0 {
            log::debug!("Dropped {} revert record(s) for exited processes", removed);
        }
    }
}

fn degraded_snapshot(entry: &ProcessEntry) -> ProcessSnapshot {
    ProcessSnapshot {
        pid: entry.handle.pid,
        start_time: entry.handle.start_time,
        name: entry.name.clone(),
        cpu_percent: 0.0,
        resident_bytes: 0,
        role: Role::Background,
        degraded: true,
        timestamp: chrono::Utc::now(),
    }
}

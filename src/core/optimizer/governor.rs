use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use super::executor::ActionExecutor;
use super::types::{Action, MemoryPriority, ProcessHandle, ProcessSnapshot, Role, SnapshotSet};
use super::whitelist::{self, Whitelist};
use crate::error::Result;

/// Thresholds and exclusions for background throttling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorPolicy {
    pub eco_cpu_threshold: f32,
    pub eco_mem_threshold_mb: f64,
    #[serde(default)]
    pub whitelist: Whitelist,
}

impl Default for GovernorPolicy {
    fn default() -> Self {
        Self {
            eco_cpu_threshold: 30.0,
            eco_mem_threshold_mb: 800.0,
            whitelist: Whitelist::default(),
        }
    }
}

impl GovernorPolicy {
    pub fn exceeds(&self, snapshot: &ProcessSnapshot) -> bool {
        snapshot.cpu_percent >= self.eco_cpu_threshold
            || snapshot.resident_mb() >= self.eco_mem_threshold_mb
    }
}

/// Result of governing one process
#[derive(Debug)]
pub struct GovernedProcess {
    pub pid: u32,
    pub name: String,
    pub outcomes: Vec<(Action, Result<bool>)>,
}

/// Continuous demotion of heavy background processes.
///
/// A process is governed once per lifetime. Reverting it afterwards sticks
/// until the process restarts.
#[derive(Debug, Default)]
pub struct Governor {
    enabled: AtomicBool,
    governed: Mutex<HashSet<ProcessHandle>>,
}

impl Governor {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            governed: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::Relaxed);
        if was != enabled {
            log::info!("Background governor {}", if enabled { "enabled" } else { "disabled" });
        }
    }

    pub fn is_governed(&self, handle: &ProcessHandle) -> bool {
        self.governed.lock().contains(handle)
    }

    /// Processes the policy would throttle in this tick
    pub fn candidates<'a>(
        &self,
        set: &'a SnapshotSet,
        policy: &GovernorPolicy,
    ) -> Vec<&'a ProcessSnapshot> {
        let governed = self.governed.lock();
        set.iter()
            .filter(|p| p.role == Role::Background && set.foreground != Some(p.pid))
            .filter(|p| !policy.whitelist.excludes(&p.name))
            .filter(|p| !whitelist::is_protected(p.pid, &p.name))
            .filter(|p| !governed.contains(&p.handle()))
            .filter(|p| policy.exceeds(p))
            .collect()
    }

    /// One governor pass over the latest tick
    pub fn tick(
        &self,
        set: &SnapshotSet,
        policy: &GovernorPolicy,
        executor: &ActionExecutor,
    ) -> Vec<GovernedProcess> {
        self.governed.lock().retain(|h| set.contains_handle(h));
        if !self.is_enabled() {
            return Vec::new();
        }

        let mut actions = vec![
            Action::LowerPriority,
            Action::SetMemoryPriority(MemoryPriority::Low),
            Action::EcoThrottle,
        ];
        if executor.capabilities().throttled_group {
            actions.push(Action::AssignThrottledGroup);
        }

        let mut results = Vec::new();
        for snapshot in self.candidates(set, policy) {
            // focus may have moved since the tick was taken
            if executor.info().is_foreground(&snapshot.handle()) {
                log::debug!(
                    "PID {} ({}) is now in the foreground, not governing",
                    snapshot.pid,
                    snapshot.name
                );
                continue;
            }

            let outcomes: Vec<(Action, Result<bool>)> = actions
                .iter()
                .map(|action| {
                    let outcome = executor.apply(snapshot.pid, *action).map(|r| r.changed);
                    (*action, outcome)
                })
                .collect();

            let applied = outcomes.iter().filter(|(_, r)| r.is_ok()).count();
            if applied > 0 {
                log::info!(
                    "Governor throttled PID {} ({}): cpu {:.1}%, {:.0} MB",
                    snapshot.pid,
                    snapshot.name,
                    snapshot.cpu_percent,
                    snapshot.resident_mb()
                );
            }
            for (action, outcome) in &outcomes {
                if let Err(e) = outcome {
                    log::debug!("Governor {} on PID {} failed: {}", action, snapshot.pid, e);
                }
            }

            self.governed.lock().insert(snapshot.handle());
            results.push(GovernedProcess {
                pid: snapshot.pid,
                name: snapshot.name.clone(),
                outcomes,
            });
        }
        results
    }
}

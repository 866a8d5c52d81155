//! Before/after measurement of applied actions.
//!
//! A measurement starts with the snapshot taken just before the mutation and
//! completes once its follow-up is due. The follow-up probe itself runs
//! outside the tracker so the OS call never happens under the table lock.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use super::providers::ProcessInfoProvider;
use super::sampler;
use super::types::{Action, ProcessHandle, ProcessSnapshot};

const DEFAULT_HISTORY_CAP: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectsConfig {
    pub delay_ms: u64,
    pub history_cap: usize,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            delay_ms: 3_000,
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }
}

impl EffectsConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EffectOutcome {
    Measured {
        delta_cpu: f32,
        delta_resident_bytes: i64,
    },
    /// The process exited before the follow-up sample
    Terminated,
    /// Still running, but its metrics could not be read before or after
    Unmeasured,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectSample {
    pub pid: u32,
    pub name: String,
    pub action: Action,
    pub before: ProcessSnapshot,
    pub after: Option<ProcessSnapshot>,
    pub outcome: EffectOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl EffectSample {
    pub fn summary(&self) -> String {
        match &self.outcome {
            EffectOutcome::Measured {
                delta_cpu,
                delta_resident_bytes,
            } => format!(
                "{} on PID {} ({}): CPU {:+.1}%, MEM {:+.0} MB",
                self.action,
                self.pid,
                self.name,
                delta_cpu,
                *delta_resident_bytes as f64 / (1024.0 * 1024.0)
            ),
            EffectOutcome::Terminated => format!(
                "{} on PID {} ({}): process terminated",
                self.action, self.pid, self.name
            ),
            EffectOutcome::Unmeasured => format!(
                "{} on PID {} ({}): metrics unavailable",
                self.action, self.pid, self.name
            ),
        }
    }
}

/// A measurement waiting for its follow-up sample
#[derive(Debug, Clone)]
pub struct PendingEffect {
    pub handle: ProcessHandle,
    pub action: Action,
    pub before: ProcessSnapshot,
    pub started_at: DateTime<Utc>,
    pub due: Instant,
}

#[derive(Debug)]
pub struct EffectsTracker {
    config: EffectsConfig,
    pending: HashMap<(ProcessHandle, Action), PendingEffect>,
    history: VecDeque<EffectSample>,
}

impl EffectsTracker {
    pub fn new(config: EffectsConfig) -> Self {
        Self {
            config: EffectsConfig {
                history_cap: config.history_cap.max(1),
                ..config
            },
            pending: HashMap::new(),
            history: VecDeque::new(),
        }
    }

    /// Start (or restart) the measurement for `action` on `handle`
    pub fn begin(&mut self, handle: ProcessHandle, action: Action, before: ProcessSnapshot) {
        let due = Instant::now() + self.config.delay();
        self.pending.insert(
            (handle, action),
            PendingEffect {
                handle,
                action,
                before,
                started_at: Utc::now(),
                due,
            },
        );
    }

    /// Remove and return every measurement due at `now`
    pub fn take_due(&mut self, now: Instant) -> Vec<PendingEffect> {
        let keys: Vec<_> = self
            .pending
            .iter()
            .filter(|(_, p)| p.due <= now)
            .map(|(k, _)| *k)
            .collect();
        keys.into_iter()
            .filter_map(|k| self.pending.remove(&k))
            .collect()
    }

    pub fn record(&mut self, sample: EffectSample) {
        if self.history.len() >= self.config.history_cap {
            self.history.pop_front();
        }
        self.history.push_back(sample);
    }

    /// Seed history from a previous session, keeping the newest entries
    pub fn restore(&mut self, samples: Vec<EffectSample>) {
        for sample in samples {
            self.record(sample);
        }
    }

    pub fn history(&self) -> Vec<EffectSample> {
        self.history.iter().cloned().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, pid: u32) -> bool {
        self.pending.keys().any(|(h, _)| h.pid == pid)
    }
}

impl Default for EffectsTracker {
    fn default() -> Self {
        Self::new(EffectsConfig::default())
    }
}

/// Complete every due measurement and append it to the history.
///
/// The tracker lock is released while probing.
pub fn finalize_due(
    tracker: &Mutex<EffectsTracker>,
    info: &dyn ProcessInfoProvider,
    now: Instant,
) -> Vec<EffectSample> {
    let due = tracker.lock().take_due(now);
    if due.is_empty() {
        return Vec::new();
    }

    let samples: Vec<EffectSample> = due.into_iter().map(|p| complete(info, p)).collect();
    let mut tracker = tracker.lock();
    for sample in &samples {
        log::info!("Effect: {}", sample.summary());
        tracker.record(sample.clone());
    }
    samples
}

/// Take the follow-up sample for a pending measurement.
///
/// Only a process that is gone counts as terminated. Any other sampling failure,
/// or a degraded baseline, leaves the sample unmeasured.
pub fn complete(info: &dyn ProcessInfoProvider, pending: PendingEffect) -> EffectSample {
    let finished_at = Utc::now();
    let (after, outcome) = match sampler::probe(info, &pending.handle, &pending.before.name) {
        Ok(after) if pending.before.degraded => (Some(after), EffectOutcome::Unmeasured),
        Ok(after) => {
            let outcome = EffectOutcome::Measured {
                delta_cpu: after.cpu_percent - pending.before.cpu_percent,
                delta_resident_bytes: after.resident_bytes as i64
                    - pending.before.resident_bytes as i64,
            };
            (Some(after), outcome)
        }
        Err(e) if e.is_process_gone() => (None, EffectOutcome::Terminated),
        Err(e) => {
            log::debug!("follow-up sample for pid {} failed: {}", pending.handle.pid, e);
            (None, EffectOutcome::Unmeasured)
        }
    };

    EffectSample {
        pid: pending.handle.pid,
        name: pending.before.name.clone(),
        action: pending.action,
        before: pending.before,
        after,
        outcome,
        started_at: pending.started_at,
        finished_at,
    }
}

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use super::types::{ProcessSnapshot, SnapshotSet};

const DEFAULT_WINDOW: usize = 8;

/// Thresholds for trend detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    pub window: usize,              // ticks kept per process
    pub leak_min_growth: f64,       // net growth over the window (0.10 = 10%)
    pub leak_rising_fraction: f64,  // share of steps that must strictly increase
    pub spike_cpu_percent: f32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            leak_min_growth: 0.10,
            leak_rising_fraction: 0.6,
            spike_cpu_percent: 35.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthFlag {
    #[default]
    Normal,
    Leak,
    Spike,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthFlags {
    pub leak: bool,
    pub spike: bool,
}

impl HealthFlags {
    /// Leak wins over Spike: it is the longer-lived condition
    pub fn primary(&self) -> HealthFlag {
        if self.leak {
            HealthFlag::Leak
        } else if self.spike {
            HealthFlag::Spike
        } else {
            HealthFlag::Normal
        }
    }

    pub fn labels(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.leak {
            out.push("leak");
        }
        if self.spike {
            out.push("spike");
        }
        out
    }
}

#[derive(Debug, Clone)]
struct ProcessHistory {
    start_time: u64,
    samples: VecDeque<ProcessSnapshot>,
    flags: HealthFlags,
}

/// Rolling per-process history with derived health flags
#[derive(Debug, Clone)]
pub struct HealthWatcher {
    config: HealthConfig,
    histories: HashMap<u32, ProcessHistory>,
}

impl HealthWatcher {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config: HealthConfig {
                window: config.window.max(2),
                ..config
            },
            histories: HashMap::new(),
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Append a snapshot to its process history and recompute flags
    pub fn observe(&mut self, snapshot: &ProcessSnapshot) {
        let window = self.config.window;
        let history = self
            .histories
            .entry(snapshot.pid)
            .or_insert_with(|| ProcessHistory {
                start_time: snapshot.start_time,
                samples: VecDeque::with_capacity(window),
                flags: HealthFlags::default(),
            });

        // pid reused by a new process
        if history.start_time != snapshot.start_time {
            history.start_time = snapshot.start_time;
            history.samples.clear();
        }

        if let Some(last) = history.samples.back() {
            if snapshot.timestamp < last.timestamp {
                return;
            }
        }

        if history.samples.len() >= window {
            history.samples.pop_front();
        }
        history.samples.push_back(snapshot.clone());

        history.flags = HealthFlags {
            leak: is_leaking(&history.samples, &self.config),
            spike: snapshot.cpu_percent >= self.config.spike_cpu_percent,
        };
    }

    /// Observe a whole tick and forget processes that are gone
    pub fn observe_all(&mut self, set: &SnapshotSet) {
        for snapshot in set.iter() {
            self.observe(snapshot);
        }
        self.prune(set);
    }

    pub fn prune(&mut self, set: &SnapshotSet) {
        self.histories.retain(|pid, h| {
            set.get(*pid)
                .is_some_and(|p| p.start_time == h.start_time)
        });
    }

    pub fn forget(&mut self, pid: u32) {
        self.histories.remove(&pid);
    }

    pub fn flags(&self, pid: u32) -> HealthFlag {
        self.flag_set(pid).primary()
    }

    pub fn flag_set(&self, pid: u32) -> HealthFlags {
        self.histories
            .get(&pid)
            .map(|h| h.flags)
            .unwrap_or_default()
    }

    pub fn history_len(&self, pid: u32) -> usize {
        self.histories.get(&pid).map(|h| h.samples.len()).unwrap_or(0)
    }

    pub fn tracked(&self) -> usize {
        self.histories.len()
    }
}

impl Default for HealthWatcher {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}

/// Sustained growth across the whole window.
///
/// A burst that subsides leaves `last` near `first`, and a single jump
/// produces only one rising step, so neither qualifies.
fn is_leaking(samples: &VecDeque<ProcessSnapshot>, config: &HealthConfig) -> bool {
    if samples.len() < config.window {
        return false;
    }

    let values: Vec<f64> = samples.iter().map(|s| s.resident_bytes as f64).collect();
    let first = values[0];
    let last = values[values.len() - 1];
    if first <= 0.0 || last < first * (1.0 + config.leak_min_growth) {
        return false;
    }

    let half = values.len() / 2;
    let mean = |slice: &[f64]| slice.iter().sum::<f64>() / slice.len() as f64;
    if mean(&values[values.len() - half..]) <= mean(&values[..half]) {
        return false;
    }

    let steps = values.len() - 1;
    let rising = values.windows(2).filter(|w| w[1] > w[0]).count();
    rising as f64 >= (steps as f64 * config.leak_rising_fraction).ceil()
}

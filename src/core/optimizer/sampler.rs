use chrono::Utc;
use std::collections::BTreeMap;

use super::providers::ProcessInfoProvider;
use super::types::{ProcessEntry, ProcessHandle, ProcessSnapshot, Role, SnapshotSet};
use crate::error::{Result, WardenError};

/// Builds a complete [`SnapshotSet`] from the process table
#[derive(Debug, Default)]
pub struct Sampler {
    tick: u64,
}

impl Sampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerate and measure every live process.
    ///
    /// Processes that vanish mid-tick are dropped. Processes we may not query
    /// keep their previous values (or zero) and are flagged degraded. Only a
    /// failed enumeration fails the tick.
    pub fn sample(
        &mut self,
        info: &dyn ProcessInfoProvider,
        previous: &SnapshotSet,
    ) -> Result<SnapshotSet> {
        let entries = info.list()?;
        let timestamp = Utc::now();
        self.tick += 1;

        let mut processes = BTreeMap::new();
        let mut foreground = None;

        for entry in entries {
            let prior = previous
                .get(entry.handle.pid)
                .filter(|p| p.start_time == entry.handle.start_time);

            let Some(snapshot) = measure(info, &entry, prior, timestamp) else {
                continue;
            };
            if snapshot.role == Role::Foreground {
                foreground = Some(snapshot.pid);
            }
            processes.insert(snapshot.pid, snapshot);
        }

        Ok(SnapshotSet {
            tick: self.tick,
            taken_at: Some(timestamp),
            foreground,
            processes,
        })
    }
}

fn measure(
    info: &dyn ProcessInfoProvider,
    entry: &ProcessEntry,
    prior: Option<&ProcessSnapshot>,
    timestamp: chrono::DateTime<Utc>,
) -> Option<ProcessSnapshot> {
    let handle = entry.handle;
    let mut degraded = false;

    let cpu_percent = match info.cpu_percent(&handle) {
        Ok(v) => v,
        Err(WardenError::ProcessNotFound(_)) => return None,
        Err(e) => {
            log::trace!("cpu query degraded for pid {}: {}", handle.pid, e);
            degraded = true;
            prior.map(|p| p.cpu_percent).unwrap_or(0.0)
        }
    };

    let resident_bytes = match info.resident_bytes(&handle) {
        Ok(v) => v,
        Err(WardenError::ProcessNotFound(_)) => return None,
        Err(e) => {
            log::trace!("memory query degraded for pid {}: {}", handle.pid, e);
            degraded = true;
            prior.map(|p| p.resident_bytes).unwrap_or(0)
        }
    };

    let role = if info.is_foreground(&handle) {
        Role::Foreground
    } else {
        Role::Background
    };

    Some(ProcessSnapshot {
        pid: handle.pid,
        start_time: handle.start_time,
        name: entry.name.clone(),
        cpu_percent,
        resident_bytes,
        role,
        degraded,
        timestamp,
    })
}

/// Measure a single process outside the regular tick
pub fn probe(
    info: &dyn ProcessInfoProvider,
    handle: &ProcessHandle,
    name: &str,
) -> Result<ProcessSnapshot> {
    info.refresh(&[handle.pid]);
    let cpu_percent = info.cpu_percent(handle)?;
    let resident_bytes = info.resident_bytes(handle)?;
    let role = if info.is_foreground(handle) {
        Role::Foreground
    } else {
        Role::Background
    };

    Ok(ProcessSnapshot {
        pid: handle.pid,
        start_time: handle.start_time,
        name: name.to_string(),
        cpu_percent,
        resident_bytes,
        role,
        degraded: false,
        timestamp: Utc::now(),
    })
}

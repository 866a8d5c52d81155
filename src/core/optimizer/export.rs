//! JSON export of effects history and the process table.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::effects::EffectSample;
use super::health::HealthFlag;
use super::journal::RevertRecord;
use super::types::{Role, SnapshotSet};
use crate::error::{Result, WardenError};

/// One row of an exported process table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub resident_mb: f64,
    pub role: Role,
    pub health: HealthFlag,
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotExport {
    pub tick: u64,
    pub taken_at: Option<DateTime<Utc>>,
    pub processes: Vec<SnapshotRecord>,
}

impl SnapshotExport {
    pub fn from_set<F>(set: &SnapshotSet, health: F) -> Self
    where
        F: Fn(u32) -> HealthFlag,
    {
        Self {
            tick: set.tick,
            taken_at: set.taken_at,
            processes: set
                .iter()
                .map(|p| SnapshotRecord {
                    pid: p.pid,
                    name: p.name.clone(),
                    cpu_percent: p.cpu_percent,
                    resident_mb: p.resident_mb(),
                    role: p.role,
                    health: health(p.pid),
                    degraded: p.degraded,
                })
                .collect(),
        }
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn export_effects(path: &Path, history: &[EffectSample]) -> Result<()> {
    write_json(path, history)?;
    log::info!("Exported {} effect(s) to {}", history.len(), path.display());
    Ok(())
}

fn read_json_list<T: DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = fs::read_to_string(path)?;
    if data.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&data).map_err(|e| {
        WardenError::config(format!("invalid {} file {}: {}", what, path.display(), e))
    })
}

/// Read an effects export back; a missing file is an empty history
pub fn load_effects(path: &Path) -> Result<Vec<EffectSample>> {
    read_json_list(path, "effects")
}

pub fn save_journal(path: &Path, records: &[RevertRecord]) -> Result<()> {
    write_json(path, records)?;
    log::debug!("Saved {} revert record(s) to {}", records.len(), path.display());
    Ok(())
}

/// Read saved revert baselines; a missing file means nothing to revert
pub fn load_journal(path: &Path) -> Result<Vec<RevertRecord>> {
    read_json_list(path, "revert journal")
}

pub fn export_snapshot(path: &Path, export: &SnapshotExport) -> Result<()> {
    write_json(path, export)?;
    log::info!(
        "Exported {} process(es) to {}",
        export.processes.len(),
        path.display()
    );
    Ok(())
}

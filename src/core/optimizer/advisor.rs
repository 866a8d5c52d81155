use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use super::executor::{ActionExecutor, ActionReport};
use super::health::HealthWatcher;
use super::types::{Action, Role, SnapshotSet};
use super::whitelist::{self, Whitelist};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorThresholds {
    pub bg_cpu: f32,
    pub heavy_ram_mb: f64,
}

impl Default for AdvisorThresholds {
    fn default() -> Self {
        Self {
            bg_cpu: 30.0,
            heavy_ram_mb: 800.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum SuggestionReason {
    BackgroundCpuHigh { cpu: f32 },
    HeavyRam { resident_mb: f64 },
    LeakTrend,
}

impl fmt::Display for SuggestionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuggestionReason::BackgroundCpuHigh { cpu } => write!(f, "BG CPU {:.1}%", cpu),
            SuggestionReason::HeavyRam { resident_mb } => {
                write!(f, "High RAM {:.0} MB", resident_mb)
            }
            SuggestionReason::LeakTrend => write!(f, "Mem growth trend"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub pid: u32,
    pub name: String,
    pub action: Action,
    pub reason: SuggestionReason,
}

/// Suggestions grouped by pid, in pid order
pub type Advice = BTreeMap<u32, Vec<Suggestion>>;

/// Scan the current tick for candidate actions. Never mutates anything.
pub fn scan(
    set: &SnapshotSet,
    health: &HealthWatcher,
    thresholds: &AdvisorThresholds,
    whitelist: &Whitelist,
) -> Advice {
    let mut advice = Advice::new();

    for p in set.iter() {
        if whitelist.excludes(&p.name) || whitelist::is_protected(p.pid, &p.name) {
            continue;
        }
        let mut found = Vec::new();
        let mut suggest = |action, reason| {
            found.push(Suggestion {
                pid: p.pid,
                name: p.name.clone(),
                action,
                reason,
            })
        };

        let background = p.role == Role::Background && set.foreground != Some(p.pid);
        if background && p.cpu_percent >= thresholds.bg_cpu {
            let reason = SuggestionReason::BackgroundCpuHigh { cpu: p.cpu_percent };
            suggest(Action::LowerPriority, reason);
            suggest(Action::EcoThrottle, reason);
        }
        if p.resident_mb() >= thresholds.heavy_ram_mb {
            suggest(
                Action::Trim,
                SuggestionReason::HeavyRam {
                    resident_mb: p.resident_mb(),
                },
            );
        }
        if health.flag_set(p.pid).leak {
            suggest(Action::Trim, SuggestionReason::LeakTrend);
        }

        if !found.is_empty() {
            advice.insert(p.pid, found);
        }
    }
    advice
}

/// Forward the caller's selection to the executor.
///
/// Duplicate (pid, action) pairs are applied once.
pub fn apply<'a, I>(
    executor: &ActionExecutor,
    selection: I,
) -> Vec<(Suggestion, Result<ActionReport>)>
where
    I: IntoIterator<Item = &'a Suggestion>,
{
    let mut seen = HashSet::new();
    selection
        .into_iter()
        .filter(|s| seen.insert((s.pid, s.action)))
        .map(|s| (s.clone(), executor.apply(s.pid, s.action)))
        .collect()
}

/// Apply every suggestion whose action is safe at this moment
pub fn apply_all_safe(
    executor: &ActionExecutor,
    advice: &Advice,
) -> Vec<(Suggestion, Result<ActionReport>)> {
    apply(
        executor,
        advice.values().flatten().filter(|s| s.action.is_safe()),
    )
}

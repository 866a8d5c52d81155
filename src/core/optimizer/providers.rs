//! Capability interfaces the optimizer is written against.
//!
//! Implementations live in the platform layer. Every call may fail with
//! `ProcessNotFound`, `PermissionDenied` or `Unsupported`; a raw `Os` error is
//! the only kind treated as transient.

use super::types::{Capability, MemoryPriority, PriorityClass, ProcessEntry, ProcessHandle};
use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};

/// Read-only access to the process table
pub trait ProcessInfoProvider: Send + Sync {
    /// Enumerate live processes
    fn list(&self) -> Result<Vec<ProcessEntry>>;

    /// Resolve a pid to a live process
    fn open(&self, pid: u32) -> Result<ProcessEntry>;

    /// CPU usage normalized over all logical CPUs (0-100)
    fn cpu_percent(&self, handle: &ProcessHandle) -> Result<f32>;

    fn resident_bytes(&self, handle: &ProcessHandle) -> Result<u64>;

    /// Whether the process owns the focused window
    fn is_foreground(&self, handle: &ProcessHandle) -> bool;

    /// Bring per-process counters up to date before an out-of-tick probe
    fn refresh(&self, _pids: &[u32]) {}
}

/// Mutating per-process controls
pub trait ProcessControlProvider: Send + Sync {
    fn priority(&self, handle: &ProcessHandle) -> Result<PriorityClass>;
    fn set_priority(&self, handle: &ProcessHandle, class: PriorityClass) -> Result<()>;

    /// Exact priority value when [`PriorityClass`] only buckets it
    fn native_priority(&self, _handle: &ProcessHandle) -> Result<Option<i32>> {
        Ok(None)
    }

    fn set_native_priority(&self, _handle: &ProcessHandle, _value: i32) -> Result<()> {
        Err(WardenError::unsupported(Capability::Priority))
    }

    fn memory_priority(&self, handle: &ProcessHandle) -> Result<MemoryPriority>;
    fn set_memory_priority(&self, handle: &ProcessHandle, level: MemoryPriority) -> Result<()>;

    fn affinity(&self, handle: &ProcessHandle) -> Result<u64>;
    fn set_affinity(&self, handle: &ProcessHandle, mask: u64) -> Result<()>;

    fn trim_working_set(&self, handle: &ProcessHandle) -> Result<()>;
    fn suspend(&self, handle: &ProcessHandle) -> Result<()>;
    fn resume(&self, handle: &ProcessHandle) -> Result<()>;
    fn kill(&self, handle: &ProcessHandle) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerPlan {
    HighPerformance,
    Balanced,
}

impl std::fmt::Display for PowerPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerPlan::HighPerformance => write!(f, "High Performance"),
            PowerPlan::Balanced => write!(f, "Balanced"),
        }
    }
}

/// System power plan and per-process power throttling
pub trait PowerPolicyProvider: Send + Sync {
    fn set_power_plan(&self, plan: PowerPlan) -> Result<()>;

    /// Whether eco (execution speed) throttling is currently on
    fn throttle_policy(&self, handle: &ProcessHandle) -> Result<bool>;

    fn set_throttle_policy(&self, handle: &ProcessHandle, eco: bool) -> Result<()>;
}

/// Optional shared low-priority grouping construct (e.g. a job object)
pub trait GroupingProvider: Send + Sync {
    /// Checked once at startup, see [`Capabilities`]
    fn is_supported(&self) -> bool;

    fn assign_to_throttled_group(&self, handle: &ProcessHandle) -> Result<()>;
}

/// Optional capabilities, probed once when the engine is built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub throttled_group: bool,
}

impl Capabilities {
    pub fn probe(grouping: &dyn GroupingProvider) -> Self {
        Self {
            throttled_group: grouping.is_supported(),
        }
    }
}

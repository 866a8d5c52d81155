use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a live process.
///
/// The start time disambiguates pid reuse: a handle whose pid now belongs to a
/// process with a different start time is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessHandle {
    pub pid: u32,
    pub start_time: u64,
}

impl ProcessHandle {
    pub fn new(pid: u32, start_time: u64) -> Self {
        Self { pid, start_time }
    }
}

/// One row of the OS process table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub handle: ProcessHandle,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Foreground,
    #[default]
    Background,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Foreground => write!(f, "Foreground"),
            Role::Background => write!(f, "Background"),
        }
    }
}

/// Metrics for one process at one sampling tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub start_time: u64,
    pub name: String,
    pub cpu_percent: f32, // normalized over all logical CPUs, 0-100
    pub resident_bytes: u64,
    pub role: Role,
    /// Metrics are best-effort (access denied); values may be stale or zero
    pub degraded: bool,
    pub timestamp: DateTime<Utc>,
}

impl ProcessSnapshot {
    pub fn handle(&self) -> ProcessHandle {
        ProcessHandle::new(self.pid, self.start_time)
    }

    pub fn resident_mb(&self) -> f64 {
        self.resident_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// The full process table for one tick, published as a unit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotSet {
    pub tick: u64,
    pub taken_at: Option<DateTime<Utc>>,
    pub foreground: Option<u32>,
    pub processes: BTreeMap<u32, ProcessSnapshot>,
}

impl SnapshotSet {
    pub fn get(&self, pid: u32) -> Option<&ProcessSnapshot> {
        self.processes.get(&pid)
    }

    /// True when `handle` still names the same process in this set
    pub fn contains_handle(&self, handle: &ProcessHandle) -> bool {
        self.processes
            .get(&handle.pid)
            .is_some_and(|p| p.start_time == handle.start_time)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessSnapshot> {
        self.processes.values()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriorityClass {
    Idle,
    BelowNormal,
    Normal,
    AboveNormal,
    High,
    Realtime,
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PriorityClass::Idle => "Idle",
            PriorityClass::BelowNormal => "BelowNormal",
            PriorityClass::Normal => "Normal",
            PriorityClass::AboveNormal => "AboveNormal",
            PriorityClass::High => "High",
            PriorityClass::Realtime => "Realtime",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for PriorityClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace([' ', '-', '_'], "").as_str() {
            "idle" => Ok(PriorityClass::Idle),
            "belownormal" => Ok(PriorityClass::BelowNormal),
            "normal" => Ok(PriorityClass::Normal),
            "abovenormal" => Ok(PriorityClass::AboveNormal),
            "high" => Ok(PriorityClass::High),
            "realtime" => Ok(PriorityClass::Realtime),
            _ => Err(format!("unknown priority class '{}'", s)),
        }
    }
}

/// Page priority levels, lowest first (Windows levels 1..=5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MemoryPriority {
    VeryLow,
    Low,
    Medium,
    BelowNormal,
    Normal,
}

impl MemoryPriority {
    pub fn level(self) -> u32 {
        match self {
            MemoryPriority::VeryLow => 1,
            MemoryPriority::Low => 2,
            MemoryPriority::Medium => 3,
            MemoryPriority::BelowNormal => 4,
            MemoryPriority::Normal => 5,
        }
    }

    pub fn from_level(level: u32) -> Self {
        match level {
            0 | 1 => MemoryPriority::VeryLow,
            2 => MemoryPriority::Low,
            3 => MemoryPriority::Medium,
            4 => MemoryPriority::BelowNormal,
            _ => MemoryPriority::Normal,
        }
    }
}

impl fmt::Display for MemoryPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.level())
    }
}

/// Attributes the executor can mutate and later restore
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Attribute {
    Priority,
    MemoryPriority,
    Affinity,
    EcoThrottle,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Attribute::Priority => "priority",
            Attribute::MemoryPriority => "memory priority",
            Attribute::Affinity => "affinity",
            Attribute::EcoThrottle => "eco throttle",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    Priority(PriorityClass),
    /// Exact OS priority where the class is a lossy view of it (unix nice)
    NativePriority(i32),
    MemoryPriority(MemoryPriority),
    Affinity(u64),
    EcoThrottle(bool),
}

impl AttributeValue {
    pub fn attribute(&self) -> Attribute {
        match self {
            AttributeValue::Priority(_) | AttributeValue::NativePriority(_) => Attribute::Priority,
            AttributeValue::MemoryPriority(_) => Attribute::MemoryPriority,
            AttributeValue::Affinity(_) => Attribute::Affinity,
            AttributeValue::EcoThrottle(_) => Attribute::EcoThrottle,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Priority(p) => write!(f, "{}", p),
            AttributeValue::NativePriority(n) => write!(f, "nice {}", n),
            AttributeValue::MemoryPriority(m) => write!(f, "{}", m),
            AttributeValue::Affinity(mask) => write!(f, "{:#x}", mask),
            AttributeValue::EcoThrottle(on) => write!(f, "{}", if *on { "on" } else { "off" }),
        }
    }
}

/// Capabilities a platform may lack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    Priority,
    MemoryPriority,
    Affinity,
    TrimWorkingSet,
    Suspend,
    Resume,
    Kill,
    PowerPlan,
    ThrottlePolicy,
    ThrottledGroup,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Capability::Priority => "priority control",
            Capability::MemoryPriority => "memory priority control",
            Capability::Affinity => "CPU affinity control",
            Capability::TrimWorkingSet => "working set trim",
            Capability::Suspend => "process suspend",
            Capability::Resume => "process resume",
            Capability::Kill => "process termination",
            Capability::PowerPlan => "power plan switching",
            Capability::ThrottlePolicy => "power throttling policy",
            Capability::ThrottledGroup => "throttled process grouping",
        };
        f.write_str(label)
    }
}

/// A resource-control action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    SetPriority(PriorityClass),
    /// BelowNormal, but never raises a process already at or below it
    LowerPriority,
    SetMemoryPriority(MemoryPriority),
    SetAffinity(u64),
    EcoThrottle,
    Trim,
    AssignThrottledGroup,
    Suspend,
    Resume,
    Kill,
}

impl Action {
    /// Actions that may be applied in bulk without confirmation
    pub fn is_safe(&self) -> bool {
        !matches!(self, Action::Kill | Action::Suspend)
    }

    /// The attribute this action mutates, if it is revertible
    pub fn attribute(&self) -> Option<Attribute> {
        match self {
            Action::SetPriority(_) | Action::LowerPriority => Some(Attribute::Priority),
            Action::SetMemoryPriority(_) => Some(Attribute::MemoryPriority),
            Action::SetAffinity(_) => Some(Attribute::Affinity),
            Action::EcoThrottle => Some(Attribute::EcoThrottle),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::SetPriority(p) => write!(f, "priority->{}", p),
            Action::LowerPriority => write!(f, "lower_priority"),
            Action::SetMemoryPriority(m) => write!(f, "memprio->{}", m.level()),
            Action::SetAffinity(mask) => write!(f, "affinity->{:#x}", mask),
            Action::EcoThrottle => write!(f, "eco_throttle"),
            Action::Trim => write!(f, "trim"),
            Action::AssignThrottledGroup => write!(f, "throttled_group"),
            Action::Suspend => write!(f, "suspend"),
            Action::Resume => write!(f, "resume"),
            Action::Kill => write!(f, "kill"),
        }
    }
}

/// Affinity mask covering the first `cores` logical CPUs
pub fn all_cores_mask(cores: usize) -> u64 {
    if cores >= 64 {
        u64::MAX
    } else {
        (1u64 << cores) - 1
    }
}

#![allow(dead_code)]

// Scripted process table implementing every provider trait

use corewarden::core::optimizer::{
    EngineSettings, GroupingProvider, MemoryPriority, PowerPlan, PowerPolicyProvider,
    PriorityClass, ProcessControlProvider, ProcessEntry, ProcessHandle, ProcessInfoProvider,
    Providers,
};
use corewarden::{Engine, Result, WardenError};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

pub const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct FakeProcess {
    pub name: String,
    pub start_time: u64,
    pub cpu: f32,
    pub resident: u64,
    pub priority: PriorityClass,
    /// Exact nice value, for processes that expose one
    pub nice: Option<i32>,
    pub memory_priority: MemoryPriority,
    pub affinity: u64,
    pub eco: bool,
    pub suspended: bool,
}

/// How a scripted call should fail
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Failure {
    /// Transient `Os` error for the next `n` calls
    Transient(u32),
    /// Transient-looking `Os` error on every call
    Always,
    Denied,
}

#[derive(Default)]
pub struct FakeSystem {
    processes: Mutex<BTreeMap<u32, FakeProcess>>,
    foreground: Mutex<Option<u32>>,
    priority_failure: Mutex<Option<Failure>>,
    metric_failures: Mutex<HashMap<u32, Failure>>,
    vanish_on_list: Mutex<HashSet<u32>>,
    list_delay: Mutex<Duration>,
    grouping_supported: bool,
    grouped: Mutex<HashSet<u32>>,
    power_plan: Mutex<Option<PowerPlan>>,
    calls: Mutex<Vec<String>>,
}

impl FakeSystem {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_grouping() -> Arc<Self> {
        Arc::new(Self {
            grouping_supported: true,
            ..Self::default()
        })
    }

    pub fn spawn(&self, pid: u32, name: &str, cpu: f32, resident_mb: u64) {
        let start_time = 1_000 + pid as u64;
        self.processes.lock().insert(
            pid,
            FakeProcess {
                name: name.to_string(),
                start_time,
                cpu,
                resident: resident_mb * MB,
                priority: PriorityClass::Normal,
                nice: None,
                memory_priority: MemoryPriority::Normal,
                affinity: 0xF,
                eco: false,
                suspended: false,
            },
        );
    }

    /// Replace the process behind `pid` with a new one (pid reuse)
    pub fn respawn(&self, pid: u32, name: &str) {
        let mut processes = self.processes.lock();
        if let Some(p) = processes.get_mut(&pid) {
            p.name = name.to_string();
            p.start_time += 1;
            p.priority = PriorityClass::Normal;
        }
    }

    pub fn vanish(&self, pid: u32) {
        self.processes.lock().remove(&pid);
    }

    pub fn set_cpu(&self, pid: u32, cpu: f32) {
        if let Some(p) = self.processes.lock().get_mut(&pid) {
            p.cpu = cpu;
        }
    }

    pub fn set_resident_mb(&self, pid: u32, resident_mb: u64) {
        if let Some(p) = self.processes.lock().get_mut(&pid) {
            p.resident = resident_mb * MB;
        }
    }

    pub fn set_priority_of(&self, pid: u32, class: PriorityClass) {
        if let Some(p) = self.processes.lock().get_mut(&pid) {
            p.priority = class;
        }
    }

    /// Give `pid` an exact nice value the priority class only approximates
    pub fn set_nice_of(&self, pid: u32, nice: i32) {
        if let Some(p) = self.processes.lock().get_mut(&pid) {
            p.nice = Some(nice);
            p.priority = class_of_nice(nice);
        }
    }

    pub fn nice_of(&self, pid: u32) -> Option<i32> {
        self.process(pid).and_then(|p| p.nice)
    }

    /// Make cpu and memory queries for `pid` fail
    pub fn fail_metrics(&self, pid: u32, failure: Option<Failure>) {
        let mut failures = self.metric_failures.lock();
        match failure {
            Some(f) => failures.insert(pid, f),
            None => failures.remove(&pid),
        };
    }

    /// Let `pid` show up in the next enumeration, then exit before it is measured
    pub fn vanish_after_listing(&self, pid: u32) {
        self.vanish_on_list.lock().insert(pid);
    }

    /// Make every enumeration take at least `delay`
    pub fn slow_listing(&self, delay: Duration) {
        *self.list_delay.lock() = delay;
    }

    pub fn set_foreground(&self, pid: Option<u32>) {
        *self.foreground.lock() = pid;
    }

    pub fn fail_priority_sets(&self, failure: Option<Failure>) {
        *self.priority_failure.lock() = failure;
    }

    pub fn process(&self, pid: u32) -> Option<FakeProcess> {
        self.processes.lock().get(&pid).cloned()
    }

    pub fn priority_of(&self, pid: u32) -> Option<PriorityClass> {
        self.process(pid).map(|p| p.priority)
    }

    pub fn is_grouped(&self, pid: u32) -> bool {
        self.grouped.lock().contains(&pid)
    }

    pub fn power_plan(&self) -> Option<PowerPlan> {
        *self.power_plan.lock()
    }

    /// Mutating calls recorded so far, e.g. `set_priority 4321 BelowNormal`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn with_process<T>(
        &self,
        handle: &ProcessHandle,
        f: impl FnOnce(&mut FakeProcess) -> T,
    ) -> Result<T> {
        let mut processes = self.processes.lock();
        match processes.get_mut(&handle.pid) {
            Some(p) if p.start_time == handle.start_time => Ok(f(p)),
            _ => Err(WardenError::ProcessNotFound(handle.pid)),
        }
    }

    fn metric_failure(&self, pid: u32) -> Option<WardenError> {
        match self.metric_failures.lock().get(&pid) {
            Some(Failure::Denied) => Some(WardenError::permission_denied("access denied")),
            Some(_) => Some(WardenError::os("counter unavailable")),
            None => None,
        }
    }

    fn priority_failure(&self) -> Option<WardenError> {
        let mut failure = self.priority_failure.lock();
        match *failure {
            Some(Failure::Transient(n)) if n > 0 => {
                *failure = if n > 1 { Some(Failure::Transient(n - 1)) } else { None };
                Some(WardenError::os("resource busy"))
            }
            Some(Failure::Always) => Some(WardenError::os("resource busy")),
            Some(Failure::Denied) => Some(WardenError::permission_denied("access denied")),
            _ => None,
        }
    }
}

impl ProcessInfoProvider for FakeSystem {
    fn list(&self) -> Result<Vec<ProcessEntry>> {
        let delay = *self.list_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut processes = self.processes.lock();
        let entries = processes
            .iter()
            .map(|(pid, p)| ProcessEntry {
                handle: ProcessHandle::new(*pid, p.start_time),
                name: p.name.clone(),
            })
            .collect();
        for pid in self.vanish_on_list.lock().drain() {
            processes.remove(&pid);
        }
        Ok(entries)
    }

    fn open(&self, pid: u32) -> Result<ProcessEntry> {
        self.processes
            .lock()
            .get(&pid)
            .map(|p| ProcessEntry {
                handle: ProcessHandle::new(pid, p.start_time),
                name: p.name.clone(),
            })
            .ok_or(WardenError::ProcessNotFound(pid))
    }

    fn cpu_percent(&self, handle: &ProcessHandle) -> Result<f32> {
        let cpu = self.with_process(handle, |p| p.cpu)?;
        match self.metric_failure(handle.pid) {
            Some(e) => Err(e),
            None => Ok(cpu),
        }
    }

    fn resident_bytes(&self, handle: &ProcessHandle) -> Result<u64> {
        let resident = self.with_process(handle, |p| p.resident)?;
        match self.metric_failure(handle.pid) {
            Some(e) => Err(e),
            None => Ok(resident),
        }
    }

    fn is_foreground(&self, handle: &ProcessHandle) -> bool {
        *self.foreground.lock() == Some(handle.pid)
    }
}

impl ProcessControlProvider for FakeSystem {
    fn priority(&self, handle: &ProcessHandle) -> Result<PriorityClass> {
        self.with_process(handle, |p| p.priority)
    }

    fn set_priority(&self, handle: &ProcessHandle, class: PriorityClass) -> Result<()> {
        self.record(format!("set_priority {} {}", handle.pid, class));
        if let Some(e) = self.priority_failure() {
            return Err(e);
        }
        self.with_process(handle, |p| {
            p.priority = class;
            if p.nice.is_some() {
                p.nice = Some(nice_of_class(class));
            }
        })
    }

    fn native_priority(&self, handle: &ProcessHandle) -> Result<Option<i32>> {
        self.with_process(handle, |p| p.nice)
    }

    fn set_native_priority(&self, handle: &ProcessHandle, value: i32) -> Result<()> {
        self.record(format!("set_native_priority {} {}", handle.pid, value));
        self.with_process(handle, |p| {
            p.nice = Some(value);
            p.priority = class_of_nice(value);
        })
    }

    fn memory_priority(&self, handle: &ProcessHandle) -> Result<MemoryPriority> {
        self.with_process(handle, |p| p.memory_priority)
    }

    fn set_memory_priority(&self, handle: &ProcessHandle, level: MemoryPriority) -> Result<()> {
        self.record(format!("set_memory_priority {} {}", handle.pid, level.level()));
        self.with_process(handle, |p| p.memory_priority = level)
    }

    fn affinity(&self, handle: &ProcessHandle) -> Result<u64> {
        self.with_process(handle, |p| p.affinity)
    }

    fn set_affinity(&self, handle: &ProcessHandle, mask: u64) -> Result<()> {
        self.record(format!("set_affinity {} {:#x}", handle.pid, mask));
        self.with_process(handle, |p| p.affinity = mask)
    }

    fn trim_working_set(&self, handle: &ProcessHandle) -> Result<()> {
        self.record(format!("trim {}", handle.pid));
        self.with_process(handle, |p| p.resident /= 2)
    }

    fn suspend(&self, handle: &ProcessHandle) -> Result<()> {
        self.record(format!("suspend {}", handle.pid));
        self.with_process(handle, |p| p.suspended = true)
    }

    fn resume(&self, handle: &ProcessHandle) -> Result<()> {
        self.record(format!("resume {}", handle.pid));
        self.with_process(handle, |p| p.suspended = false)
    }

    fn kill(&self, handle: &ProcessHandle) -> Result<()> {
        self.record(format!("kill {}", handle.pid));
        self.with_process(handle, |_| ())?;
        self.processes.lock().remove(&handle.pid);
        Ok(())
    }
}

impl PowerPolicyProvider for FakeSystem {
    fn set_power_plan(&self, plan: PowerPlan) -> Result<()> {
        self.record(format!("set_power_plan {}", plan));
        *self.power_plan.lock() = Some(plan);
        Ok(())
    }

    fn throttle_policy(&self, handle: &ProcessHandle) -> Result<bool> {
        self.with_process(handle, |p| p.eco)
    }

    fn set_throttle_policy(&self, handle: &ProcessHandle, eco: bool) -> Result<()> {
        self.record(format!("set_throttle_policy {} {}", handle.pid, eco));
        self.with_process(handle, |p| p.eco = eco)
    }
}

impl GroupingProvider for FakeSystem {
    fn is_supported(&self) -> bool {
        self.grouping_supported
    }

    fn assign_to_throttled_group(&self, handle: &ProcessHandle) -> Result<()> {
        self.record(format!("assign_group {}", handle.pid));
        self.with_process(handle, |_| ())?;
        self.grouped.lock().insert(handle.pid);
        Ok(())
    }
}

fn nice_of_class(class: PriorityClass) -> i32 {
    match class {
        PriorityClass::Idle => 19,
        PriorityClass::BelowNormal => 10,
        PriorityClass::Normal => 0,
        PriorityClass::AboveNormal => -5,
        PriorityClass::High => -10,
        PriorityClass::Realtime => -20,
    }
}

fn class_of_nice(nice: i32) -> PriorityClass {
    match nice {
        n if n >= 15 => PriorityClass::Idle,
        n if n >= 5 => PriorityClass::BelowNormal,
        n if n > -3 => PriorityClass::Normal,
        n if n > -8 => PriorityClass::AboveNormal,
        n if n > -15 => PriorityClass::High,
        _ => PriorityClass::Realtime,
    }
}

pub fn providers(fake: &Arc<FakeSystem>) -> Providers {
    Providers {
        info: fake.clone(),
        control: fake.clone(),
        power: fake.clone(),
        grouping: fake.clone(),
    }
}

/// Settings with immediate effects follow-up and fast retries
pub fn settings() -> EngineSettings {
    let mut settings = EngineSettings::default();
    settings.effects.delay_ms = 0;
    settings.executor.retry_backoff_ms = 1;
    settings
}

pub fn engine(fake: &Arc<FakeSystem>) -> Engine {
    Engine::new(providers(fake), settings())
}

pub fn engine_with(fake: &Arc<FakeSystem>, settings: EngineSettings) -> Engine {
    Engine::new(providers(fake), settings)
}

pub fn no_cooldown(mut settings: EngineSettings) -> EngineSettings {
    settings.rule_cooldown = Duration::ZERO;
    settings
}

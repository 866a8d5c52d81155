//! Wrappers that log intended mutations instead of performing them.
//!
//! Reads go to the real provider until a value has been "set", after which
//! the simulated value is returned so the journal sees consistent state.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::optimizer::{
    GroupingProvider, MemoryPriority, PowerPlan, PowerPolicyProvider, PriorityClass,
    ProcessControlProvider, ProcessHandle,
};
use crate::error::Result;

#[derive(Debug, Default, Clone, Copy)]
struct Simulated {
    priority: Option<PriorityClass>,
    memory_priority: Option<MemoryPriority>,
    affinity: Option<u64>,
    eco: Option<bool>,
}

pub struct DryRunControl {
    inner: Arc<dyn ProcessControlProvider>,
    state: Mutex<HashMap<ProcessHandle, Simulated>>,
}

impl DryRunControl {
    pub fn new(inner: Arc<dyn ProcessControlProvider>) -> Self {
        Self {
            inner,
            state: Mutex::new(HashMap::new()),
        }
    }

    fn simulated(&self, handle: &ProcessHandle) -> Simulated {
        self.state.lock().get(handle).copied().unwrap_or_default()
    }

    fn update<F: FnOnce(&mut Simulated)>(&self, handle: &ProcessHandle, f: F) {
        f(self.state.lock().entry(*handle).or_default());
    }
}

impl ProcessControlProvider for DryRunControl {
    fn priority(&self, handle: &ProcessHandle) -> Result<PriorityClass> {
        match self.simulated(handle).priority {
            Some(p) => Ok(p),
            None => self.inner.priority(handle),
        }
    }

    fn set_priority(&self, handle: &ProcessHandle, class: PriorityClass) -> Result<()> {
        log::info!("[dry-run] would set priority of PID {} to {}", handle.pid, class);
        self.update(handle, |s| s.priority = Some(class));
        Ok(())
    }

    fn native_priority(&self, handle: &ProcessHandle) -> Result<Option<i32>> {
        match self.simulated(handle).priority {
            Some(_) => Ok(None),
            None => self.inner.native_priority(handle),
        }
    }

    fn set_native_priority(&self, handle: &ProcessHandle, value: i32) -> Result<()> {
        log::info!("[dry-run] would restore native priority {} of PID {}", value, handle.pid);
        // the real process was never changed, so reads fall through again
        self.update(handle, |s| s.priority = None);
        Ok(())
    }

    fn memory_priority(&self, handle: &ProcessHandle) -> Result<MemoryPriority> {
        match self.simulated(handle).memory_priority {
            Some(m) => Ok(m),
            None => self.inner.memory_priority(handle),
        }
    }

    fn set_memory_priority(&self, handle: &ProcessHandle, level: MemoryPriority) -> Result<()> {
        log::info!("[dry-run] would set memory priority of PID {} to {}", handle.pid, level);
        self.update(handle, |s| s.memory_priority = Some(level));
        Ok(())
    }

    fn affinity(&self, handle: &ProcessHandle) -> Result<u64> {
        match self.simulated(handle).affinity {
            Some(mask) => Ok(mask),
            None => self.inner.affinity(handle),
        }
    }

    fn set_affinity(&self, handle: &ProcessHandle, mask: u64) -> Result<()> {
        log::info!("[dry-run] would set affinity of PID {} to {:#x}", handle.pid, mask);
        self.update(handle, |s| s.affinity = Some(mask));
        Ok(())
    }

    fn trim_working_set(&self, handle: &ProcessHandle) -> Result<()> {
        log::info!("[dry-run] would trim working set of PID {}", handle.pid);
        Ok(())
    }

    fn suspend(&self, handle: &ProcessHandle) -> Result<()> {
        log::info!("[dry-run] would suspend PID {}", handle.pid);
        Ok(())
    }

    fn resume(&self, handle: &ProcessHandle) -> Result<()> {
        log::info!("[dry-run] would resume PID {}", handle.pid);
        Ok(())
    }

    fn kill(&self, handle: &ProcessHandle) -> Result<()> {
        log::info!("[dry-run] would terminate PID {}", handle.pid);
        Ok(())
    }
}

pub struct DryRunPower {
    inner: Arc<dyn PowerPolicyProvider>,
    eco: Mutex<HashMap<ProcessHandle, bool>>,
}

impl DryRunPower {
    pub fn new(inner: Arc<dyn PowerPolicyProvider>) -> Self {
        Self {
            inner,
            eco: Mutex::new(HashMap::new()),
        }
    }
}

impl PowerPolicyProvider for DryRunPower {
    fn set_power_plan(&self, plan: PowerPlan) -> Result<()> {
        log::info!("[dry-run] would switch power plan to {}", plan);
        Ok(())
    }

    fn throttle_policy(&self, handle: &ProcessHandle) -> Result<bool> {
        if let Some(eco) = self.eco.lock().get(handle) {
            return Ok(*eco);
        }
        self.inner.throttle_policy(handle)
    }

    fn set_throttle_policy(&self, handle: &ProcessHandle, eco: bool) -> Result<()> {
        log::info!(
            "[dry-run] would turn eco throttling {} for PID {}",
            if eco { "on" } else { "off" },
            handle.pid
        );
        self.eco.lock().insert(*handle, eco);
        Ok(())
    }
}

pub struct DryRunGrouping {
    inner: Arc<dyn GroupingProvider>,
}

impl DryRunGrouping {
    pub fn new(inner: Arc<dyn GroupingProvider>) -> Self {
        Self { inner }
    }
}

impl GroupingProvider for DryRunGrouping {
    fn is_supported(&self) -> bool {
        self.inner.is_supported()
    }

    fn assign_to_throttled_group(&self, handle: &ProcessHandle) -> Result<()> {
        log::info!("[dry-run] would add PID {} to the throttled group", handle.pid);
        Ok(())
    }
}

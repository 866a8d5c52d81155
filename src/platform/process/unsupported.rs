//! Providers for capabilities the current OS does not offer.

use crate::core::optimizer::{
    Capability, GroupingProvider, MemoryPriority, PowerPlan, PowerPolicyProvider, PriorityClass,
    ProcessControlProvider, ProcessHandle,
};
use crate::error::{Result, WardenError};

#[derive(Debug, Default)]
pub struct UnsupportedControl;

impl ProcessControlProvider for UnsupportedControl {
    fn priority(&self, _: &ProcessHandle) -> Result<PriorityClass> {
        Err(WardenError::unsupported(Capability::Priority))
    }

    fn set_priority(&self, _: &ProcessHandle, _: PriorityClass) -> Result<()> {
        Err(WardenError::unsupported(Capability::Priority))
    }

    fn memory_priority(&self, _: &ProcessHandle) -> Result<MemoryPriority> {
        Err(WardenError::unsupported(Capability::MemoryPriority))
    }

    fn set_memory_priority(&self, _: &ProcessHandle, _: MemoryPriority) -> Result<()> {
        Err(WardenError::unsupported(Capability::MemoryPriority))
    }

    fn affinity(&self, _: &ProcessHandle) -> Result<u64> {
        Err(WardenError::unsupported(Capability::Affinity))
    }

    fn set_affinity(&self, _: &ProcessHandle, _: u64) -> Result<()> {
        Err(WardenError::unsupported(Capability::Affinity))
    }

    fn trim_working_set(&self, _: &ProcessHandle) -> Result<()> {
        Err(WardenError::unsupported(Capability::TrimWorkingSet))
    }

    fn suspend(&self, _: &ProcessHandle) -> Result<()> {
        Err(WardenError::unsupported(Capability::Suspend))
    }

    fn resume(&self, _: &ProcessHandle) -> Result<()> {
        Err(WardenError::unsupported(Capability::Resume))
    }

    fn kill(&self, _: &ProcessHandle) -> Result<()> {
        Err(WardenError::unsupported(Capability::Kill))
    }
}

#[derive(Debug, Default)]
pub struct UnsupportedPower;

impl PowerPolicyProvider for UnsupportedPower {
    fn set_power_plan(&self, _: PowerPlan) -> Result<()> {
        Err(WardenError::unsupported(Capability::PowerPlan))
    }

    fn throttle_policy(&self, _: &ProcessHandle) -> Result<bool> {
        Err(WardenError::unsupported(Capability::ThrottlePolicy))
    }

    fn set_throttle_policy(&self, _: &ProcessHandle, _: bool) -> Result<()> {
        Err(WardenError::unsupported(Capability::ThrottlePolicy))
    }
}

#[derive(Debug, Default)]
pub struct NoGrouping;

impl GroupingProvider for NoGrouping {
    fn is_supported(&self) -> bool {
        false
    }

    fn assign_to_throttled_group(&self, _: &ProcessHandle) -> Result<()> {
        Err(WardenError::unsupported(Capability::ThrottledGroup))
    }
}

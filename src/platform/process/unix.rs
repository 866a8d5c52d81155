//! Process control through libc: nice values, signals, and CPU affinity on
//! Linux. Memory priority and working-set trimming have no unix counterpart.

use std::io;
use std::sync::Arc;

use super::info::SysinfoProcessInfo;
use crate::core::optimizer::{
    Capability, MemoryPriority, PriorityClass, ProcessControlProvider, ProcessHandle,
};
use crate::error::{Result, WardenError};

fn errno_error(pid: u32, what: &str) -> WardenError {
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::ESRCH) => WardenError::ProcessNotFound(pid),
        Some(libc::EPERM) | Some(libc::EACCES) => {
            WardenError::permission_denied(format!("{} on PID {}", what, pid))
        }
        _ => WardenError::os(format!("{} on PID {}: {}", what, pid, err)),
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn clear_errno() {
    unsafe { *libc::__errno_location() = 0 }
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
fn clear_errno() {
    unsafe { *libc::__error() = 0 }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd"
)))]
fn clear_errno() {}

pub fn nice_for(class: PriorityClass) -> i32 {
    match class {
        PriorityClass::Idle => 19,
        PriorityClass::BelowNormal => 10,
        PriorityClass::Normal => 0,
        PriorityClass::AboveNormal => -5,
        PriorityClass::High => -10,
        PriorityClass::Realtime => -20,
    }
}

pub fn class_for(nice: i32) -> PriorityClass {
    match nice {
        n if n >= 15 => PriorityClass::Idle,
        n if n >= 5 => PriorityClass::BelowNormal,
        n if n > -3 => PriorityClass::Normal,
        n if n > -8 => PriorityClass::AboveNormal,
        n if n > -15 => PriorityClass::High,
        _ => PriorityClass::Realtime,
    }
}

pub struct UnixProcessControl {
    identity: Arc<SysinfoProcessInfo>,
}

impl UnixProcessControl {
    pub fn new(identity: Arc<SysinfoProcessInfo>) -> Self {
        Self { identity }
    }

    fn nice(&self, handle: &ProcessHandle) -> Result<i32> {
        self.identity.verify(handle)?;
        clear_errno();
        let nice = unsafe { libc::getpriority(libc::PRIO_PROCESS, handle.pid as libc::id_t) };
        if nice == -1 && io::Error::last_os_error().raw_os_error().unwrap_or(0) != 0 {
            return Err(errno_error(handle.pid, "getpriority"));
        }
        Ok(nice)
    }

    fn set_nice(&self, handle: &ProcessHandle, nice: i32) -> Result<()> {
        self.identity.verify(handle)?;
        let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, handle.pid as libc::id_t, nice) };
        if rc != 0 {
            return Err(errno_error(handle.pid, "setpriority"));
        }
        Ok(())
    }

    fn signal(&self, handle: &ProcessHandle, signal: libc::c_int, what: &str) -> Result<()> {
        self.identity.verify(handle)?;
        if unsafe { libc::kill(handle.pid as libc::pid_t, signal) } != 0 {
            return Err(errno_error(handle.pid, what));
        }
        Ok(())
    }
}

impl ProcessControlProvider for UnixProcessControl {
    fn priority(&self, handle: &ProcessHandle) -> Result<PriorityClass> {
        self.nice(handle).map(class_for)
    }

    fn set_priority(&self, handle: &ProcessHandle, class: PriorityClass) -> Result<()> {
        self.set_nice(handle, nice_for(class))
    }

    fn native_priority(&self, handle: &ProcessHandle) -> Result<Option<i32>> {
        self.nice(handle).map(Some)
    }

    fn set_native_priority(&self, handle: &ProcessHandle, value: i32) -> Result<()> {
        self.set_nice(handle, value)
    }

    fn memory_priority(&self, _handle: &ProcessHandle) -> Result<MemoryPriority> {
        Err(WardenError::unsupported(Capability::MemoryPriority))
    }

    fn set_memory_priority(&self, _handle: &ProcessHandle, _level: MemoryPriority) -> Result<()> {
        Err(WardenError::unsupported(Capability::MemoryPriority))
    }

    #[cfg(target_os = "linux")]
    fn affinity(&self, handle: &ProcessHandle) -> Result<u64> {
        self.identity.verify(handle)?;
        let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::sched_getaffinity(
                handle.pid as libc::pid_t,
                std::mem::size_of::<libc::cpu_set_t>(),
                &mut set,
            )
        };
        if rc != 0 {
            return Err(errno_error(handle.pid, "sched_getaffinity"));
        }
        let mut mask = 0u64;
        for cpu in 0..64 {
            if unsafe { libc::CPU_ISSET(cpu, &set) } {
                mask |= 1 << cpu;
            }
        }
        Ok(mask)
    }

    #[cfg(target_os = "linux")]
    fn set_affinity(&self, handle: &ProcessHandle, mask: u64) -> Result<()> {
        self.identity.verify(handle)?;
        let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        unsafe { libc::CPU_ZERO(&mut set) };
        for cpu in 0..64 {
            if mask & (1 << cpu) != 0 {
                unsafe { libc::CPU_SET(cpu, &mut set) };
            }
        }
        let rc = unsafe {
            libc::sched_setaffinity(
                handle.pid as libc::pid_t,
                std::mem::size_of::<libc::cpu_set_t>(),
                &set,
            )
        };
        if rc != 0 {
            return Err(errno_error(handle.pid, "sched_setaffinity"));
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn affinity(&self, _handle: &ProcessHandle) -> Result<u64> {
        Err(WardenError::unsupported(Capability::Affinity))
    }

    #[cfg(not(target_os = "linux"))]
    fn set_affinity(&self, _handle: &ProcessHandle, _mask: u64) -> Result<()> {
        Err(WardenError::unsupported(Capability::Affinity))
    }

    fn trim_working_set(&self, _handle: &ProcessHandle) -> Result<()> {
        Err(WardenError::unsupported(Capability::TrimWorkingSet))
    }

    fn suspend(&self, handle: &ProcessHandle) -> Result<()> {
        self.signal(handle, libc::SIGSTOP, "SIGSTOP")
    }

    fn resume(&self, handle: &ProcessHandle) -> Result<()> {
        self.signal(handle, libc::SIGCONT, "SIGCONT")
    }

    fn kill(&self, handle: &ProcessHandle) -> Result<()> {
        self.signal(handle, libc::SIGTERM, "SIGTERM")
    }
}

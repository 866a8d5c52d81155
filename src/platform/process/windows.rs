//! Win32 process control.

use std::ffi::c_void;
use std::mem;
use std::process::Command;
use std::sync::Arc;

use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER, HANDLE,
    INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Thread32First, Thread32Next, TH32CS_SNAPTHREAD, THREADENTRY32,
};
use windows_sys::Win32::System::JobObjects::{AssignProcessToJobObject, CreateJobObjectW};
use windows_sys::Win32::System::ProcessStatus::K32EmptyWorkingSet;
use windows_sys::Win32::System::Threading::{
    GetPriorityClass, GetProcessAffinityMask, GetProcessInformation, OpenProcess, OpenThread,
    ProcessMemoryPriority, ProcessPowerThrottling, ResumeThread, SetPriorityClass,
    SetProcessAffinityMask, SetProcessInformation, SuspendThread, TerminateProcess,
    ABOVE_NORMAL_PRIORITY_CLASS, BELOW_NORMAL_PRIORITY_CLASS, HIGH_PRIORITY_CLASS,
    IDLE_PRIORITY_CLASS, MEMORY_PRIORITY_INFORMATION, NORMAL_PRIORITY_CLASS,
    PROCESS_ACCESS_RIGHTS, PROCESS_POWER_THROTTLING_CURRENT_VERSION,
    PROCESS_POWER_THROTTLING_EXECUTION_SPEED, PROCESS_POWER_THROTTLING_STATE,
    PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_SET_INFORMATION, PROCESS_SET_QUOTA,
    PROCESS_TERMINATE, REALTIME_PRIORITY_CLASS, THREAD_SUSPEND_RESUME,
};

use super::info::SysinfoProcessInfo;
use crate::core::optimizer::{
    Capability, GroupingProvider, MemoryPriority, PowerPlan, PowerPolicyProvider, PriorityClass,
    ProcessControlProvider, ProcessHandle,
};
use crate::error::{Result, WardenError};

/// Owned process or thread handle, closed on drop
struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.0);
        }
    }
}

fn last_error(pid: u32, what: &str) -> WardenError {
    let code = unsafe { GetLastError() };
    match code {
        ERROR_ACCESS_DENIED => WardenError::permission_denied(format!("{} on PID {}", what, pid)),
        ERROR_INVALID_PARAMETER => WardenError::ProcessNotFound(pid),
        _ => WardenError::os(format!("{} on PID {} failed (error {})", what, pid, code)),
    }
}

fn check(ok: i32, pid: u32, what: &str) -> Result<()> {
    if ok == 0 {
        Err(last_error(pid, what))
    } else {
        Ok(())
    }
}

fn open(pid: u32, access: PROCESS_ACCESS_RIGHTS) -> Result<OwnedHandle> {
    let handle = unsafe { OpenProcess(access, 0, pid) };
    if handle.is_null() {
        return Err(last_error(pid, "OpenProcess"));
    }
    Ok(OwnedHandle(handle))
}

fn priority_to_class(priority: PriorityClass) -> u32 {
    match priority {
        PriorityClass::Idle => IDLE_PRIORITY_CLASS,
        PriorityClass::BelowNormal => BELOW_NORMAL_PRIORITY_CLASS,
        PriorityClass::Normal => NORMAL_PRIORITY_CLASS,
        PriorityClass::AboveNormal => ABOVE_NORMAL_PRIORITY_CLASS,
        PriorityClass::High => HIGH_PRIORITY_CLASS,
        PriorityClass::Realtime => REALTIME_PRIORITY_CLASS,
    }
}

fn class_to_priority(class: u32) -> Option<PriorityClass> {
    match class {
        IDLE_PRIORITY_CLASS => Some(PriorityClass::Idle),
        BELOW_NORMAL_PRIORITY_CLASS => Some(PriorityClass::BelowNormal),
        NORMAL_PRIORITY_CLASS => Some(PriorityClass::Normal),
        ABOVE_NORMAL_PRIORITY_CLASS => Some(PriorityClass::AboveNormal),
        HIGH_PRIORITY_CLASS => Some(PriorityClass::High),
        REALTIME_PRIORITY_CLASS => Some(PriorityClass::Realtime),
        _ => None,
    }
}

pub struct WindowsProcessControl {
    identity: Arc<SysinfoProcessInfo>,
}

impl WindowsProcessControl {
    pub fn new(identity: Arc<SysinfoProcessInfo>) -> Self {
        Self { identity }
    }

    fn open_verified(
        &self,
        handle: &ProcessHandle,
        access: PROCESS_ACCESS_RIGHTS,
    ) -> Result<OwnedHandle> {
        self.identity.verify(handle)?;
        open(handle.pid, access)
    }

    fn for_each_thread<F>(&self, handle: &ProcessHandle, what: &str, mut op: F) -> Result<()>
    where
        F: FnMut(HANDLE) -> bool,
    {
        self.identity.verify(handle)?;
        let pid = handle.pid;

        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPTHREAD, 0) };
        if snapshot == INVALID_HANDLE_VALUE {
            return Err(last_error(pid, "CreateToolhelp32Snapshot"));
        }
        let snapshot = OwnedHandle(snapshot);

        let mut entry: THREADENTRY32 = unsafe { mem::zeroed() };
        entry.dwSize = mem::size_of::<THREADENTRY32>() as u32;

        let mut touched = 0usize;
        let mut failed = 0usize;
        let mut more = unsafe { Thread32First(snapshot.0, &mut entry) } != 0;
        while more {
            if entry.th32OwnerProcessID == pid {
                let thread = unsafe { OpenThread(THREAD_SUSPEND_RESUME, 0, entry.th32ThreadID) };
                if thread.is_null() {
                    failed += 1;
                } else {
                    let thread = OwnedHandle(thread);
                    if op(thread.0) {
                        touched += 1;
                    } else {
                        failed += 1;
                    }
                }
            }
            more = unsafe { Thread32Next(snapshot.0, &mut entry) } != 0;
        }

        if touched == 0 && failed > 0 {
            return Err(WardenError::permission_denied(format!("{} on PID {}", what, pid)));
        }
        if touched == 0 {
            return Err(WardenError::ProcessNotFound(pid));
        }
        Ok(())
    }
}

impl ProcessControlProvider for WindowsProcessControl {
    fn priority(&self, handle: &ProcessHandle) -> Result<PriorityClass> {
        let h = self.open_verified(handle, PROCESS_QUERY_LIMITED_INFORMATION)?;
        let class = unsafe { GetPriorityClass(h.0) };
        if class == 0 {
            return Err(last_error(handle.pid, "GetPriorityClass"));
        }
        class_to_priority(class)
            .ok_or_else(|| WardenError::os(format!("unknown priority class {:#x}", class)))
    }

    fn set_priority(&self, handle: &ProcessHandle, class: PriorityClass) -> Result<()> {
        let h = self.open_verified(handle, PROCESS_SET_INFORMATION)?;
        check(
            unsafe { SetPriorityClass(h.0, priority_to_class(class)) },
            handle.pid,
            "SetPriorityClass",
        )
    }

    fn memory_priority(&self, handle: &ProcessHandle) -> Result<MemoryPriority> {
        let h = self.open_verified(handle, PROCESS_QUERY_LIMITED_INFORMATION)?;
        let mut info: MEMORY_PRIORITY_INFORMATION = unsafe { mem::zeroed() };
        check(
            unsafe {
                GetProcessInformation(
                    h.0,
                    ProcessMemoryPriority,
                    &mut info as *mut _ as *mut c_void,
                    mem::size_of::<MEMORY_PRIORITY_INFORMATION>() as u32,
                )
            },
            handle.pid,
            "GetProcessInformation(memory priority)",
        )?;
        Ok(MemoryPriority::from_level(info.MemoryPriority))
    }

    fn set_memory_priority(&self, handle: &ProcessHandle, level: MemoryPriority) -> Result<()> {
        let h = self.open_verified(handle, PROCESS_SET_INFORMATION)?;
        let info = MEMORY_PRIORITY_INFORMATION {
            MemoryPriority: level.level(),
        };
        check(
            unsafe {
                SetProcessInformation(
                    h.0,
                    ProcessMemoryPriority,
                    &info as *const _ as *const c_void,
                    mem::size_of::<MEMORY_PRIORITY_INFORMATION>() as u32,
                )
            },
            handle.pid,
            "SetProcessInformation(memory priority)",
        )
    }

    fn affinity(&self, handle: &ProcessHandle) -> Result<u64> {
        let h = self.open_verified(handle, PROCESS_QUERY_LIMITED_INFORMATION)?;
        let mut process_mask: usize = 0;
        let mut system_mask: usize = 0;
        check(
            unsafe { GetProcessAffinityMask(h.0, &mut process_mask, &mut system_mask) },
            handle.pid,
            "GetProcessAffinityMask",
        )?;
        Ok(process_mask as u64)
    }

    fn set_affinity(&self, handle: &ProcessHandle, mask: u64) -> Result<()> {
        let h = self.open_verified(handle, PROCESS_SET_INFORMATION)?;
        check(
            unsafe { SetProcessAffinityMask(h.0, mask as usize) },
            handle.pid,
            "SetProcessAffinityMask",
        )
    }

    fn trim_working_set(&self, handle: &ProcessHandle) -> Result<()> {
        let h = self.open_verified(handle, PROCESS_SET_QUOTA | PROCESS_QUERY_LIMITED_INFORMATION)?;
        check(unsafe { K32EmptyWorkingSet(h.0) }, handle.pid, "EmptyWorkingSet")
    }

    fn suspend(&self, handle: &ProcessHandle) -> Result<()> {
        self.for_each_thread(handle, "suspend", |t| unsafe { SuspendThread(t) } != u32::MAX)
    }

    fn resume(&self, handle: &ProcessHandle) -> Result<()> {
        self.for_each_thread(handle, "resume", |t| unsafe { ResumeThread(t) } != u32::MAX)
    }

    fn kill(&self, handle: &ProcessHandle) -> Result<()> {
        let h = self.open_verified(handle, PROCESS_TERMINATE)?;
        check(unsafe { TerminateProcess(h.0, 1) }, handle.pid, "TerminateProcess")
    }
}

pub struct WindowsPowerPolicy {
    identity: Arc<SysinfoProcessInfo>,
}

impl WindowsPowerPolicy {
    pub fn new(identity: Arc<SysinfoProcessInfo>) -> Self {
        Self { identity }
    }
}

impl PowerPolicyProvider for WindowsPowerPolicy {
    fn set_power_plan(&self, plan: PowerPlan) -> Result<()> {
        let scheme = match plan {
            PowerPlan::HighPerformance => "SCHEME_MIN",
            PowerPlan::Balanced => "SCHEME_BALANCED",
        };
        let status = Command::new("powercfg")
            .args(["/setactive", scheme])
            .status()
            .map_err(|_| WardenError::unsupported(Capability::PowerPlan))?;
        if status.success() {
            Ok(())
        } else {
            Err(WardenError::os(format!("powercfg exited with {}", status)))
        }
    }

    fn throttle_policy(&self, handle: &ProcessHandle) -> Result<bool> {
        self.identity.verify(handle)?;
        let h = open(handle.pid, PROCESS_QUERY_LIMITED_INFORMATION)?;
        let mut state: PROCESS_POWER_THROTTLING_STATE = unsafe { mem::zeroed() };
        state.Version = PROCESS_POWER_THROTTLING_CURRENT_VERSION;
        check(
            unsafe {
                GetProcessInformation(
                    h.0,
                    ProcessPowerThrottling,
                    &mut state as *mut _ as *mut c_void,
                    mem::size_of::<PROCESS_POWER_THROTTLING_STATE>() as u32,
                )
            },
            handle.pid,
            "GetProcessInformation(power throttling)",
        )?;
        Ok(state.ControlMask & PROCESS_POWER_THROTTLING_EXECUTION_SPEED != 0
            && state.StateMask & PROCESS_POWER_THROTTLING_EXECUTION_SPEED != 0)
    }

    fn set_throttle_policy(&self, handle: &ProcessHandle, eco: bool) -> Result<()> {
        self.identity.verify(handle)?;
        let h = open(handle.pid, PROCESS_SET_INFORMATION)?;
        let state = PROCESS_POWER_THROTTLING_STATE {
            Version: PROCESS_POWER_THROTTLING_CURRENT_VERSION,
            ControlMask: PROCESS_POWER_THROTTLING_EXECUTION_SPEED,
            StateMask: if eco { PROCESS_POWER_THROTTLING_EXECUTION_SPEED } else { 0 },
        };
        check(
            unsafe {
                SetProcessInformation(
                    h.0,
                    ProcessPowerThrottling,
                    &state as *const _ as *const c_void,
                    mem::size_of::<PROCESS_POWER_THROTTLING_STATE>() as u32,
                )
            },
            handle.pid,
            "SetProcessInformation(power throttling)",
        )
    }
}

/// Job object collecting governed processes.
///
/// The job carries no limits: a process can never leave a job, so any limit
/// would outlive a revert of the member's own attributes.
pub struct WindowsJobGroup {
    identity: Arc<SysinfoProcessInfo>,
    job: Option<OwnedHandle>,
}

// the job handle is only used through thread-safe kernel calls
unsafe impl Send for WindowsJobGroup {}
unsafe impl Sync for WindowsJobGroup {}

impl WindowsJobGroup {
    pub fn new(identity: Arc<SysinfoProcessInfo>) -> Self {
        Self {
            identity,
            job: create_job(),
        }
    }
}

fn create_job() -> Option<OwnedHandle> {
    let job = unsafe { CreateJobObjectW(std::ptr::null(), std::ptr::null()) };
    if job.is_null() {
        log::debug!("CreateJobObject failed (error {})", unsafe { GetLastError() });
        return None;
    }
    Some(OwnedHandle(job))
}

impl GroupingProvider for WindowsJobGroup {
    fn is_supported(&self) -> bool {
        self.job.is_some()
    }

    fn assign_to_throttled_group(&self, handle: &ProcessHandle) -> Result<()> {
        let Some(job) = &self.job else {
            return Err(WardenError::unsupported(Capability::ThrottledGroup));
        };
        self.identity.verify(handle)?;
        let h = open(handle.pid, PROCESS_SET_QUOTA | PROCESS_TERMINATE)?;
        check(
            unsafe { AssignProcessToJobObject(job.0, h.0) },
            handle.pid,
            "AssignProcessToJobObject",
        )
    }
}

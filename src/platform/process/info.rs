//! Process table access through sysinfo.

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::core::optimizer::{ProcessEntry, ProcessHandle, ProcessInfoProvider};
use crate::error::{Result, WardenError};

pub struct SysinfoProcessInfo {
    system: Mutex<System>,
    logical_cpus: f32,
}

impl SysinfoProcessInfo {
    pub fn new() -> Self {
        let logical_cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1) as f32;

        Self {
            system: Mutex::new(System::new()),
            logical_cpus,
        }
    }

    fn metrics_kind() -> ProcessRefreshKind {
        ProcessRefreshKind::nothing().with_cpu().with_memory()
    }

    /// Confirm `handle` still names the same process
    pub fn verify(&self, handle: &ProcessHandle) -> Result<()> {
        let pid = Pid::from_u32(handle.pid);
        let mut system = self.system.lock();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing(),
        );
        match system.process(pid) {
            Some(p) if p.start_time() == handle.start_time => Ok(()),
            _ => Err(WardenError::ProcessNotFound(handle.pid)),
        }
    }

    fn with_process<T, F>(&self, handle: &ProcessHandle, read: F) -> Result<T>
    where
        F: FnOnce(&sysinfo::Process) -> T,
    {
        let system = self.system.lock();
        match system.process(Pid::from_u32(handle.pid)) {
            Some(p) if p.start_time() == handle.start_time => Ok(read(p)),
            _ => Err(WardenError::ProcessNotFound(handle.pid)),
        }
    }
}

impl Default for SysinfoProcessInfo {
    fn default() -> Self {
        Self::new()
    }
}

fn entry(pid: Pid, process: &sysinfo::Process) -> ProcessEntry {
    ProcessEntry {
        handle: ProcessHandle::new(pid.as_u32(), process.start_time()),
        name: process.name().to_string_lossy().into_owned(),
    }
}

impl ProcessInfoProvider for SysinfoProcessInfo {
    fn list(&self) -> Result<Vec<ProcessEntry>> {
        let mut system = self.system.lock();
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, Self::metrics_kind());
        if system.processes().is_empty() {
            return Err(WardenError::os("process enumeration returned nothing"));
        }

        Ok(system
            .processes()
            .iter()
            // skip threads listed as tasks on Linux
            .filter(|(_, p)| p.thread_kind().is_none())
            .map(|(pid, p)| entry(*pid, p))
            .collect())
    }

    fn open(&self, pid: u32) -> Result<ProcessEntry> {
        let sys_pid = Pid::from_u32(pid);
        let mut system = self.system.lock();
        if system.process(sys_pid).is_none() {
            system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[sys_pid]),
                true,
                Self::metrics_kind(),
            );
        }
        system
            .process(sys_pid)
            .map(|p| entry(sys_pid, p))
            .ok_or(WardenError::ProcessNotFound(pid))
    }

    fn cpu_percent(&self, handle: &ProcessHandle) -> Result<f32> {
        let cpus = self.logical_cpus;
        self.with_process(handle, |p| (p.cpu_usage() / cpus).clamp(0.0, 100.0))
    }

    fn resident_bytes(&self, handle: &ProcessHandle) -> Result<u64> {
        self.with_process(handle, |p| p.memory())
    }

    fn is_foreground(&self, handle: &ProcessHandle) -> bool {
        foreground_pid() == Some(handle.pid)
    }

    fn refresh(&self, pids: &[u32]) {
        let pids: Vec<Pid> = pids.iter().map(|p| Pid::from_u32(*p)).collect();
        self.system.lock().refresh_processes_specifics(
            ProcessesToUpdate::Some(&pids),
            true,
            Self::metrics_kind(),
        );
    }
}

/// Pid owning the focused window
#[cfg(windows)]
pub fn foreground_pid() -> Option<u32> {
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        GetForegroundWindow, GetWindowThreadProcessId,
    };

    unsafe {
        let hwnd = GetForegroundWindow();
        if hwnd.is_null() {
            return None;
        }
        let mut pid: u32 = 0;
        GetWindowThreadProcessId(hwnd, &mut pid);
        (pid != 0).then_some(pid)
    }
}

/// No portable notion of a focused window outside Windows
#[cfg(not(windows))]
pub fn foreground_pid() -> Option<u32> {
    None
}

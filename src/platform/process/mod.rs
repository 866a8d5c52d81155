//! Native implementations of the optimizer's provider traits.

pub mod dry_run;
pub mod info;
pub mod unsupported;

#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

use std::sync::Arc;

use crate::core::optimizer::{
    GroupingProvider, PowerPolicyProvider, ProcessControlProvider, Providers,
};

pub use dry_run::{DryRunControl, DryRunGrouping, DryRunPower};
pub use info::{foreground_pid, SysinfoProcessInfo};
pub use unsupported::{NoGrouping, UnsupportedControl, UnsupportedPower};

#[cfg(windows)]
fn native_control(
    identity: &Arc<SysinfoProcessInfo>,
) -> (
    Arc<dyn ProcessControlProvider>,
    Arc<dyn PowerPolicyProvider>,
    Arc<dyn GroupingProvider>,
) {
    (
        Arc::new(windows::WindowsProcessControl::new(Arc::clone(identity))),
        Arc::new(windows::WindowsPowerPolicy::new(Arc::clone(identity))),
        Arc::new(windows::WindowsJobGroup::new(Arc::clone(identity))),
    )
}

#[cfg(unix)]
fn native_control(
    identity: &Arc<SysinfoProcessInfo>,
) -> (
    Arc<dyn ProcessControlProvider>,
    Arc<dyn PowerPolicyProvider>,
    Arc<dyn GroupingProvider>,
) {
    (
        Arc::new(unix::UnixProcessControl::new(Arc::clone(identity))),
        Arc::new(UnsupportedPower),
        Arc::new(NoGrouping),
    )
}

#[cfg(not(any(windows, unix)))]
fn native_control(
    _identity: &Arc<SysinfoProcessInfo>,
) -> (
    Arc<dyn ProcessControlProvider>,
    Arc<dyn PowerPolicyProvider>,
    Arc<dyn GroupingProvider>,
) {
    (
        Arc::new(UnsupportedControl),
        Arc::new(UnsupportedPower),
        Arc::new(NoGrouping),
    )
}

/// Providers for the current OS; with `dry_run` every mutation is only logged
pub fn native_providers(dry_run: bool) -> Providers {
    let info = Arc::new(SysinfoProcessInfo::new());
    let (control, power, grouping) = native_control(&info);

    if dry_run {
        log::info!("Dry run: no process will be modified");
        return Providers {
            info,
            control: Arc::new(DryRunControl::new(control)),
            power: Arc::new(DryRunPower::new(power)),
            grouping: Arc::new(DryRunGrouping::new(grouping)),
        };
    }

    Providers {
        info,
        control,
        power,
        grouping,
    }
}

//! Named bundles of power plan, game mode and governor settings.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use super::executor::ActionExecutor;
use super::governor::Governor;
use super::providers::PowerPlan;
use super::types::{Action, MemoryPriority, PriorityClass, ProcessHandle, SnapshotSet};
use crate::error::{Result, WardenError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub description: String,
    pub power_plan: PowerPlan,
    pub game_mode_enabled: bool,
    pub governor_enabled: bool,
    /// Priority given to the foreground process while game mode is on
    pub foreground_priority: PriorityClass,
}

pub fn builtin_profiles() -> Vec<Profile> {
    vec![
        Profile {
            name: "Gaming".into(),
            description: "Boost the foreground app, high performance power plan, quiet background"
                .into(),
            power_plan: PowerPlan::HighPerformance,
            game_mode_enabled: true,
            governor_enabled: true,
            foreground_priority: PriorityClass::High,
        },
        Profile {
            name: "Creator".into(),
            description: "Balanced power for editing and rendering, background kept tame".into(),
            power_plan: PowerPlan::Balanced,
            game_mode_enabled: false,
            governor_enabled: true,
            foreground_priority: PriorityClass::AboveNormal,
        },
        Profile {
            name: "Everyday".into(),
            description: "Balanced plan and default priorities".into(),
            power_plan: PowerPlan::Balanced,
            game_mode_enabled: false,
            governor_enabled: false,
            foreground_priority: PriorityClass::Normal,
        },
    ]
}

/// Case-insensitive lookup among the built-in profiles
pub fn find_profile(name: &str) -> Option<Profile> {
    builtin_profiles()
        .into_iter()
        .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
}

#[derive(Debug)]
pub struct ProfileReport {
    pub profile: Profile,
    pub power_plan: Result<()>,
    /// Foreground boost, when game mode is on and a foreground process exists
    pub boost: Option<(u32, Result<()>)>,
}

#[derive(Debug)]
pub struct ProfileManager {
    current: Mutex<Option<Profile>>,
    game_mode: AtomicBool,
    boosted: Mutex<HashSet<ProcessHandle>>,
}

impl Default for ProfileManager {
    fn default() -> Self {
        Self {
            current: Mutex::new(None),
            game_mode: AtomicBool::new(false),
            boosted: Mutex::new(HashSet::new()),
        }
    }
}

impl ProfileManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Profile> {
        self.current.lock().clone()
    }

    pub fn game_mode(&self) -> bool {
        self.game_mode.load(Ordering::Relaxed)
    }

    /// Switch power plan, game mode and governor to the named profile.
    ///
    /// A power plan the platform cannot switch is logged and reported in
    /// the result; the rest of the profile still applies.
    pub fn apply(
        &self,
        name: &str,
        executor: &ActionExecutor,
        governor: &Governor,
        set: &SnapshotSet,
    ) -> Result<ProfileReport> {
        let profile = find_profile(name)
            .ok_or_else(|| WardenError::config(format!("unknown profile '{}'", name)))?;

        let power_plan = executor.power().set_power_plan(profile.power_plan);
        match &power_plan {
            Ok(()) => log::info!("Power plan set to {}", profile.power_plan),
            Err(WardenError::Unsupported(_)) => {
                log::warn!("Power plan switching is not available on this system")
            }
            Err(e) => log::warn!("Could not set power plan {}: {}", profile.power_plan, e),
        }

        governor.set_enabled(profile.governor_enabled);
        self.game_mode.store(profile.game_mode_enabled, Ordering::Relaxed);
        self.boosted.lock().clear();
        *self.current.lock() = Some(profile.clone());
        log::info!("Applied profile: {}", profile.name);

        let boost = self.follow_foreground(set, executor);
        Ok(ProfileReport {
            profile,
            power_plan,
            boost,
        })
    }

    /// Boost a foreground process the first time it is seen in game mode
    pub fn follow_foreground(
        &self,
        set: &SnapshotSet,
        executor: &ActionExecutor,
    ) -> Option<(u32, Result<()>)> {
        if !self.game_mode() {
            return None;
        }
        let priority = self.current()?.foreground_priority;
        let pid = set.foreground?;
        let handle = set.get(pid)?.handle();

        {
            let mut boosted = self.boosted.lock();
            boosted.retain(|h| set.contains_handle(h));
            if !boosted.insert(handle) {
                return None;
            }
        }

        let result = executor
            .apply(pid, Action::SetPriority(priority))
            .and_then(|_| executor.apply(pid, Action::SetMemoryPriority(MemoryPriority::Normal)))
            .map(|_| ());
        match &result {
            Ok(()) => log::info!("Game mode boosted foreground PID {} to {}", pid, priority),
            Err(e) => log::debug!("Game mode boost for PID {} failed: {}", pid, e),
        }
        Some((pid, result))
    }
}

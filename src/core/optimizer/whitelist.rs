use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Processes the optimizer never touches, whatever the user configures
pub const SYSTEM_PROCESSES: &[&str] = &[
    "system",
    "system idle process",
    "registry",
    "smss.exe",
    "csrss.exe",
    "wininit.exe",
    "winlogon.exe",
    "services.exe",
    "lsass.exe",
    "svchost.exe",
    "dwm.exe",
    "fontdrvhost.exe",
    // unix equivalents
    "init",
    "systemd",
    "kthreadd",
    "launchd",
];

pub fn is_system_process(name: &str) -> bool {
    let name = name.trim().to_lowercase();
    SYSTEM_PROCESSES.contains(&name.as_str())
}

/// True for system processes and for this process itself
pub fn is_protected(pid: u32, name: &str) -> bool {
    pid == std::process::id() || is_system_process(name)
}

/// Case-insensitive set of exact process names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Whitelist {
    names: BTreeSet<String>,
}

impl Whitelist {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for name in names {
            list.insert(name.as_ref());
        }
        list
    }

    /// Returns false for blank names and duplicates
    pub fn insert(&mut self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return false;
        }
        self.names.insert(name)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(&name.trim().to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.trim().to_lowercase())
    }

    /// User entries plus the built-in system list
    pub fn excludes(&self, name: &str) -> bool {
        is_system_process(name) || self.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.names.iter()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl From<Vec<String>> for Whitelist {
    fn from(names: Vec<String>) -> Self {
        Whitelist::new(names)
    }
}

impl From<Whitelist> for Vec<String> {
    fn from(list: Whitelist) -> Self {
        list.names.into_iter().collect()
    }
}

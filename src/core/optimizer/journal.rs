//! Pre-change baselines for every process the executor has mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::types::{Attribute, AttributeValue, ProcessHandle, SnapshotSet};

/// Original attribute values of one process, captured on first mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevertRecord {
    pub pid: u32,
    pub start_time: u64,
    pub originals: BTreeMap<Attribute, AttributeValue>,
    pub first_captured: DateTime<Utc>,
}

impl RevertRecord {
    pub fn handle(&self) -> ProcessHandle {
        ProcessHandle::new(self.pid, self.start_time)
    }
}

#[derive(Debug, Default)]
pub struct RevertJournal {
    records: HashMap<u32, RevertRecord>,
}

impl RevertJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` as the baseline unless one already exists.
    ///
    /// Returns true when this call inserted the baseline. A record left over
    /// from a previous process with the same pid is discarded first.
    pub fn capture(&mut self, handle: &ProcessHandle, value: AttributeValue) -> bool {
        let record = self
            .records
            .entry(handle.pid)
            .and_modify(|r| {
                if r.start_time != handle.start_time {
                    r.start_time = handle.start_time;
                    r.originals.clear();
                    r.first_captured = Utc::now();
                }
            })
            .or_insert_with(|| RevertRecord {
                pid: handle.pid,
                start_time: handle.start_time,
                originals: BTreeMap::new(),
                first_captured: Utc::now(),
            });

        let attribute = value.attribute();
        if record.originals.contains_key(&attribute) {
            return false;
        }
        record.originals.insert(attribute, value);
        true
    }

    /// Undo a capture whose mutation never happened
    pub fn discard(&mut self, pid: u32, attribute: Attribute) {
        self.restored(pid, attribute);
    }

    /// Drop one attribute after a successful restore
    pub fn restored(&mut self, pid: u32, attribute: Attribute) {
        if let Some(record) = self.records.get_mut(&pid) {
            record.originals.remove(&attribute);
            if record.originals.is_empty() {
                self.records.remove(&pid);
            }
        }
    }

    pub fn get(&self, pid: u32) -> Option<&RevertRecord> {
        self.records.get(&pid)
    }

    pub fn original(&self, pid: u32, attribute: Attribute) -> Option<AttributeValue> {
        self.records
            .get(&pid)
            .and_then(|r| r.originals.get(&attribute).copied())
    }

    pub fn has_record(&self, pid: u32) -> bool {
        self.records.contains_key(&pid)
    }

    pub fn purge(&mut self, pid: u32) -> Option<RevertRecord> {
        self.records.remove(&pid)
    }

    /// Forget processes that exited or whose pid was reused
    pub fn retain_live(&mut self, set: &SnapshotSet) -> usize {
        let before = self.records.len();
        self.records.retain(|_, r| set.contains_handle(&r.handle()));
        before - self.records.len()
    }

    /// Every record, ordered by pid
    pub fn records(&self) -> Vec<RevertRecord> {
        let mut records: Vec<RevertRecord> = self.records.values().cloned().collect();
        records.sort_by_key(|r| r.pid);
        records
    }

    /// Take over records from an earlier session.
    ///
    /// Only records `is_live` accepts are kept, and a pid already tracked in
    /// this session keeps its own baseline. Returns how many were adopted.
    pub fn adopt<F>(&mut self, records: Vec<RevertRecord>, is_live: F) -> usize
    where
        F: Fn(&ProcessHandle) -> bool,
    {
        let mut adopted = 0;
        for record in records {
            if record.originals.is_empty()
                || self.records.contains_key(&record.pid)
                || !is_live(&record.handle())
            {
                continue;
            }
            self.records.insert(record.pid, record);
            adopted += 1;
        }
        adopted
    }

    pub fn pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.records.keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

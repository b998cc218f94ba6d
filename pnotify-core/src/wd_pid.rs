//! Side list of (watch descriptor, pid) records kept for debug output.
//!
//! The list has its own lock, separate from the registry. Records are
//! never freed with that lock held: bulk removal moves them onto a local
//! list first.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::group::GroupId;
use crate::watch::Wd;

/// Which process registered which watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WdPid {
    pub wd: Wd,
    pub pid: u32,
}

/// The side list of one group.
#[derive(Debug, Default)]
pub struct WdPidList {
    entries: Mutex<Vec<WdPid>>,
}

impl WdPidList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, wd: Wd, pid: u32) {
        self.entries.lock().push(WdPid { wd, pid });
    }

    /// Unlink the record for `wd`. It is dropped by the caller, unlocked.
    pub fn remove(&self, wd: Wd) -> Option<WdPid> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|e| e.wd == wd)?;
        Some(entries.remove(index))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Whether the list lock is currently held.
    pub fn is_locked(&self) -> bool {
        self.entries.is_locked()
    }

    /// Copy of the records, for diagnostics.
    pub fn snapshot(&self) -> Vec<WdPid> {
        self.entries.lock().clone()
    }

    /// Move every record onto a local list, then release the lock and hand
    /// each record to `free`. Returns the number of records freed.
    pub fn drain_and_free(&self, group: GroupId, mut free: impl FnMut(WdPid)) -> usize {
        let local = {
            let mut entries = self.entries.lock();
            for entry in entries.iter() {
                trace!(%group, wd = entry.wd, pid = entry.pid, "deleting wd/pid entry");
            }
            std::mem::take(&mut *entries)
        };

        let freed = local.len();
        for entry in local {
            free(entry);
        }
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_remove_single_entry() {
        let list = WdPidList::new();
        list.insert(1, 100);
        list.insert(2, 200);

        assert_eq!(list.remove(1), Some(WdPid { wd: 1, pid: 100 }));
        assert_eq!(list.remove(1), None);
        assert_eq!(list.snapshot(), vec![WdPid { wd: 2, pid: 200 }]);
    }

    #[test]
    fn test_drain_frees_without_lock() {
        let list = WdPidList::new();
        for wd in 1..=4 {
            list.insert(wd, 1000 + wd as u32);
        }

        let mut freed = Vec::new();
        let count = list.drain_and_free(GroupId::next(), |entry| {
            assert!(!list.is_locked(), "entry freed while the list lock is held");
            freed.push(entry.wd);
        });

        assert_eq!(count, 4);
        assert_eq!(freed, vec![1, 2, 3, 4]);
        assert!(list.is_empty());
    }

    #[test]
    fn test_drain_empty_list() {
        let list = WdPidList::new();
        assert_eq!(list.drain_and_free(GroupId::next(), drop), 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let list = WdPidList::new();
        list.insert(3, 77);

        let json = serde_json::to_string(&list.snapshot()).unwrap();
        assert_eq!(json, r#"[{"wd":3,"pid":77}]"#);
    }
}

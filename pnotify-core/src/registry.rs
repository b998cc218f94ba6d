//! Watch-descriptor registry of a group.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{NotifyError, Result};
use crate::watch::{Watch, Wd};

#[derive(Default)]
struct RegistryInner {
    entries: BTreeMap<Wd, Arc<Watch>>,
    last_wd: Wd,
    destroyed: bool,
}

impl RegistryInner {
    /// Next free descriptor after the last one handed out, wrapping to 1.
    fn next_free(&self) -> Option<Wd> {
        let mut candidate = self.last_wd;
        for _ in 0..=self.entries.len() {
            candidate = if candidate >= Wd::MAX { 1 } else { candidate + 1 };
            if !self.entries.contains_key(&candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

/// Maps watch descriptors to the watches of one group.
#[derive(Default)]
pub struct WatchRegistry {
    inner: Mutex<RegistryInner>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a descriptor and insert the watch built for it.
    ///
    /// Descriptors are handed out cyclically starting at 1, so a freed
    /// descriptor is not reused until the space wraps.
    pub fn allocate(&self, build: impl FnOnce(Wd) -> Arc<Watch>) -> Result<Arc<Watch>> {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return Err(NotifyError::GroupClosed);
        }

        let wd = inner.next_free().ok_or(NotifyError::OutOfMemory)?;
        let watch = build(wd);
        inner.entries.insert(wd, Arc::clone(&watch));
        inner.last_wd = wd;
        Ok(watch)
    }

    pub fn get(&self, wd: Wd) -> Option<Arc<Watch>> {
        self.inner.lock().entries.get(&wd).cloned()
    }

    pub fn remove(&self, wd: Wd) -> Option<Arc<Watch>> {
        self.inner.lock().entries.remove(&wd)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.lock().destroyed
    }

    /// Visit every entry in descriptor order with the registry locked.
    pub fn for_each(&self, mut visit: impl FnMut(Wd, &Arc<Watch>)) {
        let inner = self.inner.lock();
        for (wd, watch) in &inner.entries {
            visit(*wd, watch);
        }
    }

    /// References to every registered watch.
    pub fn watches(&self) -> Vec<Arc<Watch>> {
        self.inner.lock().entries.values().cloned().collect()
    }

    /// Remove every entry and refuse further allocations.
    ///
    /// The removed entries are returned so they are released after the
    /// registry lock is dropped.
    pub fn destroy(&self) -> Vec<Arc<Watch>> {
        let mut inner = self.inner.lock();
        inner.destroyed = true;
        std::mem::take(&mut inner.entries).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventMask, InodeId};
    use crate::group::GroupId;
    use pretty_assertions::assert_eq;

    fn insert(registry: &WatchRegistry, group: GroupId) -> Arc<Watch> {
        registry
            .allocate(|wd| Arc::new(Watch::new(wd, group, InodeId(1), EventMask::MODIFY, 7)))
            .unwrap()
    }

    #[test]
    fn test_descriptors_start_at_one() {
        let registry = WatchRegistry::new();
        let group = GroupId::next();

        assert_eq!(insert(&registry, group).wd(), 1);
        assert_eq!(insert(&registry, group).wd(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_removed_descriptor_not_reused_immediately() {
        let registry = WatchRegistry::new();
        let group = GroupId::next();

        let first = insert(&registry, group);
        assert!(registry.remove(first.wd()).is_some());
        assert_eq!(insert(&registry, group).wd(), 2);
        assert!(registry.get(first.wd()).is_none());
    }

    #[test]
    fn test_allocation_wraps_past_max() {
        let registry = WatchRegistry::new();
        let group = GroupId::next();
        registry.inner.lock().last_wd = Wd::MAX - 1;

        assert_eq!(insert(&registry, group).wd(), Wd::MAX);
        assert_eq!(insert(&registry, group).wd(), 1);
    }

    #[test]
    fn test_for_each_visits_in_order() {
        let registry = WatchRegistry::new();
        let group = GroupId::next();
        for _ in 0..3 {
            insert(&registry, group);
        }

        let mut seen = Vec::new();
        registry.for_each(|wd, watch| {
            assert_eq!(watch.wd(), wd);
            seen.push(wd);
        });
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_destroy_empties_and_locks_out() {
        let registry = WatchRegistry::new();
        let group = GroupId::next();
        insert(&registry, group);
        insert(&registry, group);

        let removed = registry.destroy();
        assert_eq!(removed.len(), 2);
        assert!(registry.is_empty());
        assert!(registry.is_destroyed());
        assert!(matches!(
            registry.allocate(|wd| Arc::new(Watch::new(wd, group, InodeId(1), EventMask::MODIFY, 7))),
            Err(NotifyError::GroupClosed)
        ));
    }
}

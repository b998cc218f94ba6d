//! Per-(event, group) private data.
//!
//! Every time a group newly queues an event it binds an [`EventPrivate`]
//! carrying the watch descriptor that produced it. Attachments come from an
//! [`AttachmentCache`], which may be bounded so allocation failure can be
//! exercised. Freeing is dropping: the cache slot is returned on drop.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{NotifyError, Result};
use crate::group::GroupId;
use crate::watch::Wd;

/// The watch descriptor a group recorded for one queued event.
#[derive(Debug)]
pub struct EventPrivate {
    group: GroupId,
    wd: Wd,
    _slot: CacheSlot,
}

impl EventPrivate {
    /// The group that owns this attachment (not an ownership edge).
    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn wd(&self) -> Wd {
        self.wd
    }
}

#[derive(Debug)]
struct CacheInner {
    live: AtomicUsize,
    capacity: Option<usize>,
}

#[derive(Debug)]
struct CacheSlot {
    cache: Arc<CacheInner>,
}

impl Drop for CacheSlot {
    fn drop(&mut self) {
        self.cache.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Source of [`EventPrivate`] records.
#[derive(Debug, Clone)]
pub struct AttachmentCache {
    inner: Arc<CacheInner>,
}

impl AttachmentCache {
    /// Create a cache; `capacity` of None never fails.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                live: AtomicUsize::new(0),
                capacity,
            }),
        }
    }

    /// Allocate an attachment for `group`, failing when the cache is exhausted.
    pub fn alloc(&self, group: GroupId, wd: Wd) -> Result<EventPrivate> {
        let capacity = self.inner.capacity;
        self.inner
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| match capacity {
                Some(max) if live >= max => None,
                _ => Some(live + 1),
            })
            .map_err(|_| NotifyError::OutOfMemory)?;

        Ok(EventPrivate {
            group,
            wd,
            _slot: CacheSlot {
                cache: Arc::clone(&self.inner),
            },
        })
    }

    /// Attachments allocated and not yet freed.
    pub fn live(&self) -> usize {
        self.inner.live.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }
}

impl Default for AttachmentCache {
    fn default() -> Self {
        Self::new(None)
    }
}

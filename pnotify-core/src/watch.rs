//! Watches (marks) binding an inode to a group.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::event::{EventMask, InodeId};
use crate::group::GroupId;

/// Watch descriptor, unique within a group while the watch is live.
pub type Wd = i32;

/// A registration of interest in one inode on behalf of one group.
#[derive(Debug)]
pub struct Watch {
    wd: Wd,
    group: GroupId,
    target: InodeId,
    mask: EventMask,
    pid: u32,
    alive: AtomicBool,
}

impl Watch {
    pub(crate) fn new(wd: Wd, group: GroupId, target: InodeId, mask: EventMask, pid: u32) -> Self {
        Self {
            wd,
            group,
            target,
            mask,
            pid,
            alive: AtomicBool::new(true),
        }
    }

    pub fn wd(&self) -> Wd {
        self.wd
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn target(&self) -> InodeId {
        self.target
    }

    pub fn mask(&self) -> EventMask {
        self.mask
    }

    /// Process that registered the watch.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether the watch goes away after its first delivery.
    pub fn is_oneshot(&self) -> bool {
        self.mask.contains(EventMask::ONESHOT)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Whether this watch wants events of `mask`.
    pub fn wants(&self, mask: EventMask) -> bool {
        self.mask.intersects(mask & EventMask::ALL_EVENTS)
    }

    /// Mark the watch dead. Returns true for the caller that killed it.
    pub(crate) fn kill(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }
}

//! Per-user accounting of open groups and live watches.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{NotifyError, Result};

/// Counters shared by every group a user holds open.
#[derive(Debug)]
pub struct UserAccount {
    uid: u32,
    instances: AtomicUsize,
    watches: AtomicUsize,
}

impl UserAccount {
    pub fn new(uid: u32) -> Arc<Self> {
        Arc::new(Self {
            uid,
            instances: AtomicUsize::new(0),
            watches: AtomicUsize::new(0),
        })
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Open groups charged to this user.
    pub fn instances(&self) -> usize {
        self.instances.load(Ordering::Acquire)
    }

    /// Live watches charged to this user.
    pub fn watches(&self) -> usize {
        self.watches.load(Ordering::Acquire)
    }

    pub(crate) fn charge_instance(&self, limit: usize) -> Result<()> {
        charge(&self.instances, limit).map_err(|_| NotifyError::InstanceLimitExceeded {
            uid: self.uid,
            limit,
        })?;
        Ok(())
    }

    pub(crate) fn uncharge_instance(&self) {
        uncharge(&self.instances);
    }

    pub(crate) fn charge_watch(&self, limit: usize) -> Result<()> {
        charge(&self.watches, limit).map_err(|_| NotifyError::WatchLimitExceeded {
            uid: self.uid,
            limit,
        })?;
        Ok(())
    }

    pub(crate) fn uncharge_watch(&self) {
        uncharge(&self.watches);
    }
}

fn charge(counter: &AtomicUsize, limit: usize) -> std::result::Result<usize, usize> {
    counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
        (n < limit).then_some(n + 1)
    })
}

fn uncharge(counter: &AtomicUsize) {
    // saturate: an unbalanced uncharge must not wrap the counter
    let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
}

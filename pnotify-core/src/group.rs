//! Subscriber groups.
//!
//! A [`Group`] is one open notification session. It owns a pending-event
//! queue, a watch registry, the wd/pid side list and a charge against its
//! user's instance limit. The backend behind it is reached through
//! [`NotifyOps`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::config::PnotifyConfig;
use crate::error::{NotifyError, Result};
use crate::event::{EventHandle, EventMask, InodeId};
use crate::ops::{NotifyOps, TeardownReport};
use crate::private::EventPrivate;
use crate::queue::NotificationQueue;
use crate::registry::WatchRegistry;
use crate::user::UserAccount;
use crate::watch::{Watch, Wd};
use crate::wd_pid::{WdPid, WdPidList};

/// Process-unique identifier of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u64);

impl GroupId {
    /// Allocate a fresh identifier.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// An event taken off the queue, with the descriptor of the watch that
/// produced it (None for overflow events).
#[derive(Debug)]
pub struct QueuedEvent {
    pub event: EventHandle,
    pub wd: Option<Wd>,
}

/// One subscriber group.
pub struct Group {
    id: GroupId,
    ops: Arc<dyn NotifyOps>,
    queue: NotificationQueue,
    registry: WatchRegistry,
    wd_pid: WdPidList,
    user: Mutex<Option<Arc<UserAccount>>>,
    max_user_watches: usize,
    closed: AtomicBool,
}

impl Group {
    /// Open a group, charging it to `user`.
    pub fn new(
        ops: Arc<dyn NotifyOps>,
        config: &PnotifyConfig,
        user: Arc<UserAccount>,
    ) -> Result<Self> {
        user.charge_instance(config.max_user_instances)?;

        let id = GroupId::next();
        debug!(group = %id, uid = user.uid(), "opened group");

        Ok(Self {
            id,
            ops,
            queue: NotificationQueue::new(id, config.max_queued_events),
            registry: WatchRegistry::new(),
            wd_pid: WdPidList::new(),
            user: Mutex::new(Some(user)),
            max_user_watches: config.max_user_watches,
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn queue(&self) -> &NotificationQueue {
        &self.queue
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    pub fn wd_pid(&self) -> &WdPidList {
        &self.wd_pid
    }

    /// The user this group is charged to, until teardown releases it.
    pub fn user(&self) -> Option<Arc<UserAccount>> {
        self.user.lock().clone()
    }

    pub(crate) fn take_user(&self) -> Option<Arc<UserAccount>> {
        self.user.lock().take()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Watch `target` for the changes in `mask` on behalf of `pid`.
    pub fn add_watch(&self, target: InodeId, mask: EventMask, pid: u32) -> Result<Arc<Watch>> {
        if self.is_closed() {
            return Err(NotifyError::GroupClosed);
        }
        let user = self.user().ok_or(NotifyError::GroupClosed)?;
        user.charge_watch(self.max_user_watches)?;

        let id = self.id;
        let watch = match self
            .registry
            .allocate(|wd| Arc::new(Watch::new(wd, id, target, mask, pid)))
        {
            Ok(watch) => watch,
            Err(err) => {
                user.uncharge_watch();
                return Err(err);
            }
        };
        self.wd_pid.insert(watch.wd(), pid);

        debug!(group = %self.id, wd = watch.wd(), ?target, ?mask, pid, "added watch");
        Ok(watch)
    }

    pub fn watch(&self, wd: Wd) -> Option<Arc<Watch>> {
        self.registry.get(wd)
    }

    /// Remove the watch registered under `wd`.
    pub fn remove_watch(&self, wd: Wd) -> Result<()> {
        let watch = self.registry.get(wd).ok_or(NotifyError::UnknownWatch(wd))?;
        self.destroy_watch(&watch);
        Ok(())
    }

    /// Destroy `watch`. Only the first call for a watch reaches the backend.
    pub fn destroy_watch(&self, watch: &Arc<Watch>) -> bool {
        if !watch.kill() {
            return false;
        }
        debug!(group = %self.id, wd = watch.wd(), "destroying watch");
        self.ops.on_watch_freeing(watch, self);
        true
    }

    /// Deliver `event` through `watch` if the watch is interested in it.
    pub fn send_event(&self, watch: &Arc<Watch>, event: &EventHandle) -> Result<()> {
        if !watch.is_alive() || watch.group() != self.id || !watch.wants(event.mask()) {
            return Ok(());
        }
        if !self.ops.should_deliver(
            self,
            event.to_tell(),
            watch,
            None,
            event.mask(),
            event.data(),
        ) {
            return Ok(());
        }
        self.ops.handle_event(self, watch, None, event)
    }

    /// Take the oldest pending event off the queue.
    pub fn dequeue_event(&self) -> Option<QueuedEvent> {
        let (event, attachment) = self.queue.dequeue()?;
        let wd = attachment.as_ref().map(EventPrivate::wd);
        if let Some(attachment) = attachment {
            self.ops.free_private_attachment(attachment);
        }
        Some(QueuedEvent { event, wd })
    }

    /// Pending events that carry an attachment of this group.
    pub fn pending_attachments(&self) -> usize {
        self.queue
            .snapshot()
            .iter()
            .filter(|event| event.wd_for(self.id).is_some())
            .count()
    }

    /// The wd/pid side list, for debug dumps.
    pub fn wd_pid_snapshot(&self) -> Vec<WdPid> {
        self.wd_pid.snapshot()
    }

    /// Shut the group down: destroy remaining watches, discard pending
    /// events and release backend state. Returns None if already closed.
    pub fn close(&self) -> Option<TeardownReport> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return None;
        }

        for watch in self.registry.watches() {
            self.destroy_watch(&watch);
        }

        for (event, attachment) in self.queue.shutdown() {
            if let Some(attachment) = attachment {
                self.ops.free_private_attachment(attachment);
            }
            drop(event);
        }

        let report = self.ops.free_group_private_state(self);
        debug!(group = %self.id, ?report, "closed group");
        Some(report)
    }
}

impl Drop for Group {
    fn drop(&mut self) {
        self.close();
    }
}

//! The pnotify backend: event delivery, watch removal and group teardown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace, warn};

use crate::config::PnotifyConfig;
use crate::error::Result;
use crate::event::{Event, EventData, EventHandle, EventMask, InodeId};
use crate::group::Group;
use crate::merge::try_merge;
use crate::ops::{NotifyOps, TeardownReport};
use crate::private::{AttachmentCache, EventPrivate};
use crate::queue::Enqueued;
use crate::user::UserAccount;
use crate::watch::Watch;

/// Fires at most once until reset.
///
/// Guards the leak warning so a buggy watch-destruction path cannot flood
/// the log. Owned by the backend instance rather than a static, so each
/// backend (and each test) starts unarmed.
#[derive(Debug, Default)]
pub struct LeakWarning {
    fired: AtomicBool,
}

impl LeakWarning {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true for exactly one caller.
    fn fire(&self) -> bool {
        !self.fired.swap(true, Ordering::AcqRel)
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Re-arm the warning.
    pub fn reset(&self) {
        self.fired.store(false, Ordering::Release);
    }
}

/// Backend state shared by every group it opens.
#[derive(Debug)]
pub struct Pnotify {
    config: PnotifyConfig,
    attachments: AttachmentCache,
    leak_warning: LeakWarning,
}

impl Pnotify {
    /// Create a backend with validated limits.
    pub fn new(config: PnotifyConfig) -> Result<Arc<Self>> {
        config.validate()?;
        let attachments = AttachmentCache::new(config.max_attachments);

        Ok(Arc::new(Self {
            config,
            attachments,
            leak_warning: LeakWarning::new(),
        }))
    }

    /// Open a group served by this backend and charged to `user`.
    pub fn open_group(self: &Arc<Self>, user: Arc<UserAccount>) -> Result<Group> {
        let backend: Arc<Self> = Arc::clone(self);
        Group::new(backend, &self.config, user)
    }

    pub fn config(&self) -> &PnotifyConfig {
        &self.config
    }

    pub fn attachments(&self) -> &AttachmentCache {
        &self.attachments
    }

    pub fn leak_warning(&self) -> &LeakWarning {
        &self.leak_warning
    }

    /// Queue the ignored event that tells the reader `mark` is gone.
    fn send_ignored(&self, mark: &Watch, group: &Group) {
        let ignored = Event::control(EventMask::IGNORED).into_handle();
        let attachment = match self.attachments.alloc(group.id(), mark.wd()) {
            Ok(attachment) => attachment,
            Err(err) => {
                debug!(group = %group.id(), wd = mark.wd(), %err, "skipping ignored event");
                return;
            }
        };

        match group.queue().enqueue(&ignored, Some(attachment), None) {
            Ok(Enqueued::Added) => {}
            Ok(Enqueued::Replaced { attachment, .. }) => {
                if let Some(attachment) = attachment {
                    self.free_private_attachment(attachment);
                }
            }
            Err(err) => {
                debug!(group = %group.id(), wd = mark.wd(), %err, "skipping ignored event");
            }
        }
    }
}

impl NotifyOps for Pnotify {
    fn handle_event(
        &self,
        group: &Group,
        inode_mark: &Arc<Watch>,
        _mount_mark: Option<&Arc<Watch>>,
        event: &EventHandle,
    ) -> Result<()> {
        debug!(
            group = %group.id(),
            mask = ?event.mask(),
            to_tell = ?event.to_tell(),
            "handling event"
        );

        let wd = inode_mark.wd();
        let attachment = self.attachments.alloc(group.id(), wd)?;

        let result = match group.queue().enqueue(event, Some(attachment), Some(try_merge)) {
            Ok(Enqueued::Added) => Ok(()),
            Ok(Enqueued::Replaced {
                event: existing,
                attachment,
            }) => {
                if let Some(attachment) = attachment {
                    self.free_private_attachment(attachment);
                }
                trace!(group = %group.id(), mask = ?existing.mask(), "event replaced");
                drop(existing);
                Ok(())
            }
            Err(err) => Err(err),
        };

        if inode_mark.is_oneshot() {
            group.destroy_watch(inode_mark);
        }

        result
    }

    fn should_deliver(
        &self,
        _group: &Group,
        _to_tell: Option<InodeId>,
        _inode_mark: &Arc<Watch>,
        _mount_mark: Option<&Arc<Watch>>,
        _mask: EventMask,
        _data: &EventData,
    ) -> bool {
        true
    }

    fn on_watch_freeing(&self, mark: &Arc<Watch>, group: &Group) {
        self.send_ignored(mark, group);

        if group.registry().remove(mark.wd()).is_none() {
            debug!(group = %group.id(), wd = mark.wd(), "watch was not in the registry");
        }
        if let Some(entry) = group.wd_pid().remove(mark.wd()) {
            trace!(group = %group.id(), wd = entry.wd, pid = entry.pid, "removed wd/pid entry");
        }
        if let Some(user) = group.user() {
            user.uncharge_watch();
        }
    }

    fn free_group_private_state(&self, group: &Group) -> TeardownReport {
        let mut report = TeardownReport::default();

        // Every watch should have left the registry through
        // on_watch_freeing by now; anything still here is leaked.
        group.registry().for_each(|wd, watch| {
            report.leaked_watches += 1;
            if self.leak_warning.fire() {
                report.leak_warned = true;
                warn!(
                    group = %group.id(),
                    wd,
                    pid = watch.pid(),
                    watch_group = %watch.group(),
                    target = ?watch.target(),
                    "pnotify closing but watch still in registry, probably leaking memory"
                );
            }
        });
        // released outside the registry lock
        drop(group.registry().destroy());

        if let Some(user) = group.take_user() {
            user.uncharge_instance();
        }

        report.wd_pid_freed = group.wd_pid().drain_and_free(group.id(), drop);
        report
    }

    fn free_private_attachment(&self, attachment: EventPrivate) {
        trace!(group = %attachment.group(), wd = attachment.wd(), "freeing attachment");
        drop(attachment);
    }
}

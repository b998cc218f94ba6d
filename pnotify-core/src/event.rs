//! Filesystem change events.
//!
//! An [`Event`] is built once by the code that observed the change and is
//! then shared, through [`EventHandle`], by every group that queues it. Its
//! public fields never change after construction. The only mutable part is
//! the list of private attachments, guarded by the event lock.

use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

use crate::group::GroupId;
use crate::private::EventPrivate;
use crate::watch::Wd;

bitflags! {
    /// Kinds of change carried by an event or requested by a watch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        const ACCESS        = 0x0000_0001;
        const MODIFY        = 0x0000_0002;
        const ATTRIB        = 0x0000_0004;
        const CLOSE_WRITE   = 0x0000_0008;
        const CLOSE_NOWRITE = 0x0000_0010;
        const OPEN          = 0x0000_0020;
        const MOVED_FROM    = 0x0000_0040;
        const MOVED_TO      = 0x0000_0080;
        const CREATE        = 0x0000_0100;
        const DELETE        = 0x0000_0200;
        const DELETE_SELF   = 0x0000_0400;
        const MOVE_SELF     = 0x0000_0800;
        const UNMOUNT       = 0x0000_2000;
        /// The queue overflowed and events were lost.
        const Q_OVERFLOW    = 0x0000_4000;
        /// The watch was removed.
        const IGNORED       = 0x0000_8000;
        /// The subject of the event is a directory.
        const ISDIR         = 0x4000_0000;
        /// Destroy the watch after its first delivery.
        const ONESHOT       = 0x8000_0000;

        const CLOSE = Self::CLOSE_WRITE.bits() | Self::CLOSE_NOWRITE.bits();
        const MOVE = Self::MOVED_FROM.bits() | Self::MOVED_TO.bits();
        const ALL_EVENTS = Self::ACCESS.bits()
            | Self::MODIFY.bits()
            | Self::ATTRIB.bits()
            | Self::CLOSE.bits()
            | Self::OPEN.bits()
            | Self::MOVE.bits()
            | Self::CREATE.bits()
            | Self::DELETE.bits()
            | Self::DELETE_SELF.bits()
            | Self::MOVE_SELF.bits();
    }
}

/// Identity of a watched inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InodeId(pub u64);

/// Identity of a mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MountId(pub u64);

/// Identity of a path component within a mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DentryId(pub u64);

/// Discriminant of [`EventData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Inode,
    Path,
    None,
}

/// What the event refers to beyond the inode it is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventData {
    /// Raised against an inode, possibly naming a child entry.
    Inode,

    /// Raised against a path, identified by mount and dentry.
    Path { mount: MountId, dentry: DentryId },

    /// Control events (overflow, ignored).
    None,
}

impl EventData {
    /// The variant tag.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Inode => DataType::Inode,
            Self::Path { .. } => DataType::Path,
            Self::None => DataType::None,
        }
    }
}

/// Shared handle to an event. Cloning takes a reference; dropping releases it.
pub type EventHandle = Arc<Event>;

/// One filesystem change.
pub struct Event {
    mask: EventMask,
    to_tell: Option<InodeId>,
    data: EventData,
    name: Option<String>,
    cookie: u32,
    private_data: Mutex<Vec<EventPrivate>>,
}

impl Event {
    fn with_data(
        mask: EventMask,
        to_tell: Option<InodeId>,
        data: EventData,
        name: Option<String>,
    ) -> Self {
        Self {
            mask,
            to_tell,
            data,
            name: name.filter(|n| !n.is_empty()),
            cookie: 0,
            private_data: Mutex::new(Vec::new()),
        }
    }

    /// An event raised against an inode, optionally naming a child entry.
    pub fn inode(mask: EventMask, to_tell: InodeId, name: Option<&str>) -> Self {
        Self::with_data(
            mask,
            Some(to_tell),
            EventData::Inode,
            name.map(String::from),
        )
    }

    /// An event raised against a path.
    pub fn path(mask: EventMask, to_tell: InodeId, mount: MountId, dentry: DentryId) -> Self {
        Self::with_data(mask, Some(to_tell), EventData::Path { mount, dentry }, None)
    }

    /// A control event with no subject (overflow, ignored).
    pub fn control(mask: EventMask) -> Self {
        Self::with_data(mask, None, EventData::None, None)
    }

    /// Attach a rename cookie.
    pub fn with_cookie(mut self, cookie: u32) -> Self {
        self.cookie = cookie;
        self
    }

    /// Wrap the event in a shared handle.
    pub fn into_handle(self) -> EventHandle {
        Arc::new(self)
    }

    pub fn mask(&self) -> EventMask {
        self.mask
    }

    /// The inode this event is addressed to.
    pub fn to_tell(&self) -> Option<InodeId> {
        self.to_tell
    }

    pub fn data(&self) -> &EventData {
        &self.data
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Length of the name in bytes, zero when there is none.
    pub fn name_len(&self) -> usize {
        self.name.as_ref().map_or(0, String::len)
    }

    pub fn cookie(&self) -> u32 {
        self.cookie
    }

    /// Number of attachments currently bound to this event.
    pub fn attachment_count(&self) -> usize {
        self.private_data.lock().len()
    }

    /// Watch descriptor recorded for `group`, if the group queued this event.
    pub fn wd_for(&self, group: GroupId) -> Option<Wd> {
        self.private_data
            .lock()
            .iter()
            .find(|p| p.group() == group)
            .map(EventPrivate::wd)
    }

    /// Take the event lock.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Vec<EventPrivate>> {
        self.private_data.lock()
    }

    /// Unbind the attachment `group` holds on this event.
    pub(crate) fn detach(&self, group: GroupId) -> Option<EventPrivate> {
        let mut private_data = self.private_data.lock();
        let index = private_data.iter().position(|p| p.group() == group)?;
        Some(private_data.remove(index))
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("mask", &self.mask)
            .field("to_tell", &self.to_tell)
            .field("data", &self.data)
            .field("name", &self.name)
            .field("cookie", &self.cookie)
            .finish_non_exhaustive()
    }
}

impl Drop for Event {
    fn drop(&mut self) {
        trace!(
            mask = ?self.mask,
            to_tell = ?self.to_tell,
            name = ?self.name,
            "destroying event"
        );
    }
}

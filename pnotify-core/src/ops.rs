//! Callbacks a group makes into its notification backend.

use std::sync::Arc;

use crate::error::Result;
use crate::event::{EventData, EventHandle, EventMask, InodeId};
use crate::group::Group;
use crate::private::EventPrivate;
use crate::watch::Watch;

/// What [`NotifyOps::free_group_private_state`] found and released.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Watches still in the registry when the group closed.
    pub leaked_watches: usize,

    /// Whether this teardown emitted the leak warning.
    pub leak_warned: bool,

    /// Side-list records freed.
    pub wd_pid_freed: usize,
}

/// Backend hooks, called by a [`Group`] at the points it needs a decision
/// or a cleanup from the backend that owns it.
pub trait NotifyOps: Send + Sync {
    /// Queue `event` for `group` on behalf of `inode_mark`.
    fn handle_event(
        &self,
        group: &Group,
        inode_mark: &Arc<Watch>,
        mount_mark: Option<&Arc<Watch>>,
        event: &EventHandle,
    ) -> Result<()>;

    /// Last-chance filter before [`NotifyOps::handle_event`].
    fn should_deliver(
        &self,
        group: &Group,
        to_tell: Option<InodeId>,
        inode_mark: &Arc<Watch>,
        mount_mark: Option<&Arc<Watch>>,
        mask: EventMask,
        data: &EventData,
    ) -> bool;

    /// A watch of `group` is being destroyed. Called once per watch.
    fn on_watch_freeing(&self, mark: &Arc<Watch>, group: &Group);

    /// Release the backend state of a closing group. Called once.
    fn free_group_private_state(&self, group: &Group) -> TeardownReport;

    /// Release an attachment the group no longer needs.
    fn free_private_attachment(&self, attachment: EventPrivate);
}

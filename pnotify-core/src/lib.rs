//! # pnotify core
//!
//! Event handling for the pnotify change-notification backend. Raw
//! filesystem events are delivered to subscriber groups; adjacent duplicate
//! events are coalesced, every newly queued event carries the descriptor of
//! the watch that produced it, and closing a group drains its watch
//! registry and wd/pid side list.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         pnotify core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Event ──► Group::send_event ──► Pnotify::handle_event          │
//! │                                       │                         │
//! │                                       ▼                         │
//! │            NotificationQueue::enqueue ◄── try_merge/equivalent  │
//! │                                       │                         │
//! │                                       ▼                         │
//! │                         EventPrivate (wd) bound to event        │
//! │                                                                 │
//! │  Group::close ──► WatchRegistry drain ──► WdPidList drain       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use pnotify_core::{Event, EventMask, InodeId, Pnotify, PnotifyConfig, UserAccount};
//!
//! fn main() -> pnotify_core::Result<()> {
//!     let backend = Pnotify::new(PnotifyConfig::default())?;
//!     let group = backend.open_group(UserAccount::new(1000))?;
//!     let watch = group.add_watch(InodeId(5), EventMask::MODIFY, std::process::id())?;
//!
//!     let event = Event::inode(EventMask::MODIFY, InodeId(5), Some("a.txt")).into_handle();
//!     group.send_event(&watch, &event)?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod event;
pub mod group;
pub mod merge;
pub mod ops;
pub mod private;
pub mod queue;
pub mod registry;
pub mod user;
pub mod watch;
pub mod wd_pid;

pub use backend::{LeakWarning, Pnotify};
pub use config::PnotifyConfig;
pub use error::{NotifyError, Result};
pub use event::{DataType, DentryId, Event, EventData, EventHandle, EventMask, InodeId, MountId};
pub use group::{Group, GroupId, QueuedEvent};
pub use merge::{equivalent, try_merge};
pub use ops::{NotifyOps, TeardownReport};
pub use private::{AttachmentCache, EventPrivate};
pub use queue::{Enqueued, MergeFn, NotificationQueue};
pub use registry::WatchRegistry;
pub use user::UserAccount;
pub use watch::{Watch, Wd};
pub use wd_pid::{WdPid, WdPidList};

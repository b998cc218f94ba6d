//! Error types for the pnotify event core.

use thiserror::Error;

use crate::watch::Wd;

/// Result type alias for pnotify operations.
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Errors that can occur while delivering events or managing watches.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// An attachment, registry entry or side-list record could not be allocated.
    #[error("out of memory")]
    OutOfMemory,

    /// The notification queue refused the event.
    #[error("notification queue error: {0}")]
    Queue(String),

    /// The user already has the maximum number of open groups.
    #[error("user {uid} reached the instance limit of {limit}")]
    InstanceLimitExceeded { uid: u32, limit: usize },

    /// The user already has the maximum number of live watches.
    #[error("user {uid} reached the watch limit of {limit}")]
    WatchLimitExceeded { uid: u32, limit: usize },

    /// No watch is registered under this descriptor.
    #[error("unknown watch descriptor: {0}")]
    UnknownWatch(Wd),

    /// The group has already been closed.
    #[error("group is closed")]
    GroupClosed,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

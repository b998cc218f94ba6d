//! Limits for pnotify groups.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NotifyError, Result};

/// Default depth of a group's notification queue.
pub const DEFAULT_MAX_QUEUED_EVENTS: usize = 16384;

/// Default number of groups a single user may hold open.
pub const DEFAULT_MAX_USER_INSTANCES: usize = 128;

/// Default number of live watches a single user may hold.
pub const DEFAULT_MAX_USER_WATCHES: usize = 8192;

/// Configuration shared by every group opened through one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PnotifyConfig {
    /// Queue depth at which the overflow event replaces new events.
    pub max_queued_events: usize,

    /// Maximum open groups per user.
    pub max_user_instances: usize,

    /// Maximum live watches per user.
    pub max_user_watches: usize,

    /// Capacity of the attachment cache (None = unbounded).
    pub max_attachments: Option<usize>,
}

impl PnotifyConfig {
    /// Create a configuration with the default limits.
    pub fn new() -> Self {
        Self {
            max_queued_events: DEFAULT_MAX_QUEUED_EVENTS,
            max_user_instances: DEFAULT_MAX_USER_INSTANCES,
            max_user_watches: DEFAULT_MAX_USER_WATCHES,
            max_attachments: None,
        }
    }

    /// Set the queue depth.
    pub fn with_max_queued_events(mut self, max: usize) -> Self {
        self.max_queued_events = max;
        self
    }

    /// Set the per-user group limit.
    pub fn with_max_user_instances(mut self, max: usize) -> Self {
        self.max_user_instances = max;
        self
    }

    /// Set the per-user watch limit.
    pub fn with_max_user_watches(mut self, max: usize) -> Self {
        self.max_user_watches = max;
        self
    }

    /// Bound the attachment cache.
    pub fn with_max_attachments(mut self, max: usize) -> Self {
        self.max_attachments = Some(max);
        self
    }

    /// Parse a JSON configuration and validate it.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Reject limits that would make every operation fail.
    pub fn validate(&self) -> Result<()> {
        if self.max_queued_events == 0 {
            return Err(NotifyError::Config(
                "max_queued_events must be at least 1".to_string(),
            ));
        }
        if self.max_user_instances == 0 {
            return Err(NotifyError::Config(
                "max_user_instances must be at least 1".to_string(),
            ));
        }
        if self.max_user_watches == 0 {
            return Err(NotifyError::Config(
                "max_user_watches must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PnotifyConfig {
    fn default() -> Self {
        Self::new()
    }
}

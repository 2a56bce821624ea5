//! Configuration types for the raven-stream crate
//!
//! [`SessionConfig`] controls how a [`DeviceSession`](crate::DeviceSession)
//! frames the byte stream, which fragment roots it treats as replies, and
//! how long it waits for the gateway.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StreamError, StreamResult};

/// What to do with a reply-capable fragment when no command is waiting for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnmatchedReplyPolicy {
    /// Discard it with a debug log line
    #[default]
    Drop,
    /// Discard it with a warning
    Warn,
    /// Broadcast it to subscribers like any other event
    DeliverAsEvent,
}

/// Configuration for a DeviceSession
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Root names that can answer a command
    /// Default: empty
    pub reply_roots: BTreeSet<String>,

    /// Root name the gateway uses to reject a command
    /// Default: `Warning`
    pub warning_root: Option<String>,

    /// Default: [`UnmatchedReplyPolicy::Drop`]
    pub unmatched_reply: UnmatchedReplyPolicy,

    /// Discard the first partial fragment before routing anything
    /// Default: true
    pub synchronize_on_open: bool,

    /// Default: 10 seconds
    pub sync_timeout: Duration,

    /// Reply deadline used when a caller does not pass one
    /// Default: 5 seconds
    pub command_timeout: Duration,

    /// Bytes requested from the transport per read
    /// Default: 1024
    pub read_chunk_size: usize,

    /// Largest incomplete fragment kept before reporting a framing error
    /// Default: 64 KiB
    pub max_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reply_roots: BTreeSet::new(),
            warning_root: Some("Warning".to_string()),
            unmatched_reply: UnmatchedReplyPolicy::Drop,
            synchronize_on_open: true,
            sync_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(5),
            read_chunk_size: 1024,
            max_buffer_size: 64 * 1024,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config for a transport that is known to start on a fragment boundary
    pub fn unsynchronized() -> Self {
        Self {
            synchronize_on_open: false,
            ..Default::default()
        }
    }

    /// Shorter deadlines for interactive tools
    pub fn responsive() -> Self {
        Self {
            sync_timeout: Duration::from_secs(3),
            command_timeout: Duration::from_secs(2),
            read_chunk_size: 256,
            ..Default::default()
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> StreamResult<()> {
        if self.read_chunk_size == 0 {
            return Err(StreamError::Configuration(
                "Read chunk size must be greater than 0".to_string(),
            ));
        }

        if self.max_buffer_size < self.read_chunk_size {
            return Err(StreamError::Configuration(
                "Max buffer size must be at least the read chunk size".to_string(),
            ));
        }

        if self.command_timeout.is_zero() || self.sync_timeout.is_zero() {
            return Err(StreamError::Configuration(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        if self.reply_roots.iter().any(String::is_empty) {
            return Err(StreamError::Configuration(
                "Reply root names must not be empty".to_string(),
            ));
        }

        if let Some(warning) = &self.warning_root {
            if self.reply_roots.contains(warning) {
                return Err(StreamError::Configuration(format!(
                    "Warning root '{warning}' cannot also be a reply root"
                )));
            }
        }

        Ok(())
    }

    pub fn with_reply_roots<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reply_roots = roots.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_warning_root(mut self, root: Option<&str>) -> Self {
        self.warning_root = root.map(str::to_string);
        self
    }

    pub fn with_unmatched_reply(mut self, policy: UnmatchedReplyPolicy) -> Self {
        self.unmatched_reply = policy;
        self
    }

    pub fn with_synchronize_on_open(mut self, enabled: bool) -> Self {
        self.synchronize_on_open = enabled;
        self
    }

    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert!(config.reply_roots.is_empty());
        assert_eq!(config.warning_root.as_deref(), Some("Warning"));
        assert_eq!(config.unmatched_reply, UnmatchedReplyPolicy::Drop);
        assert!(config.synchronize_on_open);
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let invalid = SessionConfig {
            read_chunk_size: 0,
            ..Default::default()
        };
        assert!(invalid.validate().is_err());

        let invalid = SessionConfig::default()
            .with_read_chunk_size(4096)
            .with_max_buffer_size(1024);
        assert!(invalid.validate().is_err());

        let invalid = SessionConfig::default().with_command_timeout(Duration::ZERO);
        assert!(invalid.validate().is_err());

        let invalid = SessionConfig::default().with_reply_roots(["TimeCluster", "Warning"]);
        assert!(matches!(invalid.validate(), Err(StreamError::Configuration(_))));

        let invalid = SessionConfig::default().with_reply_roots([""]);
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_config_presets() {
        let unsynced = SessionConfig::unsynchronized();
        assert!(!unsynced.synchronize_on_open);
        assert!(unsynced.validate().is_ok());

        let responsive = SessionConfig::responsive();
        assert_eq!(responsive.command_timeout, Duration::from_secs(2));
        assert!(responsive.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = SessionConfig::new()
            .with_reply_roots(["DeviceInfo", "TimeCluster"])
            .with_warning_root(None)
            .with_unmatched_reply(UnmatchedReplyPolicy::DeliverAsEvent)
            .with_synchronize_on_open(false)
            .with_sync_timeout(Duration::from_secs(1))
            .with_read_chunk_size(64)
            .with_max_buffer_size(128);

        assert!(config.reply_roots.contains("TimeCluster"));
        assert_eq!(config.warning_root, None);
        assert_eq!(config.unmatched_reply, UnmatchedReplyPolicy::DeliverAsEvent);
        assert!(!config.synchronize_on_open);
        assert_eq!(config.read_chunk_size, 64);
        assert!(config.validate().is_ok());
    }
}

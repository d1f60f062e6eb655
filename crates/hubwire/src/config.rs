use hubwire_channel::ChannelName;
use std::time::Duration;

use crate::error::HubwireError;
use crate::role::{Role, ROLE_ENV};

/// Configuration for a [`Transport`](crate::Transport).
///
/// Channel and role are required; everything else has a default. Use the
/// builder pattern:
///
/// ```rust
/// use hubwire::{Role, TransportConfig};
/// use std::time::Duration;
///
/// let config = TransportConfig::new("rpc", Role::Endpoint)
///     .max_message_size(64 * 1024)
///     .reconnect_delay(Duration::from_millis(500));
/// ```
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub(crate) channel: ChannelName,
    pub(crate) role: Role,
    /// Largest payload accepted in either direction, in bytes.
    pub(crate) max_message_size: usize,
    /// Delay an outer persistent transport waits before reconnecting.
    /// Stored and exposed only; nothing in this crate schedules reconnects.
    pub(crate) reconnect_delay: Option<Duration>,
}

impl TransportConfig {
    /// Create a config for `channel` in the given role.
    pub fn new(channel: impl Into<ChannelName>, role: Role) -> Self {
        Self {
            channel: channel.into(),
            role,
            max_message_size: 1024 * 1024, // 1 MB
            reconnect_delay: None,
        }
    }

    /// Create a config whose role comes from the `HUBWIRE_ROLE` environment
    /// variable, for hosts that publish the role as a process-wide flag.
    pub fn from_env(channel: impl Into<ChannelName>) -> Result<Self, HubwireError> {
        let raw = std::env::var(ROLE_ENV)
            .map_err(|_| HubwireError::Config(format!("{ROLE_ENV} is not set")))?;
        Ok(Self::new(channel, raw.parse()?))
    }

    /// Set maximum payload size (default: 1 MB).
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Set the reconnect delay slot (default: none).
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = Some(delay);
        self
    }

    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

//! hubwire channel binding.
//!
//! The raw delivery primitive that the hubwire transport sits on: a named
//! channel carrying opaque byte payloads between one hub and any number of
//! endpoints. Hosts supply their own binding; [`MemoryBus`] is the
//! in-process one used by tests and demos.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use hubwire_channel::{ChannelBinding, ChannelName, MemoryBus};
//!
//! # fn example() -> Result<(), hubwire_channel::ChannelError> {
//! let bus = MemoryBus::new();
//! let hub = bus.hub_port();
//! let endpoint = bus.endpoint_port();
//! let channel = ChannelName::new("rpc");
//!
//! hub.subscribe(&channel, Arc::new(|event: hubwire_channel::InboundEvent| -> anyhow::Result<()> {
//!     println!("{} bytes from {:?}", event.payload.len(), event.sender_id());
//!     Ok(())
//! }));
//!
//! endpoint.send_raw(&channel, Bytes::from_static(b"hello"))?;
//! # Ok(())
//! # }
//! ```

mod error;
mod memory;

pub use error::ChannelError;
pub use memory::{EndpointPort, HubPort, MemoryBus};

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Name of a logical channel. Fixed when a transport is built.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ChannelName(String);

impl ChannelName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelName({})", self.0)
    }
}

impl From<&str> for ChannelName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ChannelName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identity of one connected endpoint, as seen from the hub.
///
/// Assigned by the binding, stable for the life of the endpoint's connection.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointId(u64);

impl EndpointId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndpointId({})", self.0)
    }
}

/// Token returned by [`ChannelBinding::subscribe`], used to unsubscribe
/// exactly that handler later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// A handle that can push raw payloads to one specific endpoint.
pub trait EndpointSink: Send + Sync {
    /// The endpoint this sink delivers to.
    fn id(&self) -> EndpointId;

    /// Hand `payload` to the endpoint's handlers on `channel`.
    fn send_raw(&self, channel: &ChannelName, payload: Bytes) -> Result<(), ChannelError>;
}

/// One raw delivery from the binding.
#[derive(Clone)]
pub struct InboundEvent {
    /// The originating endpoint. Set on hub-side deliveries, `None` when an
    /// endpoint receives from the hub.
    pub sender: Option<Arc<dyn EndpointSink>>,
    pub payload: Bytes,
}

impl InboundEvent {
    pub fn sender_id(&self) -> Option<EndpointId> {
        self.sender.as_ref().map(|s| s.id())
    }
}

impl fmt::Debug for InboundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundEvent")
            .field("sender", &self.sender_id())
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Callback invoked for every delivery on a subscribed channel.
///
/// An error is reported to the binding, which decides how to surface it.
pub type InboundHandler = Arc<dyn Fn(InboundEvent) -> anyhow::Result<()> + Send + Sync>;

/// Named, two-directional raw-payload delivery primitive.
///
/// In production this wraps the host's IPC facility.
/// In tests: [`MemoryBus`] ports.
pub trait ChannelBinding: Send + Sync {
    /// Start delivering payloads on `channel` to `handler`.
    fn subscribe(&self, channel: &ChannelName, handler: InboundHandler) -> SubscriptionId;

    /// Stop delivering to the handler behind `subscription`. Unknown ids are ignored.
    fn unsubscribe(&self, channel: &ChannelName, subscription: SubscriptionId);

    /// Send a payload to the hub.
    fn send_raw(&self, channel: &ChannelName, payload: Bytes) -> Result<(), ChannelError>;
}

impl<T: ChannelBinding + ?Sized> ChannelBinding for Arc<T> {
    fn subscribe(&self, channel: &ChannelName, handler: InboundHandler) -> SubscriptionId {
        (**self).subscribe(channel, handler)
    }

    fn unsubscribe(&self, channel: &ChannelName, subscription: SubscriptionId) {
        (**self).unsubscribe(channel, subscription)
    }

    fn send_raw(&self, channel: &ChannelName, payload: Bytes) -> Result<(), ChannelError> {
        (**self).send_raw(channel, payload)
    }
}

//! hubwire transport core.
//!
//! Lets one hub process exchange request/response messages with any number
//! of endpoint processes over a single named channel. The hub registers
//! each endpoint the first time it hears from it, binds a reply capability
//! to every request, and can address known endpoints by id.
//!
//! Raw delivery is supplied by a [`ChannelBinding`](hubwire_channel::ChannelBinding);
//! message encoding by a [`Serializer`].
//!
//! # Quick start
//!
//! ```rust
//! use hubwire::{JsonSerializer, MemoryBus, Role, Transport, TransportConfig};
//! use serde_json::{json, Value};
//!
//! # fn example() -> Result<(), hubwire::HubwireError> {
//! let bus = MemoryBus::new();
//! let mut hub = Transport::new(
//!     TransportConfig::new("rpc", Role::Hub),
//!     bus.hub_port(),
//!     JsonSerializer::<Value>::new(),
//! );
//! let endpoint = Transport::new(
//!     TransportConfig::new("rpc", Role::Endpoint),
//!     bus.endpoint_port(),
//!     JsonSerializer::<Value>::new(),
//! );
//!
//! hub.listen()?;
//! endpoint.connect()?;
//! endpoint.send(&json!({"method": "ping"}))?;
//!
//! let inbound = hub.try_recv().expect("delivered synchronously");
//! if let Some(request) = inbound.request {
//!     request.respond(&json!({"result": "pong"}))?;
//! }
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod request;
pub mod role;
pub mod serializer;
mod router;
mod transport;

pub use config::TransportConfig;
pub use error::HubwireError;
pub use lifecycle::{LifecycleEvent, TransportState};
pub use registry::ConnectionRegistry;
pub use request::{ClientRequest, Inbound};
pub use role::{Role, ROLE_ENV};
pub use serializer::{JsonSerializer, MsgPackSerializer, Serializer};
pub use transport::Transport;

// Re-export the channel layer so hosts depend on one crate
pub use hubwire_channel;
pub use hubwire_channel::{ChannelName, EndpointId, MemoryBus};

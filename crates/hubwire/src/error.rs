use hubwire_channel::{ChannelError, ChannelName, EndpointId};

use crate::lifecycle::TransportState;
use crate::role::Role;

/// Errors returned by the hubwire transport.
///
/// Wraps channel binding errors and adds routing, lifecycle and codec variants.
#[derive(Debug, thiserror::Error)]
pub enum HubwireError {
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(EndpointId),

    #[error("{op} is not available in the {role} role")]
    WrongRole { op: &'static str, role: Role },

    #[error("{op} not allowed while {state}")]
    InvalidState {
        op: &'static str,
        state: TransportState,
    },

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("hub delivery on channel {0} carried no sender")]
    MissingSender(ChannelName),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("transport is shut down")]
    Shutdown,
}

impl From<rmp_serde::encode::Error> for HubwireError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        HubwireError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for HubwireError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        HubwireError::Deserialization(e.to_string())
    }
}

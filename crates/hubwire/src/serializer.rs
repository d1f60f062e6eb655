//! Message codecs consumed by the transport.
//!
//! The transport never looks inside a message: it hands values to a
//! [`Serializer`] on the way out and takes values back on the way in.
//! Two codecs ship with the crate: JSON and MessagePack.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;

use crate::error::HubwireError;

/// Byte codec for the messages (and responses) carried by a transport.
///
/// Implementations must be pure: same input, same output, no side effects.
pub trait Serializer: Send + Sync + 'static {
    /// The application message type. Responses are values of this type too.
    type Message: Send + 'static;

    fn serialize(&self, message: &Self::Message) -> Result<Vec<u8>, HubwireError>;

    fn deserialize(&self, data: &[u8]) -> Result<Self::Message, HubwireError>;
}

/// Serialize `message` and enforce the payload size limit.
pub(crate) fn encode_bounded<S: Serializer + ?Sized>(
    serializer: &S,
    message: &S::Message,
    max_message_size: usize,
) -> Result<Bytes, HubwireError> {
    let data = serializer.serialize(message)?;
    if data.len() > max_message_size {
        return Err(HubwireError::MessageTooLarge {
            size: data.len(),
            max: max_message_size,
        });
    }
    Ok(Bytes::from(data))
}

/// JSON codec (serde_json).
pub struct JsonSerializer<M> {
    _message: PhantomData<fn() -> M>,
}

impl<M> JsonSerializer<M> {
    pub fn new() -> Self {
        Self {
            _message: PhantomData,
        }
    }
}

impl<M> Default for JsonSerializer<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for JsonSerializer<M> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for JsonSerializer<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonSerializer")
    }
}

impl<M> Serializer for JsonSerializer<M>
where
    M: Serialize + DeserializeOwned + Send + 'static,
{
    type Message = M;

    fn serialize(&self, message: &M) -> Result<Vec<u8>, HubwireError> {
        serde_json::to_vec(message).map_err(|e| HubwireError::Serialization(e.to_string()))
    }

    fn deserialize(&self, data: &[u8]) -> Result<M, HubwireError> {
        serde_json::from_slice(data).map_err(|e| HubwireError::Deserialization(e.to_string()))
    }
}

/// MessagePack codec (rmp-serde), struct fields encoded by name.
pub struct MsgPackSerializer<M> {
    _message: PhantomData<fn() -> M>,
}

impl<M> MsgPackSerializer<M> {
    pub fn new() -> Self {
        Self {
            _message: PhantomData,
        }
    }
}

impl<M> Default for MsgPackSerializer<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for MsgPackSerializer<M> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for MsgPackSerializer<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MsgPackSerializer")
    }
}

impl<M> Serializer for MsgPackSerializer<M>
where
    M: Serialize + DeserializeOwned + Send + 'static,
{
    type Message = M;

    fn serialize(&self, message: &M) -> Result<Vec<u8>, HubwireError> {
        Ok(rmp_serde::to_vec_named(message)?)
    }

    fn deserialize(&self, data: &[u8]) -> Result<M, HubwireError> {
        Ok(rmp_serde::from_slice(data)?)
    }
}

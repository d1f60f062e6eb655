use std::fmt;
use std::sync::Arc;

use hubwire_channel::{ChannelName, EndpointId, EndpointSink};

use crate::error::HubwireError;
use crate::serializer::{encode_bounded, Serializer};

/// Reply capability bound to the endpoint that sent a request.
///
/// Owned by a single inbound message and consumed by [`respond`](Self::respond),
/// so a response can be sent at most once and only to that endpoint.
pub struct ClientRequest<S: Serializer> {
    endpoint: EndpointId,
    sink: Arc<dyn EndpointSink>,
    channel: ChannelName,
    serializer: Arc<S>,
    max_message_size: usize,
}

impl<S: Serializer> ClientRequest<S> {
    pub(crate) fn new(
        sink: Arc<dyn EndpointSink>,
        channel: ChannelName,
        serializer: Arc<S>,
        max_message_size: usize,
    ) -> Self {
        Self {
            endpoint: sink.id(),
            sink,
            channel,
            serializer,
            max_message_size,
        }
    }

    /// The endpoint this request came from.
    pub fn endpoint_id(&self) -> EndpointId {
        self.endpoint
    }

    /// Serialize `response` and send it back to the originating endpoint.
    pub fn respond(self, response: &S::Message) -> Result<(), HubwireError> {
        let payload = encode_bounded(&*self.serializer, response, self.max_message_size)?;
        tracing::trace!(
            "reply to endpoint {} on {}, {} bytes",
            self.endpoint,
            self.channel,
            payload.len()
        );
        self.sink.send_raw(&self.channel, payload)?;
        Ok(())
    }
}

impl<S: Serializer> fmt::Debug for ClientRequest<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRequest")
            .field("endpoint", &self.endpoint)
            .field("channel", &self.channel)
            .finish()
    }
}

/// A message handed to the receive pipeline.
///
/// On the hub, `request` carries the reply capability for the sender.
/// On an endpoint it is always `None`.
pub struct Inbound<S: Serializer> {
    pub message: S::Message,
    pub request: Option<ClientRequest<S>>,
}

impl<S: Serializer> Inbound<S> {
    /// The sending endpoint, when received by the hub.
    pub fn endpoint_id(&self) -> Option<EndpointId> {
        self.request.as_ref().map(ClientRequest::endpoint_id)
    }
}

impl<S> fmt::Debug for Inbound<S>
where
    S: Serializer,
    S::Message: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbound")
            .field("message", &self.message)
            .field("request", &self.request)
            .finish()
    }
}

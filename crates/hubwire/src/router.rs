/// Inbound message router.
///
/// Turns raw deliveries from the channel binding into [`Inbound`] values on
/// the receive pipeline. On the hub it registers unseen senders and binds a
/// reply capability to each request; on an endpoint it forwards directly.
use std::sync::Arc;

use hubwire_channel::{ChannelName, EndpointSink, InboundEvent, InboundHandler};
use tokio::sync::mpsc;

use crate::error::HubwireError;
use crate::registry::ConnectionRegistry;
use crate::request::{ClientRequest, Inbound};
use crate::role::Role;
use crate::serializer::Serializer;

pub(crate) struct Router<S: Serializer> {
    channel: ChannelName,
    serializer: Arc<S>,
    registry: Arc<ConnectionRegistry>,
    incoming_tx: mpsc::UnboundedSender<Inbound<S>>,
    max_message_size: usize,
}

impl<S: Serializer> Router<S> {
    pub fn new(
        channel: ChannelName,
        serializer: Arc<S>,
        registry: Arc<ConnectionRegistry>,
        incoming_tx: mpsc::UnboundedSender<Inbound<S>>,
        max_message_size: usize,
    ) -> Self {
        Self {
            channel,
            serializer,
            registry,
            incoming_tx,
            max_message_size,
        }
    }

    /// Build the handler subscribed on the channel binding for `role`.
    pub fn handler(self: &Arc<Self>, role: Role) -> InboundHandler {
        let router = Arc::clone(self);
        Arc::new(move |event: InboundEvent| -> anyhow::Result<()> {
            let routed = match role {
                Role::Hub => router.route_hub(event),
                Role::Endpoint => router.route_endpoint(event),
            };
            routed.map_err(anyhow::Error::from)
        })
    }

    /// Hub side: register the sender if unseen, bind a reply, then receive.
    ///
    /// The sender is registered before the payload is decoded, so even a
    /// malformed message makes its endpoint addressable.
    pub fn route_hub(&self, event: InboundEvent) -> Result<(), HubwireError> {
        let sender: Arc<dyn EndpointSink> = event
            .sender
            .ok_or_else(|| HubwireError::MissingSender(self.channel.clone()))?;
        let id = sender.id();

        if self.registry.register(id, sender.clone()) {
            tracing::debug!("endpoint {id} registered on {}", self.channel);
        }

        let request = ClientRequest::new(
            sender,
            self.channel.clone(),
            self.serializer.clone(),
            self.max_message_size,
        );
        self.receive(&event.payload, Some(request))
    }

    /// Endpoint side: straight to the receive pipeline.
    pub fn route_endpoint(&self, event: InboundEvent) -> Result<(), HubwireError> {
        self.receive(&event.payload, None)
    }

    /// Shared receive pipeline: decode and queue for the application.
    pub fn receive(
        &self,
        raw: &[u8],
        request: Option<ClientRequest<S>>,
    ) -> Result<(), HubwireError> {
        if raw.len() > self.max_message_size {
            return Err(HubwireError::MessageTooLarge {
                size: raw.len(),
                max: self.max_message_size,
            });
        }
        let message = self.serializer.deserialize(raw)?;
        tracing::trace!(
            "received {} bytes on {} from {:?}",
            raw.len(),
            self.channel,
            request.as_ref().map(ClientRequest::endpoint_id)
        );
        self.incoming_tx
            .send(Inbound { message, request })
            .map_err(|_| HubwireError::Shutdown)
    }
}


#[cfg(test)]
mod tests {
    use super::mock::RecordingSink;
    use super::*;
    use crate::serializer::JsonSerializer;
    use bytes::Bytes;
    use hubwire_channel::EndpointId;
    use serde_json::{json, Value};

    type Json = JsonSerializer<Value>;

    fn router(
        max: usize,
    ) -> (
        Arc<Router<Json>>,
        Arc<ConnectionRegistry>,
        mpsc::UnboundedReceiver<Inbound<Json>>,
    ) {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let router = Router::new(
            ChannelName::new("rpc"),
            Arc::new(Json::new()),
            registry.clone(),
            tx,
            max,
        );
        (Arc::new(router), registry, rx)
    }

    #[test]
    fn hub_registers_sender_once() {
        let (router, registry, mut rx) = router(1024);
        let sink = RecordingSink::new(3);

        router.route_hub(sink.event(br#"{"n":1}"#)).unwrap();
        router.route_hub(sink.event(br#"{"n":2}"#)).unwrap();

        assert_eq!(registry.ids(), vec![EndpointId::new(3)]);
        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.message, json!({"n": 1}));
        assert_eq!(second.message, json!({"n": 2}));
        assert_eq!(first.endpoint_id(), Some(EndpointId::new(3)));
    }

    #[test]
    fn reply_goes_to_originating_endpoint_only() {
        let (router, _registry, mut rx) = router(1024);
        let x = RecordingSink::new(1);
        let y = RecordingSink::new(2);

        router.route_hub(x.event(br#""from x""#)).unwrap();
        router.route_hub(y.event(br#""from y""#)).unwrap();

        let inbound = rx.try_recv().unwrap();
        let request = inbound.request.expect("hub requests carry a reply");
        request.respond(&json!({"ok": true})).unwrap();

        assert_eq!(
            x.sent(),
            vec![(ChannelName::new("rpc"), Bytes::from_static(br#"{"ok":true}"#))]
        );
        assert!(y.sent().is_empty());
    }

    #[test]
    fn malformed_payload_surfaces_after_registration() {
        let (router, registry, mut rx) = router(1024);
        let sink = RecordingSink::new(5);

        let result = router.route_hub(sink.event(b"{not json"));
        assert!(matches!(result, Err(HubwireError::Deserialization(_))));
        assert!(registry.contains(EndpointId::new(5)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn oversized_inbound_rejected() {
        let (router, _registry, mut rx) = router(4);
        let sink = RecordingSink::new(1);

        match router.route_hub(sink.event(br#""too long""#)) {
            Err(HubwireError::MessageTooLarge { size, max }) => {
                assert_eq!(size, 10);
                assert_eq!(max, 4);
            }
            other => panic!("expected MessageTooLarge, got: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn hub_event_without_sender_rejected() {
        let (router, registry, _rx) = router(1024);
        let event = InboundEvent {
            sender: None,
            payload: Bytes::from_static(b"1"),
        };
        assert!(matches!(
            router.route_hub(event),
            Err(HubwireError::MissingSender(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn endpoint_delivery_has_no_reply() {
        let (router, registry, mut rx) = router(1024);
        let event = InboundEvent {
            sender: None,
            payload: Bytes::from_static(b"[1,2]"),
        };
        router.route_endpoint(event).unwrap();

        let inbound = rx.try_recv().unwrap();
        assert_eq!(inbound.message, json!([1, 2]));
        assert!(inbound.request.is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn closed_pipeline_reports_shutdown() {
        let (router, _registry, rx) = router(1024);
        drop(rx);
        let sink = RecordingSink::new(1);
        assert!(matches!(
            router.route_hub(sink.event(b"1")),
            Err(HubwireError::Shutdown)
        ));
    }

    #[test]
    fn handler_dispatches_by_role() {
        let (router, registry, mut rx) = router(1024);
        let sink = RecordingSink::new(8);

        let hub = router.handler(Role::Hub);
        hub(sink.event(b"true")).unwrap();
        assert!(registry.contains(EndpointId::new(8)));
        assert!(rx.try_recv().unwrap().request.is_some());

        let endpoint = router.handler(Role::Endpoint);
        endpoint(sink.event(b"false")).unwrap();
        assert!(rx.try_recv().unwrap().request.is_none());

        let err = hub(sink.event(b"nope")).unwrap_err();
        assert!(err.downcast_ref::<HubwireError>().is_some());
    }
}

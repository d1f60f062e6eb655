use crate::{
    ChannelBinding, ChannelError, ChannelName, EndpointId, EndpointSink, InboundEvent,
    InboundHandler, SubscriptionId,
};

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type HandlerList = Vec<(SubscriptionId, InboundHandler)>;

/// Handlers subscribed on one side of the bus, per channel.
#[derive(Default)]
struct Subscribers {
    by_channel: HashMap<ChannelName, HandlerList>,
}

impl Subscribers {
    fn add(&mut self, channel: &ChannelName, id: SubscriptionId, handler: InboundHandler) {
        self.by_channel
            .entry(channel.clone())
            .or_default()
            .push((id, handler));
    }

    fn remove(&mut self, channel: &ChannelName, id: SubscriptionId) {
        if let Some(list) = self.by_channel.get_mut(channel) {
            list.retain(|(sub, _)| *sub != id);
            if list.is_empty() {
                self.by_channel.remove(channel);
            }
        }
    }

    /// Clone the handlers for `channel` so they can run without the lock held.
    fn snapshot(&self, channel: &ChannelName) -> Vec<InboundHandler> {
        self.by_channel
            .get(channel)
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default()
    }
}

struct BusInner {
    next_endpoint: AtomicU64,
    next_subscription: AtomicU64,
    hub: Mutex<Subscribers>,
    endpoints: Mutex<HashMap<EndpointId, Subscribers>>,
}

impl BusInner {
    fn next_subscription(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_subscription.fetch_add(1, Ordering::Relaxed))
    }
}

/// Run every handler in order. A failing handler is logged and skipped.
fn dispatch(handlers: Vec<InboundHandler>, event: InboundEvent, channel: &ChannelName) {
    for handler in handlers {
        if let Err(e) = handler(event.clone()) {
            tracing::warn!("delivery on channel {channel} failed: {e:#}");
        }
    }
}

/// In-process channel binding: one hub side, any number of endpoints.
///
/// Delivery is synchronous and ordered. Handlers never run while the bus
/// holds a lock, so a handler may send on the bus itself.
#[derive(Clone)]
pub struct MemoryBus {
    inner: Arc<BusInner>,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                next_endpoint: AtomicU64::new(1),
                next_subscription: AtomicU64::new(1),
                hub: Mutex::new(Subscribers::default()),
                endpoints: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The hub side of the bus. All hub ports share one set of subscribers.
    pub fn hub_port(&self) -> HubPort {
        HubPort {
            inner: self.inner.clone(),
        }
    }

    /// Attach a new endpoint under a fresh, never reused identifier.
    pub fn endpoint_port(&self) -> EndpointPort {
        let id = EndpointId::new(self.inner.next_endpoint.fetch_add(1, Ordering::Relaxed));
        self.inner
            .endpoints
            .lock()
            .insert(id, Subscribers::default());
        tracing::debug!("memory bus: endpoint {id} attached");
        EndpointPort {
            id,
            inner: self.inner.clone(),
        }
    }

    /// Number of currently attached endpoints.
    pub fn attached_endpoints(&self) -> usize {
        self.inner.endpoints.lock().len()
    }
}

/// Hub side of a [`MemoryBus`].
#[derive(Clone)]
pub struct HubPort {
    inner: Arc<BusInner>,
}

impl ChannelBinding for HubPort {
    fn subscribe(&self, channel: &ChannelName, handler: InboundHandler) -> SubscriptionId {
        let id = self.inner.next_subscription();
        self.inner.hub.lock().add(channel, id, handler);
        id
    }

    fn unsubscribe(&self, channel: &ChannelName, subscription: SubscriptionId) {
        self.inner.hub.lock().remove(channel, subscription);
    }

    /// The hub has no implicit peer; replies go through an [`EndpointSink`].
    fn send_raw(&self, channel: &ChannelName, _payload: Bytes) -> Result<(), ChannelError> {
        Err(ChannelError::Unroutable(channel.clone()))
    }
}

/// One endpoint attached to a [`MemoryBus`]. Dropping it detaches the endpoint.
pub struct EndpointPort {
    id: EndpointId,
    inner: Arc<BusInner>,
}

impl EndpointPort {
    /// The identifier the hub sees for this endpoint.
    pub fn id(&self) -> EndpointId {
        self.id
    }
}

impl ChannelBinding for EndpointPort {
    fn subscribe(&self, channel: &ChannelName, handler: InboundHandler) -> SubscriptionId {
        let id = self.inner.next_subscription();
        if let Some(subs) = self.inner.endpoints.lock().get_mut(&self.id) {
            subs.add(channel, id, handler);
        }
        id
    }

    fn unsubscribe(&self, channel: &ChannelName, subscription: SubscriptionId) {
        if let Some(subs) = self.inner.endpoints.lock().get_mut(&self.id) {
            subs.remove(channel, subscription);
        }
    }

    fn send_raw(&self, channel: &ChannelName, payload: Bytes) -> Result<(), ChannelError> {
        let handlers = self.inner.hub.lock().snapshot(channel);
        tracing::trace!(
            "memory bus: endpoint {} -> hub on {channel}, {} bytes, {} handlers",
            self.id,
            payload.len(),
            handlers.len()
        );
        let sender: Arc<dyn EndpointSink> = Arc::new(MemorySink {
            id: self.id,
            inner: self.inner.clone(),
        });
        let event = InboundEvent {
            sender: Some(sender),
            payload,
        };
        dispatch(handlers, event, channel);
        Ok(())
    }
}

impl Drop for EndpointPort {
    fn drop(&mut self) {
        self.inner.endpoints.lock().remove(&self.id);
        tracing::debug!("memory bus: endpoint {} detached", self.id);
    }
}

/// Hub-held handle addressing one endpoint.
struct MemorySink {
    id: EndpointId,
    inner: Arc<BusInner>,
}

impl EndpointSink for MemorySink {
    fn id(&self) -> EndpointId {
        self.id
    }

    fn send_raw(&self, channel: &ChannelName, payload: Bytes) -> Result<(), ChannelError> {
        let handlers = {
            let endpoints = self.inner.endpoints.lock();
            let subs = endpoints
                .get(&self.id)
                .ok_or(ChannelError::EndpointGone(self.id))?;
            subs.snapshot(channel)
        };
        tracing::trace!(
            "memory bus: hub -> endpoint {} on {channel}, {} bytes",
            self.id,
            payload.len()
        );
        let event = InboundEvent {
            sender: None,
            payload,
        };
        dispatch(handlers, event, channel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Arc<Mutex<Vec<(Option<EndpointId>, Bytes)>>>;

    fn recording_handler(log: &Log) -> InboundHandler {
        let log = log.clone();
        Arc::new(move |event: InboundEvent| -> anyhow::Result<()> {
            log.lock().push((event.sender_id(), event.payload));
            Ok(())
        })
    }

    #[test]
    fn endpoint_ids_are_fresh() {
        let bus = MemoryBus::new();
        let a = bus.endpoint_port();
        let b = bus.endpoint_port();
        assert_ne!(a.id(), b.id());
        assert_eq!(bus.attached_endpoints(), 2);
        drop(a);
        let c = bus.endpoint_port();
        assert!(c.id() > b.id(), "ids are never reused");
    }

    #[test]
    fn endpoint_send_reaches_hub_with_sender() {
        let bus = MemoryBus::new();
        let hub = bus.hub_port();
        let endpoint = bus.endpoint_port();
        let channel = ChannelName::new("rpc");
        let log: Log = Arc::default();

        hub.subscribe(&channel, recording_handler(&log));
        endpoint
            .send_raw(&channel, Bytes::from_static(b"ping"))
            .unwrap();

        let seen = log.lock().clone();
        assert_eq!(seen, vec![(Some(endpoint.id()), Bytes::from_static(b"ping"))]);
    }

    #[test]
    fn other_channels_are_not_delivered() {
        let bus = MemoryBus::new();
        let hub = bus.hub_port();
        let endpoint = bus.endpoint_port();
        let log: Log = Arc::default();

        hub.subscribe(&ChannelName::new("a"), recording_handler(&log));
        endpoint
            .send_raw(&ChannelName::new("b"), Bytes::from_static(b"x"))
            .unwrap();

        assert!(log.lock().is_empty());
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = MemoryBus::new();
        let hub = bus.hub_port();
        let endpoint = bus.endpoint_port();
        let channel = ChannelName::new("rpc");
        let log: Log = Arc::default();

        let sub = hub.subscribe(&channel, recording_handler(&log));
        hub.unsubscribe(&channel, sub);
        // Unknown subscription is tolerated
        hub.unsubscribe(&channel, sub);
        endpoint.send_raw(&channel, Bytes::from_static(b"x")).unwrap();

        assert!(log.lock().is_empty());
    }

    #[test]
    fn sink_reaches_only_its_endpoint() {
        let bus = MemoryBus::new();
        let hub = bus.hub_port();
        let a = bus.endpoint_port();
        let b = bus.endpoint_port();
        let channel = ChannelName::new("rpc");
        let sinks: Arc<Mutex<Vec<Arc<dyn EndpointSink>>>> = Arc::default();
        let log_a: Log = Arc::default();
        let log_b: Log = Arc::default();

        {
            let sinks = sinks.clone();
            hub.subscribe(
                &channel,
                Arc::new(move |event: InboundEvent| -> anyhow::Result<()> {
                    sinks.lock().extend(event.sender);
                    Ok(())
                }),
            );
        }
        a.subscribe(&channel, recording_handler(&log_a));
        b.subscribe(&channel, recording_handler(&log_b));

        a.send_raw(&channel, Bytes::from_static(b"hi")).unwrap();
        let sink = sinks.lock()[0].clone();
        assert_eq!(sink.id(), a.id());
        sink.send_raw(&channel, Bytes::from_static(b"reply")).unwrap();

        assert_eq!(log_a.lock().clone(), vec![(None, Bytes::from_static(b"reply"))]);
        assert!(log_b.lock().is_empty());
    }

    #[test]
    fn sink_to_detached_endpoint_fails() {
        let bus = MemoryBus::new();
        let hub = bus.hub_port();
        let endpoint = bus.endpoint_port();
        let id = endpoint.id();
        let channel = ChannelName::new("rpc");
        let sinks: Arc<Mutex<Vec<Arc<dyn EndpointSink>>>> = Arc::default();
        {
            let sinks = sinks.clone();
            hub.subscribe(
                &channel,
                Arc::new(move |event: InboundEvent| -> anyhow::Result<()> {
                    sinks.lock().extend(event.sender);
                    Ok(())
                }),
            );
        }

        endpoint.send_raw(&channel, Bytes::from_static(b"hi")).unwrap();
        drop(endpoint);

        let sink = sinks.lock()[0].clone();
        match sink.send_raw(&channel, Bytes::from_static(b"late")) {
            Err(ChannelError::EndpointGone(gone)) => assert_eq!(gone, id),
            other => panic!("expected EndpointGone, got: {other:?}"),
        }
    }

    #[test]
    fn hub_port_has_no_implicit_peer() {
        let bus = MemoryBus::new();
        let hub = bus.hub_port();
        let result = hub.send_raw(&ChannelName::new("rpc"), Bytes::new());
        assert!(matches!(result, Err(ChannelError::Unroutable(_))));
    }

    #[test]
    fn failing_handler_does_not_fail_sender() {
        let bus = MemoryBus::new();
        let hub = bus.hub_port();
        let endpoint = bus.endpoint_port();
        let channel = ChannelName::new("rpc");
        let log: Log = Arc::default();

        hub.subscribe(&channel, Arc::new(|_: InboundEvent| -> anyhow::Result<()> {
            Err(anyhow::anyhow!("boom"))
        }));
        hub.subscribe(&channel, recording_handler(&log));

        assert!(endpoint.send_raw(&channel, Bytes::from_static(b"x")).is_ok());
        assert_eq!(log.lock().len(), 1, "later handlers still run");
    }

    #[test]
    fn handler_may_send_back_on_the_bus() {
        let bus = MemoryBus::new();
        let hub = bus.hub_port();
        let endpoint = bus.endpoint_port();
        let channel = ChannelName::new("rpc");
        let log: Log = Arc::default();

        {
            let reply_channel = channel.clone();
            hub.subscribe(
                &channel,
                Arc::new(move |event: InboundEvent| -> anyhow::Result<()> {
                    if let Some(sender) = event.sender {
                        sender.send_raw(&reply_channel, event.payload)?;
                    }
                    Ok(())
                }),
            );
        }
        endpoint.subscribe(&channel, recording_handler(&log));
        endpoint.send_raw(&channel, Bytes::from_static(b"echo")).unwrap();

        assert_eq!(log.lock().clone(), vec![(None, Bytes::from_static(b"echo"))]);
    }
}

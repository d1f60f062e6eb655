use std::sync::Arc;
use std::time::Duration;

use hubwire_channel::{ChannelBinding, ChannelName, EndpointId, EndpointSink};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use crate::config::TransportConfig;
use crate::error::HubwireError;
use crate::lifecycle::{Lifecycle, LifecycleEvent, TransportState};
use crate::registry::ConnectionRegistry;
use crate::request::Inbound;
use crate::role::Role;
use crate::router::Router;
use crate::serializer::{encode_bounded, Serializer};

/// A hubwire transport — one channel, one role, send/receive/lifecycle.
///
/// The same type serves both roles. Operations that only make sense for
/// the other role fail with [`HubwireError::WrongRole`].
pub struct Transport<B: ChannelBinding, S: Serializer> {
    config: TransportConfig,
    binding: B,
    serializer: Arc<S>,
    registry: Arc<ConnectionRegistry>,
    router: Arc<Router<S>>,
    lifecycle: Mutex<Lifecycle>,
    incoming_rx: mpsc::UnboundedReceiver<Inbound<S>>,
}

impl<B: ChannelBinding, S: Serializer> Transport<B, S> {
    /// Create a transport over `binding`. Nothing is subscribed until
    /// [`connect`](Self::connect) or [`listen`](Self::listen).
    pub fn new(config: TransportConfig, binding: B, serializer: S) -> Self {
        let serializer = Arc::new(serializer);
        let registry = Arc::new(ConnectionRegistry::new());
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        let router = Arc::new(Router::new(
            config.channel.clone(),
            serializer.clone(),
            registry.clone(),
            incoming_tx,
            config.max_message_size,
        ));

        Self {
            config,
            binding,
            serializer,
            registry,
            router,
            lifecycle: Mutex::new(Lifecycle::new()),
            incoming_rx,
        }
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    pub fn channel(&self) -> &ChannelName {
        &self.config.channel
    }

    pub fn state(&self) -> TransportState {
        self.lifecycle.lock().state()
    }

    /// True only for an endpoint whose channel subscription is active.
    pub fn is_connected(&self) -> bool {
        self.state() == TransportState::Connected
    }

    /// The reconnect delay slot consulted by an outer persistent transport.
    pub fn reconnect_delay(&self) -> Option<Duration> {
        self.config.reconnect_delay
    }

    /// Subscribe to `Connect`/`Disconnect` notifications.
    ///
    /// The channel holds the most recent 64 events. A receiver that lags
    /// further behind gets `RecvError::Lagged` and skips the oldest ones.
    pub fn lifecycle_events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle.lock().subscribe_events()
    }

    /// Endpoints the hub has heard from, in ascending id order.
    pub fn registered_endpoints(&self) -> Vec<EndpointId> {
        self.registry.ids()
    }

    /// Endpoint: start receiving from the hub.
    ///
    /// Valid from `Idle` or `Closed`; a call after `close()` subscribes afresh.
    pub fn connect(&self) -> Result<(), HubwireError> {
        self.require_role("connect", Role::Endpoint)?;
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.begin_connect()?;
        tracing::debug!("connecting on channel {}", self.config.channel);
        let subscription = self
            .binding
            .subscribe(&self.config.channel, self.router.handler(Role::Endpoint));
        lifecycle.finish_connect(subscription);
        Ok(())
    }

    /// Hub: start receiving from any endpoint.
    pub fn listen(&self) -> Result<(), HubwireError> {
        self.require_role("listen", Role::Hub)?;
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.begin_listen()?;
        let subscription = self
            .binding
            .subscribe(&self.config.channel, self.router.handler(Role::Hub));
        lifecycle.finish_listen(subscription);
        tracing::debug!("listening on channel {}", self.config.channel);
        Ok(())
    }

    /// Endpoint: send a message to the hub.
    ///
    /// Not gated on the lifecycle: before `connect()` the payload is still
    /// handed to the binding, and whatever the binding does with it stands.
    pub fn send(&self, message: &S::Message) -> Result<(), HubwireError> {
        self.require_role("send", Role::Endpoint)?;
        let payload = encode_bounded(&*self.serializer, message, self.config.max_message_size)?;
        tracing::trace!(
            "send {} bytes to hub on {}",
            payload.len(),
            self.config.channel
        );
        self.binding.send_raw(&self.config.channel, payload)?;
        Ok(())
    }

    /// Hub: send a message to a previously seen endpoint.
    pub fn send_to(&self, id: EndpointId, message: &S::Message) -> Result<(), HubwireError> {
        self.require_role("send_to", Role::Hub)?;
        let state = self.state();
        if state == TransportState::Idle {
            return Err(HubwireError::InvalidState {
                op: "send_to",
                state,
            });
        }
        let handle = self.registry.lookup(id)?;
        self.send_connection(handle.as_ref(), message)
    }

    fn send_connection(
        &self,
        handle: &dyn EndpointSink,
        message: &S::Message,
    ) -> Result<(), HubwireError> {
        let payload = encode_bounded(&*self.serializer, message, self.config.max_message_size)?;
        tracing::trace!(
            "send {} bytes to endpoint {} on {}",
            payload.len(),
            handle.id(),
            self.config.channel
        );
        handle.send_raw(&self.config.channel, payload)?;
        Ok(())
    }

    /// Stop receiving. A no-op when idle or already closed.
    pub fn close(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if let Some(subscription) = lifecycle.close() {
            self.binding
                .unsubscribe(&self.config.channel, subscription);
            tracing::debug!("closed channel {}", self.config.channel);
        }
    }

    /// Receive the next inbound message. Waits until one arrives.
    pub async fn recv(&mut self) -> Result<Inbound<S>, HubwireError> {
        self.incoming_rx
            .recv()
            .await
            .ok_or(HubwireError::Shutdown)
    }

    /// Take the next inbound message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Inbound<S>> {
        self.incoming_rx.try_recv().ok()
    }

    fn require_role(&self, op: &'static str, expected: Role) -> Result<(), HubwireError> {
        if self.config.role == expected {
            Ok(())
        } else {
            Err(HubwireError::WrongRole {
                op,
                role: self.config.role,
            })
        }
    }
}

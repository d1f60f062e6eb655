//! Transport lifecycle state machine.
//!
//! Endpoint: `Idle -> Connecting -> Connected -> Closed`.
//! Hub: `Idle -> Listening -> Closed`.
//!
//! `Closed` can be left again only through an explicit `connect()` or
//! `listen()`, which goes through the full path with a fresh subscription.

use std::fmt;

use hubwire_channel::SubscriptionId;
use tokio::sync::broadcast;

use crate::error::HubwireError;

/// Capacity of the lifecycle event broadcast channel. A receiver that falls
/// further behind than this sees `RecvError::Lagged` and loses the oldest events.
const EVENT_BUFFER: usize = 64;

/// Where a transport is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportState {
    Idle,
    Connecting,
    Connected,
    Listening,
    Closed,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Idle => write!(f, "idle"),
            TransportState::Connecting => write!(f, "connecting"),
            TransportState::Connected => write!(f, "connected"),
            TransportState::Listening => write!(f, "listening"),
            TransportState::Closed => write!(f, "closed"),
        }
    }
}

/// Lifecycle notifications. Only the endpoint role produces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Connect,
    Disconnect,
}

impl LifecycleEvent {
    /// Event name as seen by RPC layers built on this transport.
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Connect => "connect",
            LifecycleEvent::Disconnect => "disconnect",
        }
    }
}

pub(crate) struct Lifecycle {
    state: TransportState,
    subscription: Option<SubscriptionId>,
    events: broadcast::Sender<LifecycleEvent>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            state: TransportState::Idle,
            subscription: None,
            events,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    /// `Idle | Closed -> Connecting`.
    pub fn begin_connect(&mut self) -> Result<(), HubwireError> {
        self.require_startable("connect")?;
        self.state = TransportState::Connecting;
        Ok(())
    }

    /// `Connecting -> Connected`, emits `Connect`.
    pub fn finish_connect(&mut self, subscription: SubscriptionId) {
        debug_assert_eq!(self.state, TransportState::Connecting);
        self.subscription = Some(subscription);
        self.state = TransportState::Connected;
        self.emit(LifecycleEvent::Connect);
    }

    /// Check that `listen` may run from the current state.
    pub fn begin_listen(&self) -> Result<(), HubwireError> {
        self.require_startable("listen")
    }

    /// `Idle | Closed -> Listening`.
    pub fn finish_listen(&mut self, subscription: SubscriptionId) {
        self.subscription = Some(subscription);
        self.state = TransportState::Listening;
    }

    /// Move to `Closed` and hand back the subscription to remove.
    ///
    /// From `Idle` or `Closed` nothing happens and `None` is returned.
    /// Leaving `Connected` emits `Disconnect`.
    pub fn close(&mut self) -> Option<SubscriptionId> {
        let previous = self.state;
        match previous {
            TransportState::Idle | TransportState::Closed => return None,
            TransportState::Connecting | TransportState::Connected | TransportState::Listening => {}
        }
        self.state = TransportState::Closed;
        let subscription = self.subscription.take();
        if previous == TransportState::Connected {
            self.emit(LifecycleEvent::Disconnect);
        }
        subscription
    }

    fn require_startable(&self, op: &'static str) -> Result<(), HubwireError> {
        match self.state {
            TransportState::Idle | TransportState::Closed => Ok(()),
            state => Err(HubwireError::InvalidState { op, state }),
        }
    }

    fn emit(&self, event: LifecycleEvent) {
        tracing::debug!("lifecycle: {}", event.name());
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

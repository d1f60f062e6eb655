/// Connection registry: which endpoints the hub can address.
///
/// Maps an `EndpointId` to the handle that reaches it. Insertion-only:
/// the first handle registered for an id wins and entries are never
/// removed, so a live handle is never replaced by a stale one.
use std::collections::HashMap;
use std::sync::Arc;

use hubwire_channel::{EndpointId, EndpointSink};
use parking_lot::Mutex;

use crate::error::HubwireError;

/// Insertion-only map from endpoint id to a send-capable handle.
///
/// Check-and-insert happens under one lock, so registration stays atomic
/// even when deliveries arrive on several threads.
pub struct ConnectionRegistry<H = Arc<dyn EndpointSink>> {
    handles: Mutex<HashMap<EndpointId, H>>,
}

impl<H: Clone> ConnectionRegistry<H> {
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Register `handle` under `id` if the id is not known yet.
    ///
    /// Returns `true` if an insertion happened. Re-registering a known id
    /// is a no-op and keeps the original handle.
    pub fn register(&self, id: EndpointId, handle: H) -> bool {
        match self.handles.lock().entry(id) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(handle);
                true
            }
        }
    }

    /// The handle registered for `id`.
    pub fn lookup(&self, id: EndpointId) -> Result<H, HubwireError> {
        self.handles
            .lock()
            .get(&id)
            .cloned()
            .ok_or(HubwireError::UnknownEndpoint(id))
    }

    pub fn contains(&self, id: EndpointId) -> bool {
        self.handles.lock().contains_key(&id)
    }

    /// Registered ids, in ascending order.
    pub fn ids(&self) -> Vec<EndpointId> {
        let mut ids: Vec<_> = self.handles.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }
}

impl<H: Clone> Default for ConnectionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

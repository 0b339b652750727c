//! Listener registry keyed by channel id and event name.
//!
//! The registry is an explicit object owned by a [`BusEndpoint`](super::BusEndpoint)
//! rather than process-wide state, so independent endpoints (and tests)
//! never share listeners.

use super::Reply;
use crate::channel::ChannelId;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Callback invoked for each matching message.
pub type Handler = Rc<dyn Fn(&serde_json::Value, Option<Reply>)>;

/// Identifies one registration so it can be removed individually.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Key = (ChannelId, String);

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RefCell<HashMap<Key, Vec<(ListenerId, Handler)>>>,
    next_id: Cell<u64>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, channel: &ChannelId, event: &str, handler: Handler) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners
            .borrow_mut()
            .entry((channel.clone(), event.to_string()))
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove one listener. Returns whether it was registered.
    pub fn remove(&self, channel: &ChannelId, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let key = (channel.clone(), event.to_string());
        let Some(handlers) = listeners.get_mut(&key) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            listeners.remove(&key);
        }
        removed
    }

    /// Remove every listener for an event on a channel.
    pub fn remove_all(&self, channel: &ChannelId, event: &str) -> usize {
        self.listeners
            .borrow_mut()
            .remove(&(channel.clone(), event.to_string()))
            .map_or(0, |handlers| handlers.len())
    }

    /// Remove every listener on a channel.
    pub fn clear_channel(&self, channel: &ChannelId) -> usize {
        let mut listeners = self.listeners.borrow_mut();
        let mut removed = 0;
        listeners.retain(|(c, _), handlers| {
            if c == channel {
                removed += handlers.len();
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn listener_count(&self, channel: &ChannelId, event: &str) -> usize {
        self.listeners
            .borrow()
            .get(&(channel.clone(), event.to_string()))
            .map_or(0, Vec::len)
    }

    /// Invoke every listener registered for `(channel, event)`.
    ///
    /// Handlers run against a snapshot taken before the first call, with no
    /// borrow held, so handlers may register or deregister listeners
    /// (including themselves) while dispatch is in progress. A listener
    /// removed by an earlier handler in the same dispatch is skipped.
    pub fn dispatch(
        &self,
        channel: &ChannelId,
        event: &str,
        payload: &serde_json::Value,
        reply: Option<Reply>,
    ) -> usize {
        let key = (channel.clone(), event.to_string());
        let snapshot: Vec<(ListenerId, Handler)> = match self.listeners.borrow().get(&key) {
            Some(handlers) => handlers.clone(),
            None => return 0,
        };

        let mut invoked = 0;
        for (id, handler) in snapshot {
            if !self.is_registered(&key, id) {
                continue;
            }
            handler(payload, reply.clone());
            invoked += 1;
        }
        invoked
    }

    fn is_registered(&self, key: &Key, id: ListenerId) -> bool {
        self.listeners
            .borrow()
            .get(key)
            .is_some_and(|handlers| handlers.iter().any(|(existing, _)| *existing == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn channel(id: &str) -> ChannelId {
        ChannelId::parse(id).unwrap()
    }

    #[test]
    fn test_channels_are_isolated() {
        let registry = ListenerRegistry::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        registry.add(
            &channel("a"),
            "report",
            Rc::new(move |_, _| h.set(h.get() + 1)),
        );

        assert_eq!(registry.dispatch(&channel("b"), "report", &json!(null), None), 0);
        assert_eq!(registry.dispatch(&channel("a"), "other", &json!(null), None), 0);
        assert_eq!(registry.dispatch(&channel("a"), "report", &json!(null), None), 1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_handler_can_remove_itself_during_dispatch() {
        let registry = Rc::new(ListenerRegistry::new());
        let hits = Rc::new(Cell::new(0));
        let id_slot: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));

        let (r, h, slot) = (registry.clone(), hits.clone(), id_slot.clone());
        let id = registry.add(
            &channel("a"),
            "ready",
            Rc::new(move |_, _| {
                h.set(h.get() + 1);
                if let Some(id) = slot.get() {
                    r.remove(&channel("a"), "ready", id);
                }
            }),
        );
        id_slot.set(Some(id));

        let h2 = hits.clone();
        registry.add(
            &channel("a"),
            "ready",
            Rc::new(move |_, _| h2.set(h2.get() + 10)),
        );

        assert_eq!(registry.dispatch(&channel("a"), "ready", &json!(null), None), 2);
        assert_eq!(hits.get(), 11);
        assert_eq!(registry.listener_count(&channel("a"), "ready"), 1);

        registry.dispatch(&channel("a"), "ready", &json!(null), None);
        assert_eq!(hits.get(), 21);
    }

    #[test]
    fn test_handler_removed_by_earlier_handler_is_skipped() {
        let registry = Rc::new(ListenerRegistry::new());
        let hits = Rc::new(Cell::new(0));

        let r = registry.clone();
        registry.add(
            &channel("a"),
            "x",
            Rc::new(move |_, _| {
                r.remove_all(&channel("a"), "x");
            }),
        );
        let h = hits.clone();
        registry.add(&channel("a"), "x", Rc::new(move |_, _| h.set(1)));

        assert_eq!(registry.dispatch(&channel("a"), "x", &json!(null), None), 1);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_clear_channel() {
        let registry = ListenerRegistry::new();
        registry.add(&channel("a"), "x", Rc::new(|_, _| {}));
        registry.add(&channel("a"), "y", Rc::new(|_, _| {}));
        registry.add(&channel("b"), "x", Rc::new(|_, _| {}));

        assert_eq!(registry.clear_channel(&channel("a")), 2);
        assert_eq!(registry.listener_count(&channel("b"), "x"), 1);
    }
}

//! Channel-scoped publish/subscribe over cross-context message passing.
//!
//! Every browsing context (host page, dispatch frame, popup) owns one
//! [`BusEndpoint`]. Raw messages arriving from other contexts are fed to
//! [`BusEndpoint::receive`], which decodes them and dispatches to listeners
//! registered for the message's channel and event. A [`MessageBus`] is a
//! view over an endpoint for a single [`ChannelId`], plus an optional
//! outbound [`BusTransport`] used by `emit`.
//!
//! Delivery is fire-and-forget: there is no acknowledgement or retry beyond
//! the optional one-shot reply of [`MessageBus::emit_with_reply`].

mod envelope;
mod loopback;
mod registry;

pub use envelope::{Envelope, ENVELOPE_PREFIX};
pub use loopback::LoopbackTransport;
pub use registry::{Handler, ListenerId, ListenerRegistry};

use crate::channel::ChannelId;
use crate::errors::BusError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Well-known bus events used by the frame protocol.
pub mod events {
    /// Emitted by the dispatch frame once it has loaded.
    pub const DISPATCH_FRAME_READY: &str = "dispatchFrameReady";
    /// Carries the final `{err, payload}` result of a popup flow.
    pub const DISPATCH_FRAME_REPORT: &str = "dispatchFrameReport";
}

/// Outbound side of a cross-context link (e.g. `postMessage` to a frame).
pub trait BusTransport {
    fn post(&self, message: &str) -> Result<(), BusError>;
}

type ReplyHandler = Box<dyn FnOnce(serde_json::Value)>;

/// Replies awaited per endpoint before the oldest is dropped. A receiver
/// may never answer, so unanswered entries must not pile up.
pub const MAX_PENDING_REPLIES: usize = 32;

#[derive(Default)]
struct PendingReplies {
    next_seq: u64,
    entries: HashMap<(ChannelId, String), (u64, ReplyHandler)>,
}

impl PendingReplies {
    fn insert(&mut self, key: (ChannelId, String), handler: ReplyHandler) {
        if self.entries.len() >= MAX_PENDING_REPLIES {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, (seq, _))| *seq)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                tracing::debug!(event = %oldest.1, "dropping unanswered bus reply");
                self.entries.remove(&oldest);
            }
        }
        self.next_seq += 1;
        self.entries.insert(key, (self.next_seq, handler));
    }

    fn remove(&mut self, key: &(ChannelId, String)) -> Option<ReplyHandler> {
        self.entries.remove(key).map(|(_, handler)| handler)
    }
}

/// Per-context receiver: listener registry, pending replies, origin policy.
#[derive(Default)]
pub struct BusEndpoint {
    registry: ListenerRegistry,
    pending_replies: RefCell<PendingReplies>,
    allowed_origin: Option<String>,
}

impl BusEndpoint {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Only accept messages whose origin equals `origin`.
    pub fn with_allowed_origin(origin: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            allowed_origin: Some(origin.into()),
            ..Self::default()
        })
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    /// Feed one raw message from another context.
    ///
    /// `source` is the path back to the sender and is required to answer
    /// messages that expect a reply. Returns whether the message was bus
    /// traffic accepted by this endpoint.
    pub fn receive(
        &self,
        raw: &str,
        origin: &str,
        source: Option<Rc<dyn BusTransport>>,
    ) -> Result<bool, BusError> {
        if let Some(allowed) = &self.allowed_origin {
            if allowed != origin {
                tracing::debug!(origin, "dropping bus message from foreign origin");
                return Ok(false);
            }
        }

        let Some(envelope) = Envelope::decode(raw)? else {
            return Ok(false);
        };

        let pending = self
            .pending_replies
            .borrow_mut()
            .remove(&(envelope.channel.clone(), envelope.event.clone()));
        if let Some(reply_handler) = pending {
            reply_handler(envelope.payload);
            return Ok(true);
        }

        let reply = match (envelope.reply, source) {
            (Some(event), Some(transport)) => Some(Reply {
                channel: envelope.channel.clone(),
                event,
                transport,
            }),
            _ => None,
        };
        self.registry
            .dispatch(&envelope.channel, &envelope.event, &envelope.payload, reply);
        Ok(true)
    }

    fn expect_reply(&self, channel: &ChannelId, event: String, handler: ReplyHandler) {
        self.pending_replies
            .borrow_mut()
            .insert((channel.clone(), event), handler);
    }

    fn forget_replies(&self, channel: &ChannelId) {
        self.pending_replies
            .borrow_mut()
            .entries
            .retain(|(c, _), _| c != channel);
    }

    /// Number of replies this endpoint is still waiting for.
    pub fn pending_reply_count(&self) -> usize {
        self.pending_replies.borrow().entries.len()
    }
}

/// One-shot answer to a message sent with [`MessageBus::emit_with_reply`].
#[derive(Clone)]
pub struct Reply {
    channel: ChannelId,
    event: String,
    transport: Rc<dyn BusTransport>,
}

impl Reply {
    pub fn send(self, payload: serde_json::Value) -> Result<(), BusError> {
        let envelope = Envelope::new(self.channel, self.event, payload);
        self.transport.post(&envelope.encode()?)
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("channel", &self.channel)
            .field("event", &self.event)
            .finish()
    }
}

/// Bus scoped to one channel.
pub struct MessageBus {
    channel: ChannelId,
    endpoint: Rc<BusEndpoint>,
    transport: RefCell<Option<Rc<dyn BusTransport>>>,
}

impl MessageBus {
    pub fn new(channel: ChannelId, endpoint: Rc<BusEndpoint>) -> Self {
        Self {
            channel,
            endpoint,
            transport: RefCell::new(None),
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Direct outbound messages at `transport`.
    pub fn attach(&self, transport: Rc<dyn BusTransport>) {
        *self.transport.borrow_mut() = Some(transport);
    }

    pub fn detach(&self) {
        self.transport.borrow_mut().take();
    }

    pub fn on<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&serde_json::Value, Option<Reply>) + 'static,
    {
        self.endpoint
            .registry
            .add(&self.channel, event, Rc::new(handler))
    }

    /// Remove every listener for `event` on this channel.
    pub fn off(&self, event: &str) -> usize {
        self.endpoint.registry.remove_all(&self.channel, event)
    }

    /// Remove one listener previously returned by [`MessageBus::on`].
    pub fn off_listener(&self, event: &str, id: ListenerId) -> bool {
        self.endpoint.registry.remove(&self.channel, event, id)
    }

    pub fn emit(&self, event: &str, payload: serde_json::Value) -> Result<(), BusError> {
        let envelope = Envelope::new(self.channel.clone(), event, payload);
        self.post(&envelope)
    }

    /// Emit and register a one-shot handler for the receiver's reply.
    pub fn emit_with_reply<F>(
        &self,
        event: &str,
        payload: serde_json::Value,
        on_reply: F,
    ) -> Result<(), BusError>
    where
        F: FnOnce(serde_json::Value) + 'static,
    {
        let reply_event = uuid::Uuid::new_v4().to_string();
        let mut envelope = Envelope::new(self.channel.clone(), event, payload);
        envelope.reply = Some(reply_event.clone());

        self.endpoint
            .expect_reply(&self.channel, reply_event.clone(), Box::new(on_reply));
        let result = self.post(&envelope);
        if result.is_err() {
            self.endpoint
                .pending_replies
                .borrow_mut()
                .remove(&(self.channel.clone(), reply_event));
        }
        result
    }

    /// Drop every listener and pending reply on this channel.
    pub fn teardown(&self) {
        self.endpoint.registry.clear_channel(&self.channel);
        self.endpoint.forget_replies(&self.channel);
        self.detach();
    }

    fn post(&self, envelope: &Envelope) -> Result<(), BusError> {
        let transport = self.transport.borrow().clone().ok_or(BusError::Detached)?;
        transport.post(&envelope.encode()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    fn pair() -> (Rc<BusEndpoint>, Rc<BusEndpoint>) {
        (BusEndpoint::new(), BusEndpoint::new())
    }

    #[test]
    fn test_emit_without_transport_is_detached() {
        let bus = MessageBus::new(ChannelId::generate(), BusEndpoint::new());
        assert!(matches!(
            bus.emit("x", json!(null)),
            Err(BusError::Detached)
        ));
    }

    #[test]
    fn test_emit_reaches_same_channel_only() {
        let (a, b) = pair();
        let channel = ChannelId::generate();
        let sender = MessageBus::new(channel.clone(), a.clone());
        sender.attach(LoopbackTransport::new(&a, &b, "https://assets"));

        let same = MessageBus::new(channel, b.clone());
        let other = MessageBus::new(ChannelId::generate(), b.clone());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        same.on("report", move |payload, _| s.borrow_mut().push(payload.clone()));
        let leaked = Rc::new(Cell::new(false));
        let l = leaked.clone();
        other.on("report", move |_, _| l.set(true));

        sender.emit("report", json!({ "n": 1 })).unwrap();
        sender.emit("report", json!({ "n": 2 })).unwrap();

        assert_eq!(*seen.borrow(), vec![json!({ "n": 1 }), json!({ "n": 2 })]);
        assert!(!leaked.get());
    }

    #[test]
    fn test_reply_round_trip() {
        let (a, b) = pair();
        let channel = ChannelId::generate();
        let sender = MessageBus::new(channel.clone(), a.clone());
        sender.attach(LoopbackTransport::new(&a, &b, "https://assets"));

        let receiver = MessageBus::new(channel, b.clone());
        receiver.on("ping", |payload, reply| {
            let n = payload["n"].as_i64().unwrap_or_default();
            reply.unwrap().send(json!({ "n": n + 1 })).unwrap();
        });

        let answer = Rc::new(RefCell::new(None));
        let a2 = answer.clone();
        sender
            .emit_with_reply("ping", json!({ "n": 41 }), move |payload| {
                *a2.borrow_mut() = Some(payload);
            })
            .unwrap();

        assert_eq!(*answer.borrow(), Some(json!({ "n": 42 })));
    }

    #[test]
    fn test_off_removes_all_listeners() {
        let endpoint = BusEndpoint::new();
        let bus = MessageBus::new(ChannelId::generate(), endpoint.clone());
        bus.on("x", |_, _| {});
        bus.on("x", |_, _| {});
        assert_eq!(bus.off("x"), 2);
        assert_eq!(endpoint.registry().listener_count(bus.channel(), "x"), 0);
    }

    #[test]
    fn test_off_listener_removes_only_that_listener() {
        let (a, b) = pair();
        let channel = ChannelId::generate();
        let sender = MessageBus::new(channel.clone(), a.clone());
        sender.attach(LoopbackTransport::new(&a, &b, "https://assets"));

        let receiver = MessageBus::new(channel, b.clone());
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        let f = first.clone();
        let id = receiver.on("x", move |_, _| f.set(f.get() + 1));
        let s = second.clone();
        receiver.on("x", move |_, _| s.set(s.get() + 1));

        assert!(receiver.off_listener("x", id));
        assert!(!receiver.off_listener("x", id));
        sender.emit("x", json!(null)).unwrap();

        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
        assert_eq!(b.registry().listener_count(receiver.channel(), "x"), 1);
    }

    #[test]
    fn test_unanswered_replies_are_bounded() {
        let (a, b) = pair();
        let channel = ChannelId::generate();
        let sender = MessageBus::new(channel, a.clone());
        sender.attach(LoopbackTransport::new(&a, &b, "https://assets"));

        let answered = Rc::new(Cell::new(0));
        for _ in 0..(MAX_PENDING_REPLIES + 18) {
            let n = answered.clone();
            sender
                .emit_with_reply("nobody-listens", json!(null), move |_| n.set(n.get() + 1))
                .unwrap();
        }

        assert_eq!(a.pending_reply_count(), MAX_PENDING_REPLIES);
        assert_eq!(answered.get(), 0);
    }

    #[test]
    fn test_origin_policy() {
        let endpoint = BusEndpoint::with_allowed_origin("https://assets");
        let channel = ChannelId::generate();
        let bus = MessageBus::new(channel.clone(), endpoint.clone());
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        bus.on("x", move |_, _| h.set(h.get() + 1));

        let raw = Envelope::new(channel, "x", json!(null)).encode().unwrap();
        assert!(!endpoint.receive(&raw, "https://evil", None).unwrap());
        assert!(endpoint.receive(&raw, "https://assets", None).unwrap());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_teardown_forgets_pending_replies() {
        let (a, b) = pair();
        let channel = ChannelId::generate();
        let sender = MessageBus::new(channel.clone(), a.clone());
        sender.attach(LoopbackTransport::new(&a, &b, "https://assets"));

        let stash: Rc<RefCell<Option<Reply>>> = Rc::new(RefCell::new(None));
        let receiver = MessageBus::new(channel, b.clone());
        let s = stash.clone();
        receiver.on("ping", move |_, reply| *s.borrow_mut() = reply);

        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        sender
            .emit_with_reply("ping", json!(null), move |_| f.set(true))
            .unwrap();
        sender.teardown();

        let reply = stash.borrow_mut().take().unwrap();
        reply.send(json!(null)).unwrap();
        assert!(!fired.get());
    }
}

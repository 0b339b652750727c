//! The dispatch frame page.
//!
//! An invisible, SDK-origin frame written into the host document by
//! [`FrameService::initialize`](crate::FrameService::initialize). It stays
//! addressable by name while the popup wanders across third-party origins,
//! and relays the popup's report to the host page.

use crate::bus::{events, BusEndpoint, BusTransport, MessageBus};
use crate::channel::ChannelId;
use serde_json::Value;
use std::rc::Rc;

/// What the dispatch frame page can see of its own context.
pub trait DispatchContext {
    /// This frame's name (`dispatch_<channel>`).
    fn frame_name(&self) -> String;

    /// Transport posting to the embedding host page.
    fn parent(&self) -> Option<Rc<dyn BusTransport>>;
}

/// Outcome of starting the dispatch frame page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Ready was announced and reports will be relayed.
    Relaying,
    /// The frame name did not carry a channel id.
    UnknownChannel,
    /// No parent to report to.
    Orphaned,
}

/// Start the dispatch frame: announce readiness to the host and relay
/// reports from the popup.
///
/// `endpoint` is the dispatch frame's own bus endpoint; the returned bus
/// must stay alive for as long as the page does.
pub fn run_dispatch_frame(
    ctx: &dyn DispatchContext,
    endpoint: Rc<BusEndpoint>,
) -> (DispatchOutcome, Option<Rc<MessageBus>>) {
    let frame_name = ctx.frame_name();
    let Some(channel) = ChannelId::from_dispatch_frame_name(&frame_name) else {
        tracing::warn!(frame = %frame_name, "dispatch frame name carries no channel");
        return (DispatchOutcome::UnknownChannel, None);
    };
    let Some(parent) = ctx.parent() else {
        tracing::warn!(%channel, "dispatch frame has no parent");
        return (DispatchOutcome::Orphaned, None);
    };

    let bus = Rc::new(MessageBus::new(channel.clone(), endpoint));
    bus.attach(parent);

    let relay = Rc::downgrade(&bus);
    bus.on(events::DISPATCH_FRAME_REPORT, move |payload, reply| {
        let Some(bus) = relay.upgrade() else {
            return;
        };
        let sent = match reply {
            Some(reply) => bus.emit_with_reply(
                events::DISPATCH_FRAME_REPORT,
                payload.clone(),
                move |ack: Value| {
                    if let Err(err) = reply.send(ack) {
                        tracing::debug!(error = %err, "could not forward acknowledgement");
                    }
                },
            ),
            None => bus.emit(events::DISPATCH_FRAME_REPORT, payload.clone()),
        };
        if let Err(err) = sent {
            tracing::warn!(channel = %bus.channel(), error = %err, "could not relay frame report");
        }
    });

    if let Err(err) = bus.emit(events::DISPATCH_FRAME_READY, Value::Null) {
        tracing::warn!(%channel, error = %err, "could not announce dispatch frame");
    }
    tracing::debug!(%channel, "dispatch frame relaying");
    (DispatchOutcome::Relaying, Some(bus))
}

//! Landing-page scripts that run inside the popup.
//!
//! Third parties redirect the popup to one of two SDK-hosted pages:
//!
//! - the redirect page reports the query-string parameters as the payload,
//!   then closes itself once the host acknowledges the report or a
//!   fallback timer elapses, whichever comes first;
//! - the cancel page reports a frame-closed error and closes itself after a
//!   short delay.
//!
//! If the dispatch frame cannot be reached the report is silently lost;
//! the host's close poll then completes the flow.

use crate::bus::{events, BusEndpoint, BusTransport, MessageBus};
use crate::channel::ChannelId;
use crate::config::Timings;
use crate::errors::SdkError;
use crate::platform::Scheduler;
use crate::query;
use crate::report::FrameReport;
use std::cell::Cell;
use std::rc::Rc;

/// What a landing page can see of the popup it runs in.
pub trait PopupContext {
    /// The current URL's query string (`location.search`).
    fn query(&self) -> String;

    /// The popup's window name, which embeds the channel id.
    fn window_name(&self) -> String;

    /// Find the named dispatch frame through the opener's frame tree.
    fn locate_dispatch_frame(&self, frame_name: &str) -> Option<Rc<dyn BusTransport>>;

    fn close_window(&self);
}

/// Outcome of running a landing-page script.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptOutcome {
    /// The report was handed to the dispatch frame.
    Reported,
    /// The window name did not carry a channel id.
    UnknownChannel,
    /// The dispatch frame could not be reached.
    DispatchFrameUnreachable,
}

/// Runs landing-page scripts against one popup context.
pub struct FrameScripts {
    ctx: Rc<dyn PopupContext>,
    scheduler: Rc<dyn Scheduler>,
    endpoint: Rc<BusEndpoint>,
    timings: Timings,
}

impl FrameScripts {
    pub fn new(
        ctx: Rc<dyn PopupContext>,
        scheduler: Rc<dyn Scheduler>,
        endpoint: Rc<BusEndpoint>,
        timings: Timings,
    ) -> Self {
        Self {
            ctx,
            scheduler,
            endpoint,
            timings,
        }
    }

    /// Report the current query parameters as a successful result.
    pub fn run_redirect(&self) -> ScriptOutcome {
        let params = query::parse(&self.ctx.query());
        let report = FrameReport::success(query::to_payload(params));

        let close = self.close_once();
        let on_ack = close.clone();
        let outcome = self.report(report, move || on_ack());

        let fallback = close;
        self.scheduler.set_timeout(
            self.timings.redirect_close_fallback,
            Box::new(move || fallback()),
        );
        outcome
    }

    /// Report that the customer canceled.
    pub fn run_cancel(&self) -> ScriptOutcome {
        let err = serde_json::to_value(SdkError::frame_closed()).unwrap_or_default();
        let outcome = self.report(FrameReport::failure(err), || {});

        let close = self.close_once();
        self.scheduler
            .set_timeout(self.timings.cancel_close_delay, Box::new(move || close()));
        outcome
    }

    fn report<F>(&self, report: FrameReport, on_ack: F) -> ScriptOutcome
    where
        F: FnOnce() + 'static,
    {
        let window_name = self.ctx.window_name();
        let Some(channel) = ChannelId::from_window_name(&window_name) else {
            tracing::warn!(window = %window_name, "popup window name carries no channel");
            return ScriptOutcome::UnknownChannel;
        };
        let frame_name = channel.dispatch_frame_name();
        let Some(transport) = self.ctx.locate_dispatch_frame(&frame_name) else {
            tracing::warn!(frame = %frame_name, "dispatch frame unreachable; relying on close poll");
            return ScriptOutcome::DispatchFrameUnreachable;
        };

        let bus = MessageBus::new(channel, self.endpoint.clone());
        bus.attach(transport);
        match bus.emit_with_reply(events::DISPATCH_FRAME_REPORT, report.to_value(), move |_| {
            on_ack()
        }) {
            Ok(()) => ScriptOutcome::Reported,
            Err(err) => {
                tracing::warn!(error = %err, "frame report could not be sent");
                ScriptOutcome::DispatchFrameUnreachable
            }
        }
    }

    /// A close action that only reaches the window once.
    fn close_once(&self) -> Rc<dyn Fn()> {
        let ctx = self.ctx.clone();
        let closed = Cell::new(false);
        Rc::new(move || {
            if !closed.replace(true) {
                ctx.close_window();
            }
        })
    }
}

//! Host-page orchestrator for one popup-based authorization attempt.
//!
//! A [`FrameService`] owns one channel, one dispatch frame and, while a flow
//! is open, one [`PopupStrategy`]. It delivers exactly one
//! [`CompletionResult`] per `open` call, through whichever of two paths
//! wins:
//!
//! 1. a frame report arriving over the bus (or from the native bridge), or
//! 2. the close poll noticing the popup is gone.
//!
//! Both paths take the pending callback out of a [`OnceSlot`] before doing
//! anything, so the loser finds it empty and does nothing.
//!
//! ```text
//! Uninitialized -> Initializing -> Ready -> FlowOpen -> Closed -> TornDown
//!                                    ^                    |
//!                                    +---- open again ----+
//! ```

use crate::bus::{events, BusEndpoint, MessageBus, Reply};
use crate::channel::ChannelId;
use crate::config::{FrameConfiguration, FrameServiceOptions, Timings};
use crate::errors::{ConfigError, FlowError, SdkError};
use crate::once::OnceSlot;
use crate::platform::{FrameHost, FrameNodeId, FrameSpec, Scheduler, TimerId};
use crate::popup::{CompletionSink, PopupEnvironment, PopupRequest, PopupStrategy};
use crate::report::FrameReport;
use crate::{CompletionCallback, CompletionResult};
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceState {
    Uninitialized,
    Initializing,
    Ready,
    FlowOpen,
    Closed,
    TornDown,
}

/// Collaborators a service runs against.
#[derive(Clone)]
pub struct Platform {
    pub scheduler: Rc<dyn Scheduler>,
    pub frame_host: Rc<dyn FrameHost>,
    pub popups: PopupEnvironment,
    /// This page's bus endpoint, fed by the page's message listener.
    pub endpoint: Rc<BusEndpoint>,
    pub timings: Timings,
}

/// Per-call overrides for [`FrameService::open_with`].
#[derive(Clone, Debug, Default)]
pub struct OpenOptions {
    /// Open this URL instead of the configured `openFrameUrl`.
    pub url: Option<String>,
}

/// Validate `options`, build a service and start initializing it.
///
/// `ready` runs once the dispatch frame signals that it has loaded.
pub fn create<F>(
    options: FrameServiceOptions,
    platform: Platform,
    ready: F,
) -> Result<FrameService, ConfigError>
where
    F: FnOnce() + 'static,
{
    let service = FrameService::from_options(options, platform)?;
    service.initialize(ready);
    Ok(service)
}

pub struct FrameService {
    inner: Rc<Inner>,
}

struct Inner {
    config: FrameConfiguration,
    platform: Platform,
    channel: ChannelId,
    bus: MessageBus,
    state: Cell<ServiceState>,
    popup: RefCell<Option<PopupStrategy>>,
    pending: OnceSlot<CompletionCallback>,
    dispatch_frame: Cell<Option<FrameNodeId>>,
    poll_timer: Cell<Option<TimerId>>,
}

impl FrameService {
    pub fn new(config: FrameConfiguration, platform: Platform) -> Self {
        let channel = ChannelId::generate();
        let bus = MessageBus::new(channel.clone(), platform.endpoint.clone());
        Self {
            inner: Rc::new(Inner {
                config,
                platform,
                channel,
                bus,
                state: Cell::new(ServiceState::Uninitialized),
                popup: RefCell::new(None),
                pending: OnceSlot::empty(),
                dispatch_frame: Cell::new(None),
                poll_timer: Cell::new(None),
            }),
        }
    }

    pub fn from_options(
        options: FrameServiceOptions,
        platform: Platform,
    ) -> Result<Self, ConfigError> {
        let config = FrameConfiguration::try_from(options)?;
        Ok(Self::new(config, platform))
    }

    pub fn channel(&self) -> &ChannelId {
        &self.inner.channel
    }

    pub fn state(&self) -> ServiceState {
        self.inner.state.get()
    }

    pub fn config(&self) -> &FrameConfiguration {
        &self.inner.config
    }

    pub fn dispatch_frame_name(&self) -> String {
        self.inner.channel.dispatch_frame_name()
    }

    /// Window name given to popups, from which the popup recovers the channel.
    pub fn popup_window_name(&self) -> String {
        self.inner
            .channel
            .popup_window_name(self.inner.config.name())
    }

    /// Write the dispatch frame and wait for it to report readiness.
    ///
    /// `ready` runs the first time the ready event arrives. Calling this
    /// more than once has no effect.
    pub fn initialize<F>(&self, ready: F)
    where
        F: FnOnce() + 'static,
    {
        let inner = &self.inner;
        if inner.state.get() != ServiceState::Uninitialized {
            tracing::debug!(channel = %inner.channel, "frame service already initialized");
            return;
        }
        inner.state.set(ServiceState::Initializing);

        let ready: Box<dyn FnOnce()> = Box::new(ready);
        let ready_slot = Rc::new(OnceSlot::with(ready));
        let weak = Rc::downgrade(inner);
        inner
            .bus
            .on(events::DISPATCH_FRAME_READY, move |_payload, _reply| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let Some(ready) = ready_slot.take() else {
                    return;
                };
                inner.bus.off(events::DISPATCH_FRAME_READY);
                inner.on_dispatch_ready();
                ready();
            });

        let spec = FrameSpec {
            name: inner.channel.dispatch_frame_name(),
            src: inner.config.dispatch_frame_url().to_string(),
        };
        let node = inner.platform.frame_host.append_frame(&spec);
        inner.dispatch_frame.set(Some(node));
        tracing::debug!(channel = %inner.channel, frame = %spec.name, "dispatch frame written");
    }

    /// Open the popup at the configured `openFrameUrl`.
    ///
    /// `on_complete` receives exactly one result.
    pub fn open<F>(&self, on_complete: F)
    where
        F: FnOnce(CompletionResult) + 'static,
    {
        self.open_with(OpenOptions::default(), on_complete);
    }

    pub fn open_with<F>(&self, options: OpenOptions, on_complete: F)
    where
        F: FnOnce(CompletionResult) + 'static,
    {
        Inner::open(&self.inner, options, Box::new(on_complete));
    }

    /// Navigate the open popup. Does nothing when no popup is open.
    pub fn redirect(&self, url: &str) {
        if self.inner.is_frame_closed() {
            tracing::debug!(channel = %self.inner.channel, "redirect ignored: no popup open");
            return;
        }
        self.inner.with_popup(|popup| popup.redirect(url));
    }

    pub fn focus(&self) {
        if !self.inner.is_frame_closed() {
            self.inner.with_popup(|popup| popup.focus());
        }
    }

    /// Close the popup, if one is open.
    ///
    /// The flow then completes through the close poll with a frame-closed
    /// error, unless a report beats it.
    pub fn close(&self) {
        if !self.inner.is_frame_closed() {
            self.inner.with_popup(|popup| popup.close());
        }
    }

    pub fn is_frame_closed(&self) -> bool {
        self.inner.is_frame_closed()
    }

    pub fn is_frame_open(&self) -> bool {
        !self.inner.is_frame_closed()
    }

    /// Close the popup, remove the dispatch frame and drop every listener.
    ///
    /// An outstanding `open` callback receives a frame-closed error. Safe to
    /// call repeatedly and on a service that never opened a popup; `done`
    /// runs every time.
    pub fn teardown<F: FnOnce()>(&self, done: F) {
        let inner = &self.inner;
        if inner.state.get() != ServiceState::TornDown {
            inner.state.set(ServiceState::TornDown);
            inner.end_flow(true);
            if let Some(node) = inner.dispatch_frame.take() {
                inner.platform.frame_host.remove_frame(node);
                tracing::debug!(channel = %inner.channel, "dispatch frame removed");
            }
            inner.bus.teardown();
            if let Some(callback) = inner.pending.take() {
                callback(Err(FlowError::closed()));
            }
            tracing::info!(channel = %inner.channel, "frame service torn down");
        }
        done();
    }
}

impl Inner {
    fn open(self: &Rc<Self>, options: OpenOptions, on_complete: CompletionCallback) {
        match self.state.get() {
            ServiceState::Ready | ServiceState::Closed => {}
            ServiceState::FlowOpen => {
                on_complete(Err(FlowError::AlreadyOpen(SdkError::frame_already_open())));
                return;
            }
            state => {
                tracing::warn!(channel = %self.channel, ?state, "open refused");
                let reason = match state {
                    ServiceState::TornDown => "frame service was torn down",
                    _ => "dispatch frame is not ready",
                };
                on_complete(Err(FlowError::OpenFailed(
                    SdkError::frame_open_failed().with_details(json!({ "reason": reason })),
                )));
                return;
            }
        }

        if let Err(rejected) = self.pending.fill(on_complete) {
            rejected(Err(FlowError::AlreadyOpen(SdkError::frame_already_open())));
            return;
        }

        let weak = Rc::downgrade(self);
        self.bus
            .on(events::DISPATCH_FRAME_REPORT, move |payload, reply| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_report(payload, reply);
                }
            });

        let mut strategy = self
            .platform
            .popups
            .create_strategy(*self.config.popup());
        strategy.initialize(|| {});

        let request = PopupRequest {
            url: options
                .url
                .unwrap_or_else(|| self.config.open_frame_url().to_string()),
            window_name: self.channel.popup_window_name(self.config.name()),
        };
        let sink = self.completion_sink();

        self.state.set(ServiceState::FlowOpen);
        match strategy.open(&request, sink) {
            Ok(()) if self.pending.is_filled() => {
                *self.popup.borrow_mut() = Some(strategy);
                self.start_polling();
                tracing::info!(channel = %self.channel, url = %request.url, "popup opened");
            }
            Ok(()) => {
                // Completed synchronously while opening.
                strategy.close();
            }
            Err(err) => {
                tracing::warn!(channel = %self.channel, error = %err, "popup failed to open");
                self.end_flow(false);
                if let Some(callback) = self.pending.take() {
                    callback(Err(FlowError::OpenFailed(err)));
                }
            }
        }
    }

    fn completion_sink(self: &Rc<Self>) -> CompletionSink {
        let weak: Weak<Self> = Rc::downgrade(self);
        Rc::new(move |result| {
            if let Some(inner) = weak.upgrade() {
                inner.complete(result);
            }
        })
    }

    fn on_dispatch_ready(&self) {
        if self.state.get() == ServiceState::TornDown {
            return;
        }
        let frame_name = self.channel.dispatch_frame_name();
        match self.platform.frame_host.locate_frame(&frame_name) {
            Some(transport) => self.bus.attach(transport),
            None => {
                tracing::warn!(channel = %self.channel, frame = %frame_name, "dispatch frame not addressable")
            }
        }
        if self.state.get() == ServiceState::Initializing {
            self.state.set(ServiceState::Ready);
        }
        tracing::debug!(channel = %self.channel, "dispatch frame ready");
    }

    fn handle_report(&self, payload: &Value, reply: Option<Reply>) {
        tracing::debug!(channel = %self.channel, "frame report received");
        self.complete(FrameReport::from_value(payload).into_result());
        if let Some(reply) = reply {
            if let Err(err) = reply.send(Value::Null) {
                tracing::debug!(channel = %self.channel, error = %err, "could not acknowledge report");
            }
        }
    }

    /// Deliver a result reported by the popup side.
    fn complete(&self, result: CompletionResult) {
        let Some(callback) = self.pending.take() else {
            tracing::debug!(channel = %self.channel, "result arrived after completion; ignored");
            return;
        };
        self.end_flow(true);
        tracing::info!(channel = %self.channel, success = result.is_ok(), "frame flow completed");
        callback(result);
    }

    fn start_polling(self: &Rc<Self>) {
        self.stop_polling();
        let weak = Rc::downgrade(self);
        let id = self.platform.scheduler.set_interval(
            self.platform.timings.poll_interval,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.poll_for_popup_close();
                }
            }),
        );
        self.poll_timer.set(Some(id));
    }

    fn stop_polling(&self) {
        if let Some(id) = self.poll_timer.take() {
            self.platform.scheduler.clear(id);
        }
    }

    fn poll_for_popup_close(&self) {
        if !self.is_frame_closed() {
            return;
        }
        self.end_flow(false);
        if let Some(callback) = self.pending.take() {
            tracing::info!(channel = %self.channel, "popup closed before reporting");
            callback(Err(FlowError::closed()));
        }
    }

    /// Stop polling, stop listening for reports and release the popup.
    fn end_flow(&self, close_popup: bool) {
        self.stop_polling();
        self.bus.off(events::DISPATCH_FRAME_REPORT);
        let popup = self.popup.borrow_mut().take();
        if let Some(mut popup) = popup {
            if close_popup {
                popup.close();
            }
        }
        if self.state.get() == ServiceState::FlowOpen {
            self.state.set(ServiceState::Closed);
        }
    }

    fn is_frame_closed(&self) -> bool {
        self.popup
            .borrow()
            .as_ref()
            .map_or(true, PopupStrategy::is_closed)
    }

    /// Run `f` against the popup without holding a borrow, so strategies
    /// may complete the flow re-entrantly.
    fn with_popup<R>(&self, f: impl FnOnce(&mut PopupStrategy) -> R) -> Option<R> {
        let mut popup = self.popup.borrow_mut().take()?;
        let result = f(&mut popup);
        if self.state.get() == ServiceState::FlowOpen && self.pending.is_filled() {
            *self.popup.borrow_mut() = Some(popup);
        } else {
            popup.close();
        }
        Some(result)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

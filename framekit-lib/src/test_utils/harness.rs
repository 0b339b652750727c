//! A host page, its dispatch frame and its popups wired together in-process.

use super::clock::ManualScheduler;
use super::mocks::{MockBridge, MockDispatchContext, MockFrameHost, MockPopupContext, MockWindowOpener};
use crate::bus::{events, BusEndpoint, BusTransport, LoopbackTransport, MessageBus};
use crate::channel::ChannelId;
use crate::config::{FrameServiceOptions, Timings};
use crate::dispatch::{run_dispatch_frame, DispatchOutcome};
use crate::popup::{NativeBridge, PopupEnvironment, WindowOpener};
use crate::scripts::{FrameScripts, ScriptOutcome};
use crate::service::{FrameService, Platform};
use crate::{CompletionResult, FrameReport};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Origin serving the dispatch frame and landing pages.
pub const ASSET_ORIGIN: &str = "https://assets.framekit.test";
/// Origin of the merchant page embedding the SDK.
pub const HOST_ORIGIN: &str = "https://merchant.test";

pub const TEST_NAME: &str = "checkout";
pub const DISPATCH_FRAME_URL: &str = "https://assets.framekit.test/dispatch.html";
pub const OPEN_FRAME_URL: &str = "https://assets.framekit.test/landing.html";

/// Everything a [`FrameService`] needs, backed by mocks.
///
/// The host endpoint only accepts messages from [`ASSET_ORIGIN`], like a
/// real host page listening for its dispatch frame.
pub struct TestHarness {
    pub scheduler: Rc<ManualScheduler>,
    pub frame_host: Rc<MockFrameHost>,
    pub opener: Rc<MockWindowOpener>,
    pub bridge: Option<Rc<MockBridge>>,
    pub host_endpoint: Rc<BusEndpoint>,
    pub timings: Timings,
    dispatch_frames: RefCell<HashMap<ChannelId, (Rc<BusEndpoint>, Rc<MessageBus>)>>,
    popup_endpoints: RefCell<Vec<Rc<BusEndpoint>>>,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            scheduler: Rc::new(ManualScheduler::new()),
            frame_host: Rc::new(MockFrameHost::new()),
            opener: Rc::new(MockWindowOpener::new()),
            bridge: None,
            host_endpoint: BusEndpoint::with_allowed_origin(ASSET_ORIGIN),
            timings: Timings::default(),
            dispatch_frames: RefCell::new(HashMap::new()),
            popup_endpoints: RefCell::new(Vec::new()),
        }
    }

    /// A harness whose page runs inside an app exposing a native bridge.
    pub fn with_bridge() -> Self {
        Self {
            bridge: Some(Rc::new(MockBridge::new())),
            ..Self::new()
        }
    }

    pub fn options(&self) -> FrameServiceOptions {
        FrameServiceOptions::new(TEST_NAME, DISPATCH_FRAME_URL, OPEN_FRAME_URL)
    }

    pub fn platform(&self) -> Platform {
        let opener: Rc<dyn WindowOpener> = self.opener.clone();
        let bridge = self
            .bridge
            .clone()
            .map(|bridge| bridge as Rc<dyn NativeBridge>);
        Platform {
            scheduler: self.scheduler.clone(),
            frame_host: self.frame_host.clone(),
            popups: PopupEnvironment::detect(opener, bridge),
            endpoint: self.host_endpoint.clone(),
            timings: self.timings,
        }
    }

    /// An uninitialized service built from [`TestHarness::options`].
    pub fn service(&self) -> FrameService {
        FrameService::from_options(self.options(), self.platform())
            .expect("test options are valid")
    }

    /// A service whose dispatch frame has loaded.
    pub fn ready_service(&self) -> FrameService {
        let service = self.service();
        service.initialize(|| {});
        self.load_dispatch_frame(&service);
        service
    }

    /// Load the service's dispatch frame page, which announces readiness.
    pub fn load_dispatch_frame(&self, service: &FrameService) -> DispatchOutcome {
        let frame_name = service.dispatch_frame_name();
        let dispatch_endpoint = BusEndpoint::new();

        let to_dispatch: Rc<dyn BusTransport> = LoopbackTransport::with_origins(
            &self.host_endpoint,
            &dispatch_endpoint,
            HOST_ORIGIN,
            ASSET_ORIGIN,
        );
        self.frame_host.register_route(&frame_name, to_dispatch);

        let parent: Rc<dyn BusTransport> = LoopbackTransport::with_origins(
            &dispatch_endpoint,
            &self.host_endpoint,
            ASSET_ORIGIN,
            HOST_ORIGIN,
        );
        let ctx = MockDispatchContext {
            frame_name,
            parent: Some(parent),
        };
        let (outcome, bus) = run_dispatch_frame(&ctx, dispatch_endpoint.clone());
        if let Some(bus) = bus {
            self.dispatch_frames
                .borrow_mut()
                .insert(service.channel().clone(), (dispatch_endpoint, bus));
        }
        outcome
    }

    /// The most recent popup of `service`, as its landing page sees it.
    ///
    /// The dispatch frame is reachable only if it was loaded.
    pub fn popup_context(&self, service: &FrameService, query: &str) -> Rc<MockPopupContext> {
        let popup_endpoint = BusEndpoint::new();
        let mut ctx = MockPopupContext::new(query, service.popup_window_name());

        if let Some((dispatch_endpoint, _)) = self.dispatch_frames.borrow().get(service.channel()) {
            let transport: Rc<dyn BusTransport> =
                LoopbackTransport::new(&popup_endpoint, dispatch_endpoint, ASSET_ORIGIN);
            ctx = ctx.with_dispatch(&service.dispatch_frame_name(), transport);
        }
        if let Some(window) = self.opener.window_named(&service.popup_window_name()) {
            ctx = ctx.with_window(window);
        }
        self.popup_endpoints.borrow_mut().push(popup_endpoint);
        Rc::new(ctx)
    }

    /// Run the redirect landing page inside the popup with `query`.
    pub fn run_redirect(
        &self,
        service: &FrameService,
        query: &str,
    ) -> (ScriptOutcome, Rc<MockPopupContext>) {
        let ctx = self.popup_context(service, query);
        let outcome = self.scripts(&ctx).run_redirect();
        (outcome, ctx)
    }

    /// Run the cancel landing page inside the popup.
    pub fn run_cancel(&self, service: &FrameService) -> (ScriptOutcome, Rc<MockPopupContext>) {
        let ctx = self.popup_context(service, "");
        let outcome = self.scripts(&ctx).run_cancel();
        (outcome, ctx)
    }

    /// Send `report` straight from the dispatch frame to the host.
    pub fn dispatch_report(&self, service: &FrameService, report: FrameReport) -> bool {
        let bus = self
            .dispatch_frames
            .borrow()
            .get(service.channel())
            .map(|(_, bus)| bus.clone());
        match bus {
            Some(bus) => bus.emit(events::DISPATCH_FRAME_REPORT, report.to_value()).is_ok(),
            None => false,
        }
    }

    fn scripts(&self, ctx: &Rc<MockPopupContext>) -> FrameScripts {
        let endpoint = self
            .popup_endpoints
            .borrow()
            .last()
            .cloned()
            .unwrap_or_else(BusEndpoint::new);
        FrameScripts::new(ctx.clone(), self.scheduler.clone(), endpoint, self.timings)
    }
}

/// Collects completion results delivered to `open` callbacks.
#[derive(Clone, Default)]
pub struct CompletionRecorder {
    results: Rc<RefCell<Vec<CompletionResult>>>,
}

impl CompletionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback for [`FrameService::open`] that records into this recorder.
    pub fn callback(&self) -> impl FnOnce(CompletionResult) + 'static {
        let results = self.results.clone();
        move |result| results.borrow_mut().push(result)
    }

    pub fn count(&self) -> usize {
        self.results.borrow().len()
    }

    pub fn results(&self) -> std::cell::Ref<'_, Vec<CompletionResult>> {
        self.results.borrow()
    }

    /// The only result recorded.
    ///
    /// # Panics
    /// Panics unless exactly one result was delivered.
    pub fn single(&self) -> CompletionResult {
        let results = self.results.borrow();
        assert_eq!(results.len(), 1, "expected exactly one completion, got {}", results.len());
        results[0].clone()
    }
}

//! Redirect, cancel and dispatch frame pages talking to a live host service.

use framekit_lib::bus::{BusEndpoint, BusTransport, LoopbackTransport};
use framekit_lib::dispatch::{run_dispatch_frame, DispatchOutcome};
use framekit_lib::scripts::{FrameScripts, ScriptOutcome};
use framekit_lib::test_utils::{
    assert_frame_closed, assert_payload, CompletionRecorder, MockDispatchContext,
    MockPopupContext, TestHarness, ASSET_ORIGIN,
};
use serde_json::json;
use std::rc::Rc;
use std::time::Duration;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn test_redirect_page_reports_query_and_closes_on_ack() {
    let harness = TestHarness::new();
    let service = harness.ready_service();
    let recorder = CompletionRecorder::new();
    service.open(recorder.callback());

    let (outcome, popup) = harness.run_redirect(&service, "?token=abc&state=pending#frag");

    assert_eq!(outcome, ScriptOutcome::Reported);
    assert_payload(
        &recorder.single(),
        &json!({ "state": "pending", "token": "abc" }),
    );
    // Acknowledged synchronously; the fallback timer must not close again.
    assert_eq!(popup.self_closes(), 1);
    harness.scheduler.advance(harness.timings.redirect_close_fallback);
    assert_eq!(popup.self_closes(), 1);
}

#[test]
fn test_redirect_page_without_params_reports_empty_object() {
    let harness = TestHarness::new();
    let service = harness.ready_service();
    let recorder = CompletionRecorder::new();
    service.open(recorder.callback());

    harness.run_redirect(&service, "");

    assert_payload(&recorder.single(), &json!({}));
}

#[test]
fn test_redirect_page_falls_back_to_timed_close() {
    let harness = TestHarness::new();
    let service = harness.ready_service();
    // Host stops listening, so the report is never acknowledged.
    service.teardown(|| {});

    let (outcome, popup) = harness.run_redirect(&service, "?token=abc");

    assert_eq!(outcome, ScriptOutcome::Reported);
    harness.scheduler.advance(ms(999));
    assert_eq!(popup.self_closes(), 0);
    harness.scheduler.advance(ms(1));
    assert_eq!(popup.self_closes(), 1);
}

#[test]
fn test_cancel_page_reports_frame_closed_then_closes() {
    let harness = TestHarness::new();
    let service = harness.ready_service();
    let recorder = CompletionRecorder::new();
    service.open(recorder.callback());

    let (outcome, popup) = harness.run_cancel(&service);

    assert_eq!(outcome, ScriptOutcome::Reported);
    assert_frame_closed(&recorder.single());
    assert_eq!(popup.self_closes(), 0);
    harness.scheduler.advance(harness.timings.cancel_close_delay);
    assert_eq!(popup.self_closes(), 1);
}

#[test]
fn test_unreachable_dispatch_frame_falls_back_to_close_poll() {
    let harness = TestHarness::new();
    let service = harness.ready_service();
    let recorder = CompletionRecorder::new();
    service.open(recorder.callback());

    let window = harness.opener.last_window().unwrap();
    let ctx = Rc::new(
        MockPopupContext::new("?token=lost", service.popup_window_name()).with_window(window),
    );
    let scripts = FrameScripts::new(
        ctx.clone(),
        harness.scheduler.clone(),
        BusEndpoint::new(),
        harness.timings,
    );

    assert_eq!(
        scripts.run_redirect(),
        ScriptOutcome::DispatchFrameUnreachable
    );
    assert_eq!(recorder.count(), 0);

    // The page closes itself on the fallback timer; the host's poll notices.
    harness.scheduler.advance(harness.timings.redirect_close_fallback);
    harness.scheduler.advance(harness.timings.poll_interval);
    assert_eq!(ctx.self_closes(), 1);
    assert_frame_closed(&recorder.single());
}

#[test]
fn test_popup_without_channel_in_window_name() {
    let harness = TestHarness::new();
    let ctx = Rc::new(MockPopupContext::new("?a=b", "checkout"));
    let scripts = FrameScripts::new(
        ctx.clone(),
        harness.scheduler.clone(),
        BusEndpoint::new(),
        harness.timings,
    );

    assert_eq!(scripts.run_cancel(), ScriptOutcome::UnknownChannel);
    harness.scheduler.advance(harness.timings.cancel_close_delay);
    assert_eq!(ctx.self_closes(), 1);
}

#[test]
fn test_dispatch_frame_requires_channel_and_parent() {
    let parent_endpoint = BusEndpoint::new();
    let endpoint = BusEndpoint::new();

    let parent: Rc<dyn BusTransport> =
        LoopbackTransport::new(&endpoint, &parent_endpoint, ASSET_ORIGIN);
    let unnamed = MockDispatchContext {
        frame_name: "some_frame".into(),
        parent: Some(parent),
    };
    let (outcome, bus) = run_dispatch_frame(&unnamed, endpoint.clone());
    assert_eq!(outcome, DispatchOutcome::UnknownChannel);
    assert!(bus.is_none());

    let orphan = MockDispatchContext {
        frame_name: "dispatch_0f1e2d3c".into(),
        parent: None,
    };
    let (outcome, bus) = run_dispatch_frame(&orphan, endpoint);
    assert_eq!(outcome, DispatchOutcome::Orphaned);
    assert!(bus.is_none());
}

#[test]
fn test_messages_from_foreign_origin_are_ignored() {
    let harness = TestHarness::new();
    let service = harness.ready_service();
    let recorder = CompletionRecorder::new();
    service.open(recorder.callback());

    let attacker = BusEndpoint::new();
    let bus = framekit_lib::MessageBus::new(service.channel().clone(), attacker.clone());
    bus.attach(LoopbackTransport::with_origins(
        &attacker,
        &harness.host_endpoint,
        "https://evil.test",
        "https://merchant.test",
    ));
    bus.emit(
        framekit_lib::bus::events::DISPATCH_FRAME_REPORT,
        json!({ "payload": { "token": "forged" } }),
    )
    .unwrap();

    assert_eq!(recorder.count(), 0);
    assert!(service.is_frame_open());
}

//! Test utilities for Framekit.
//!
//! Everything a frame flow touches in a browser is replaced by an
//! in-process stand-in:
//! - [`ManualScheduler`]: a virtual clock for timers and the close poll
//! - [`MockFrameHost`], [`MockWindowOpener`], [`MockBridge`]: the host page
//! - [`MockPopupContext`], [`MockDispatchContext`]: the other two contexts
//! - [`TestHarness`]: all of the above wired over loopback transports
//!
//! ## Usage
//!
//! ```rust,ignore
//! use framekit_lib::test_utils::{assert_frame_closed, CompletionRecorder, TestHarness};
//!
//! let harness = TestHarness::new();
//! let service = harness.ready_service();
//! let recorder = CompletionRecorder::new();
//!
//! service.open(recorder.callback());
//! harness.opener.last_window().unwrap().user_close();
//! harness.scheduler.advance(harness.timings.poll_interval);
//!
//! assert_frame_closed(&recorder.single());
//! ```

mod assertions;
mod clock;
mod harness;
mod mocks;

pub use assertions::{assert_frame_closed, assert_open_failed, assert_payload};

pub use clock::ManualScheduler;

pub use harness::{
    CompletionRecorder, TestHarness, ASSET_ORIGIN, DISPATCH_FRAME_URL, HOST_ORIGIN,
    OPEN_FRAME_URL, TEST_NAME,
};

pub use mocks::{
    MockBridge, MockDispatchContext, MockFrameHost, MockPopupContext, MockPopupWindow,
    MockWindowOpener,
};

//! Host-environment seams: timers and the document the dispatch frame
//! lives in.
//!
//! The browser bindings implement these over `setTimeout`/`setInterval`
//! and iframes; tests use the virtual clock and mock document from
//! `test_utils`.

use crate::bus::BusTransport;
use std::rc::Rc;
use std::time::Duration;

/// Handle to a scheduled timeout or interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

pub trait Scheduler {
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId;

    fn set_interval(&self, period: Duration, callback: Box<dyn FnMut()>) -> TimerId;

    /// Cancel a timer. Clearing an unknown or finished timer is a no-op,
    /// and an interval may clear itself from inside its own callback.
    fn clear(&self, id: TimerId);
}

/// Description of an embedded frame to write into the host document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameSpec {
    pub name: String,
    pub src: String,
}

/// Handle to a frame node appended by a [`FrameHost`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameNodeId(pub u64);

/// The host document.
pub trait FrameHost {
    /// Append an invisible embedded frame.
    fn append_frame(&self, spec: &FrameSpec) -> FrameNodeId;

    fn remove_frame(&self, node: FrameNodeId);

    /// Resolve a named frame to a transport posting into it, if reachable.
    fn locate_frame(&self, name: &str) -> Option<Rc<dyn BusTransport>>;
}

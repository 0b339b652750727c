//! In-process transport between two endpoints.

use super::{BusEndpoint, BusTransport};
use crate::errors::BusError;
use std::rc::{Rc, Weak};

/// Delivers messages synchronously from one [`BusEndpoint`] to another.
///
/// Each delivery hands the receiver a reverse transport so that replies find
/// their way back. Endpoints are held weakly; posting to a dropped endpoint
/// is a transport error.
pub struct LoopbackTransport {
    from: Weak<BusEndpoint>,
    to: Weak<BusEndpoint>,
    sender_origin: String,
    receiver_origin: String,
}

impl LoopbackTransport {
    /// Link `from` to `to`, both contexts sharing `origin`.
    pub fn new(from: &Rc<BusEndpoint>, to: &Rc<BusEndpoint>, origin: &str) -> Rc<Self> {
        Self::with_origins(from, to, origin, origin)
    }

    pub fn with_origins(
        from: &Rc<BusEndpoint>,
        to: &Rc<BusEndpoint>,
        sender_origin: &str,
        receiver_origin: &str,
    ) -> Rc<Self> {
        Rc::new(Self {
            from: Rc::downgrade(from),
            to: Rc::downgrade(to),
            sender_origin: sender_origin.to_string(),
            receiver_origin: receiver_origin.to_string(),
        })
    }

    fn reverse(&self) -> Rc<Self> {
        Rc::new(Self {
            from: self.to.clone(),
            to: self.from.clone(),
            sender_origin: self.receiver_origin.clone(),
            receiver_origin: self.sender_origin.clone(),
        })
    }
}

impl BusTransport for LoopbackTransport {
    fn post(&self, message: &str) -> Result<(), BusError> {
        let target = self
            .to
            .upgrade()
            .ok_or_else(|| BusError::Transport("target context is gone".into()))?;
        let source: Rc<dyn BusTransport> = self.reverse();
        target.receive(message, &self.sender_origin, Some(source))?;
        Ok(())
    }
}

//! Wire format for bus messages.

use crate::channel::ChannelId;
use crate::errors::BusError;
use serde::{Deserialize, Serialize};

/// Marker prefix distinguishing bus traffic from other `postMessage` users.
pub const ENVELOPE_PREFIX: &str = "/*framekit*/";

/// One bus message as it travels between browsing contexts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub channel: ChannelId,
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Event name the receiver should answer on, if a reply is expected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

impl Envelope {
    pub fn new(channel: ChannelId, event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            channel,
            event: event.into(),
            payload,
            reply: None,
        }
    }

    pub fn encode(&self) -> Result<String, BusError> {
        Ok(format!("{}{}", ENVELOPE_PREFIX, serde_json::to_string(self)?))
    }

    /// Decode a raw message.
    ///
    /// Returns `Ok(None)` for messages that are not bus traffic at all.
    pub fn decode(raw: &str) -> Result<Option<Self>, BusError> {
        match raw.strip_prefix(ENVELOPE_PREFIX) {
            Some(body) => Ok(Some(serde_json::from_str(body)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_carries_prefix() {
        let envelope = Envelope::new(
            ChannelId::parse("c1").unwrap(),
            "ping",
            json!({ "n": 1 }),
        );
        let raw = envelope.encode().unwrap();
        assert!(raw.starts_with(ENVELOPE_PREFIX));
        assert!(!raw.contains("reply"));
        assert_eq!(Envelope::decode(&raw).unwrap(), Some(envelope));
    }

    #[test]
    fn test_foreign_messages_ignored() {
        assert_eq!(Envelope::decode("{\"event\":\"x\"}").unwrap(), None);
        assert_eq!(Envelope::decode("hello").unwrap(), None);
    }

    #[test]
    fn test_malformed_bus_message_is_error() {
        assert!(Envelope::decode("/*framekit*/{not json").is_err());
    }
}

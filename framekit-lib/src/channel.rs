//! Channel ids and the window/frame names derived from them.
//!
//! The popup learns its channel from its own window name
//! (`<name>_<channel>`), and finds the dispatch frame by the well-known
//! frame name `dispatch_<channel>`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of the dispatch frame's name.
pub const DISPATCH_FRAME_PREFIX: &str = "dispatch_";

/// Opaque id namespacing bus traffic for one orchestration instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Generate a fresh, unique channel id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing id, e.g. one parsed from a window name.
    ///
    /// Returns `None` for ids containing characters that could not be
    /// embedded in a window name unambiguously.
    pub fn parse(id: &str) -> Option<Self> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        valid.then(|| Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the dispatch frame for this channel.
    pub fn dispatch_frame_name(&self) -> String {
        format!("{}{}", DISPATCH_FRAME_PREFIX, self.0)
    }

    /// Window name for a popup opened by a service configured with `name`.
    pub fn popup_window_name(&self, name: &str) -> String {
        format!("{}_{}", name, self.0)
    }

    /// Recover the channel from a popup window name.
    pub fn from_window_name(window_name: &str) -> Option<Self> {
        let (_, id) = window_name.rsplit_once('_')?;
        Self::parse(id)
    }

    /// Recover the channel from a dispatch frame name.
    pub fn from_dispatch_frame_name(frame_name: &str) -> Option<Self> {
        frame_name
            .strip_prefix(DISPATCH_FRAME_PREFIX)
            .and_then(Self::parse)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

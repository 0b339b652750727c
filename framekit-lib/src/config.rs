//! Frame service configuration.
//!
//! [`FrameServiceOptions`] is the raw, caller-supplied shape (deserializable
//! from a JS object). [`FrameConfiguration`] is the validated, immutable
//! form the service runs with. Validation failures are caller bugs and are
//! returned as [`ConfigError`] before any frame or popup exists.

use crate::errors::ConfigError;
use serde::Deserialize;
use std::time::Duration;

/// Base chrome for standard popups.
pub const POPUP_BASE_OPTIONS: &str = "resizable,scrollbars";
pub const DEFAULT_POPUP_HEIGHT: u32 = 535;
pub const DEFAULT_POPUP_WIDTH: u32 = 450;

/// Raw configuration as provided by a payment-method flow.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameServiceOptions {
    pub name: Option<String>,
    pub dispatch_frame_url: Option<String>,
    pub open_frame_url: Option<String>,
    pub height: Option<i64>,
    pub width: Option<i64>,
    pub top: Option<i32>,
    pub left: Option<i32>,
}

impl FrameServiceOptions {
    pub fn new(
        name: impl Into<String>,
        dispatch_frame_url: impl Into<String>,
        open_frame_url: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            dispatch_frame_url: Some(dispatch_frame_url.into()),
            open_frame_url: Some(open_frame_url.into()),
            ..Self::default()
        }
    }
}

/// Size and placement of a standard popup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PopupOptions {
    pub height: u32,
    pub width: u32,
    /// Explicit top offset; centered against the host window when `None`.
    pub top: Option<i32>,
    /// Explicit left offset; centered against the host window when `None`.
    pub left: Option<i32>,
}

impl Default for PopupOptions {
    fn default() -> Self {
        Self {
            height: DEFAULT_POPUP_HEIGHT,
            width: DEFAULT_POPUP_WIDTH,
            top: None,
            left: None,
        }
    }
}

/// Validated frame configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameConfiguration {
    name: String,
    dispatch_frame_url: String,
    open_frame_url: String,
    popup: PopupOptions,
}

impl FrameConfiguration {
    /// Validate the three required fields with default popup options.
    pub fn new(
        name: impl Into<String>,
        dispatch_frame_url: impl Into<String>,
        open_frame_url: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Self::try_from(FrameServiceOptions::new(
            name,
            dispatch_frame_url,
            open_frame_url,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dispatch_frame_url(&self) -> &str {
        &self.dispatch_frame_url
    }

    pub fn open_frame_url(&self) -> &str {
        &self.open_frame_url
    }

    pub fn popup(&self) -> &PopupOptions {
        &self.popup
    }
}

impl TryFrom<FrameServiceOptions> for FrameConfiguration {
    type Error = ConfigError;

    fn try_from(options: FrameServiceOptions) -> Result<Self, Self::Error> {
        let name = required("name", options.name)?;
        if !is_valid_name(&name) {
            return Err(ConfigError::InvalidName { name });
        }
        let dispatch_frame_url = validate_url(
            "dispatchFrameUrl",
            required("dispatchFrameUrl", options.dispatch_frame_url)?,
        )?;
        let open_frame_url = validate_url(
            "openFrameUrl",
            required("openFrameUrl", options.open_frame_url)?,
        )?;

        let mut popup = PopupOptions {
            top: options.top,
            left: options.left,
            ..PopupOptions::default()
        };
        if let Some(height) = options.height {
            popup.height = dimension("height", height)?;
        }
        if let Some(width) = options.width {
            popup.width = dimension("width", width)?;
        }

        Ok(Self {
            name,
            dispatch_frame_url,
            open_frame_url,
            popup,
        })
    }
}

/// Names become part of a window name, so only `[A-Za-z0-9_]` is allowed.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing { field }),
    }
}

/// Frame URLs must be absolute `http`/`https` URLs so they carry a tuple
/// origin the bus can check messages against.
fn validate_url(field: &'static str, value: String) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(&value).map_err(|e| ConfigError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") || !parsed.origin().is_tuple() {
        return Err(ConfigError::InvalidUrl {
            field,
            reason: format!("unsupported scheme `{}`", parsed.scheme()),
        });
    }
    Ok(value)
}

fn dimension(field: &'static str, value: i64) -> Result<u32, ConfigError> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or(ConfigError::InvalidDimension { field, value })
}

/// Timer settings for the frame lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timings {
    /// How often the host checks whether the popup was closed manually.
    pub poll_interval: Duration,
    /// Upper bound before the redirect landing page closes itself.
    pub redirect_close_fallback: Duration,
    /// Delay before the cancel landing page closes itself.
    pub cancel_close_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            redirect_close_fallback: Duration::from_millis(1000),
            cancel_close_delay: Duration::from_millis(100),
        }
    }
}

impl Timings {
    /// Zero delays for the landing pages; polling keeps a 1 ms period.
    pub fn immediate() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            redirect_close_fallback: Duration::ZERO,
            cancel_close_delay: Duration::ZERO,
        }
    }
}

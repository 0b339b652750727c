//! Error types for frame service operations.
//!
//! Three families live here:
//!
//! - [`ConfigError`]: a caller bug in the frame configuration. Returned from
//!   construction, never delivered through a completion callback.
//! - [`SdkError`]: the typed, serializable error that crosses the bus and is
//!   handed to completion callbacks.
//! - [`BusError`]: local messaging failures (serialization, missing transport).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of an [`SdkError`], mirrored from the SDK's error model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    /// Caused by the customer (e.g. invalid input).
    Customer,
    /// Caused by the merchant integration.
    Merchant,
    /// Network or gateway failure.
    Network,
    /// SDK-internal condition.
    Internal,
    /// Unclassified.
    Unknown,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Merchant => "MERCHANT",
            Self::Network => "NETWORK",
            Self::Internal => "INTERNAL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error codes produced by the frame service itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The popup closed before any result was reported.
    FrameClosed,
    /// The popup could not be opened.
    FrameOpenFailed,
    /// `open` was called while a flow was already in progress.
    FrameAlreadyOpen,
}

impl ErrorCode {
    pub const FRAME_CLOSED: &'static str = "FRAME_SERVICE_FRAME_CLOSED";
    pub const FRAME_OPEN_FAILED: &'static str = "FRAME_SERVICE_FRAME_OPEN_FAILED";
    pub const FRAME_ALREADY_OPEN: &'static str = "FRAME_SERVICE_FRAME_ALREADY_OPEN";

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FrameClosed => Self::FRAME_CLOSED,
            Self::FrameOpenFailed => Self::FRAME_OPEN_FAILED,
            Self::FrameAlreadyOpen => Self::FRAME_ALREADY_OPEN,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            Self::FrameClosed | Self::FrameOpenFailed => ErrorType::Internal,
            Self::FrameAlreadyOpen => ErrorType::Merchant,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::FrameClosed => "Frame closed before tokenization could occur.",
            Self::FrameOpenFailed => "Frame failed to open.",
            Self::FrameAlreadyOpen => "A frame is already open for this flow.",
        }
    }

    /// Look up a frame service code by its wire string.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            Self::FRAME_CLOSED => Some(Self::FrameClosed),
            Self::FRAME_OPEN_FAILED => Some(Self::FrameOpenFailed),
            Self::FRAME_ALREADY_OPEN => Some(Self::FrameAlreadyOpen),
            _ => None,
        }
    }
}

/// Typed SDK error carried through completion callbacks and across the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdkError {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl SdkError {
    /// Build the canonical error for a frame service code.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            error_type: code.error_type(),
            code: code.as_str().to_string(),
            message: code.message().to_string(),
            details: None,
        }
    }

    pub fn frame_closed() -> Self {
        Self::new(ErrorCode::FrameClosed)
    }

    pub fn frame_open_failed() -> Self {
        Self::new(ErrorCode::FrameOpenFailed)
    }

    pub fn frame_already_open() -> Self {
        Self::new(ErrorCode::FrameAlreadyOpen)
    }

    /// Attach structured details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// The frame service code, if this error was produced by the frame service.
    pub fn frame_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(&self.code)
    }

    pub fn is_frame_closed(&self) -> bool {
        self.frame_code() == Some(ErrorCode::FrameClosed)
    }
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.error_type, self.message)
    }
}

impl std::error::Error for SdkError {}

/// Failure half of a completion result.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowError {
    /// The popup closed without reporting (user cancellation).
    Closed(SdkError),
    /// The popup could not be opened.
    OpenFailed(SdkError),
    /// Another flow is already open on this service.
    AlreadyOpen(SdkError),
    /// Error reported by the third party, passed through unchanged.
    Reported(serde_json::Value),
}

impl FlowError {
    pub fn closed() -> Self {
        Self::Closed(SdkError::frame_closed())
    }

    /// Classify an error value received over the bus.
    ///
    /// Values that decode as a frame service `SdkError` keep their local
    /// meaning; everything else is a third-party error.
    pub fn from_reported(value: serde_json::Value) -> Self {
        match serde_json::from_value::<SdkError>(value.clone()) {
            Ok(err) => match err.frame_code() {
                Some(ErrorCode::FrameClosed) => Self::Closed(err),
                Some(ErrorCode::FrameOpenFailed) => Self::OpenFailed(err),
                Some(ErrorCode::FrameAlreadyOpen) => Self::AlreadyOpen(err),
                None => Self::Reported(value),
            },
            Err(_) => Self::Reported(value),
        }
    }

    /// True when the flow ended because the user closed or canceled it.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Closed(_))
    }

    /// The local SDK error, if this was not a passthrough.
    pub fn sdk_error(&self) -> Option<&SdkError> {
        match self {
            Self::Closed(e) | Self::OpenFailed(e) | Self::AlreadyOpen(e) => Some(e),
            Self::Reported(_) => None,
        }
    }

    /// Serialize for handing to a callback or sending over the bus.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::Reported(value) => value.clone(),
            other => other
                .sdk_error()
                .and_then(|e| serde_json::to_value(e).ok())
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed(e) | Self::OpenFailed(e) | Self::AlreadyOpen(e) => write!(f, "{}", e),
            Self::Reported(value) => write!(f, "reported error: {}", value),
        }
    }
}

impl std::error::Error for FlowError {}

/// Invalid frame configuration. Always a programmer error.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} is required")]
    Missing { field: &'static str },
    #[error("name '{name}' must contain only alphanumeric and _ characters")]
    InvalidName { name: String },
    #[error("{field} is not a valid absolute URL: {reason}")]
    InvalidUrl { field: &'static str, reason: String },
    #[error("{field} must be positive, got {value}")]
    InvalidDimension { field: &'static str, value: i64 },
}

/// Local messaging failure.
#[derive(thiserror::Error, Debug)]
pub enum BusError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("bus has no transport attached")]
    Detached,
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<serde_json::Error> for BusError {
    fn from(e: serde_json::Error) -> Self {
        BusError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_closed_shape() {
        let err = SdkError::frame_closed();
        assert_eq!(err.error_type, ErrorType::Internal);
        assert_eq!(err.code, "FRAME_SERVICE_FRAME_CLOSED");
        assert_eq!(err.message, "Frame closed before tokenization could occur.");

        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["type"], "INTERNAL");
        assert!(value.get("details").is_none());
    }

    #[test]
    fn test_reported_classification() {
        let closed = serde_json::to_value(SdkError::frame_closed()).unwrap();
        assert!(FlowError::from_reported(closed).is_cancellation());

        let third_party = json!({ "code": "PAYPAL_DECLINED", "message": "nope" });
        match FlowError::from_reported(third_party.clone()) {
            FlowError::Reported(value) => assert_eq!(value, third_party),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_foreign_sdk_error_passes_through() {
        let foreign = json!({
            "type": "CUSTOMER",
            "code": "VENMO_CANCELED",
            "message": "Customer canceled"
        });
        assert_eq!(
            FlowError::from_reported(foreign.clone()),
            FlowError::Reported(foreign)
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidName {
            name: "bad-name".into(),
        };
        assert!(err.to_string().contains("alphanumeric"));
        assert_eq!(
            ConfigError::Missing { field: "openFrameUrl" }.to_string(),
            "openFrameUrl is required"
        );
    }
}

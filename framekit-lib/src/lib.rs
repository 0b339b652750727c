//! Framekit library.
//!
//! Cross-context messaging and lifecycle protocol for payment flows that
//! send the customer to a third-party authorization page in a popup (or a
//! native app's pseudo-popup) and bring exactly one result back to the
//! host page.
//!
//! # Pieces
//!
//! - [`bus`]: channel-scoped publish/subscribe over cross-context messages
//! - [`popup`]: the standard and native-bridge popup strategies
//! - [`dispatch`]: the invisible frame that relays popup reports to the host
//! - [`service`]: the host-page orchestrator ([`FrameService`])
//! - [`scripts`]: the redirect and cancel landing pages run inside the popup
//!
//! Browser facilities are reached through the traits in [`platform`],
//! [`popup`], [`dispatch`] and [`scripts`]; the `framekit-web` crate
//! implements them over `web-sys`.
//!
//! # Example
//!
//! ```ignore
//! use framekit_lib::{create, FrameServiceOptions};
//!
//! let options = FrameServiceOptions::new(
//!     "checkout",
//!     "https://assets.example.com/dispatch.html",
//!     "https://assets.example.com/landing.html",
//! );
//! let service = create(options, platform, || println!("ready"))?;
//!
//! service.open(|result| match result {
//!     Ok(payload) => println!("authorized: {payload}"),
//!     Err(err) if err.is_cancellation() => println!("canceled"),
//!     Err(err) => println!("failed: {err}"),
//! });
//! ```

pub mod bus;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod once;
pub mod platform;
pub mod popup;
pub mod query;
pub mod report;
pub mod scripts;
pub mod service;

/// Test utilities: virtual clock, mock host document, mock popups.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use bus::{BusEndpoint, BusTransport, MessageBus};
pub use channel::ChannelId;
pub use config::{FrameConfiguration, FrameServiceOptions, PopupOptions, Timings};
pub use errors::{BusError, ConfigError, ErrorCode, ErrorType, FlowError, SdkError};
pub use report::FrameReport;
pub use service::{create, FrameService, OpenOptions, Platform, ServiceState};

/// Result handed to an `open` callback: the payload, or why the flow failed.
pub type CompletionResult = std::result::Result<serde_json::Value, FlowError>;

/// The single outstanding callback registered by `open`.
pub type CompletionCallback = Box<dyn FnOnce(CompletionResult)>;

//! Assertion helpers for completion results.

use crate::errors::{ErrorCode, FlowError};
use crate::CompletionResult;
use serde_json::Value;

/// Assert that a flow ended with the frame-closed (cancellation) error.
///
/// # Panics
/// Panics on success or on any other error.
pub fn assert_frame_closed(result: &CompletionResult) {
    match result {
        Err(FlowError::Closed(err)) => {
            assert_eq!(err.code, ErrorCode::FRAME_CLOSED);
        }
        other => panic!("expected frame closed, got {:?}", other),
    }
}

/// Assert that a flow failed to open.
///
/// # Panics
/// Panics unless the result is an open failure.
pub fn assert_open_failed(result: &CompletionResult) {
    match result {
        Err(FlowError::OpenFailed(err)) => {
            assert_eq!(err.code, ErrorCode::FRAME_OPEN_FAILED);
        }
        other => panic!("expected open failure, got {:?}", other),
    }
}

/// Assert that a flow succeeded with exactly `expected`.
///
/// # Panics
/// Panics on error or on a different payload.
pub fn assert_payload(result: &CompletionResult, expected: &Value) {
    match result {
        Ok(payload) => assert_eq!(payload, expected),
        Err(err) => panic!("expected payload {}, got error {}", expected, err),
    }
}

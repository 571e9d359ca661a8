//! Scrubbing error messages before they leave the process.

use std::any::Any;

use switchyard_types::{ErrorCode, RequestId, RpcError};
use tracing::error;

/// What clients see in place of an internal error's message.
pub const GENERIC_INTERNAL_MESSAGE: &str = "internal server error";

/// Replace the message of `internal` errors with a generic one, logging the
/// original. Every other code is client-facing already and passes through.
#[must_use]
pub fn sanitize_for_client(err: RpcError, procedure: &str, request_id: &RequestId) -> RpcError {
    if err.code != ErrorCode::Internal {
        return err;
    }
    error!(
        procedure,
        request_id = %request_id,
        "internal error: {}",
        err.message
    );
    RpcError::internal(GENERIC_INTERNAL_MESSAGE)
}

/// Best-effort text of a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

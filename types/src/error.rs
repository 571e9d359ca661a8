//! Structured RPC errors.
//!
//! Every failure that crosses the wire is an [`RpcError`]: a stable [`ErrorCode`]
//! plus a human-readable message. Codes map one-to-one onto HTTP statuses so the
//! transport never has to guess.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub type RpcResult<T> = Result<T, RpcError>;

/// Stable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Request body or `input` parameter is not valid JSON.
    ParseError,
    /// Input failed the procedure's validator.
    BadInput,
    /// Caller identity could not be established.
    Unauthenticated,
    /// No procedure registered under the requested name.
    NotFound,
    /// Procedure exists but cannot be reached with this HTTP method.
    MethodNotSupported,
    /// Handler-level failure or unexpected panic.
    Internal,
}

impl ErrorCode {
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            ErrorCode::ParseError | ErrorCode::BadInput => 400,
            ErrorCode::Unauthenticated => 401,
            ErrorCode::NotFound => 404,
            ErrorCode::MethodNotSupported => 405,
            ErrorCode::Internal => 500,
        }
    }

    /// Best-effort inverse of [`http_status`](Self::http_status), for error
    /// bodies that are not JSON.
    #[must_use]
    pub const fn from_http_status(status: u16) -> Self {
        match status {
            400 => ErrorCode::BadInput,
            401 | 403 => ErrorCode::Unauthenticated,
            404 => ErrorCode::NotFound,
            405 => ErrorCode::MethodNotSupported,
            _ => ErrorCode::Internal,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "parse_error",
            ErrorCode::BadInput => "bad_input",
            ErrorCode::Unauthenticated => "unauthenticated",
            ErrorCode::NotFound => "not_found",
            ErrorCode::MethodNotSupported => "method_not_supported",
            ErrorCode::Internal => "internal",
        }
    }
}

/// Error returned by procedures, the router, and the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", code.as_str())]
pub struct RpcError {
    pub code: ErrorCode,
    pub message: String,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, message)
    }

    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadInput, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthenticated, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn method_not_supported(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MethodNotSupported, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code,
            "message": self.message,
            "http_status": self.http_status(),
        })
    }
}

impl Serialize for RpcError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

#[derive(Deserialize)]
struct RawRpcError {
    code: ErrorCode,
    message: String,
}

// `http_status` is derived from `code`, so it is ignored on the way in.
impl<'de> Deserialize<'de> for RpcError {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawRpcError::deserialize(deserializer)?;
        Ok(Self::new(raw.code, raw.message))
    }
}

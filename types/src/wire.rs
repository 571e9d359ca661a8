//! JSON envelopes exchanged between the HTTP link and the transport adapter.
//!
//! ```text
//! request  : {"input": <json>}
//! success  : {"result": {"data": <json>}}
//! failure  : {"error": {"code": "...", "message": "...", "http_status": 404}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

/// POST body. A missing `input` field is the same as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default)]
    pub input: Value,
}

impl RequestEnvelope {
    #[must_use]
    pub fn new(input: Value) -> Self {
        Self { input }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessBody {
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: RpcError,
}

/// One procedure's outcome on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    Success { result: SuccessBody },
    Failure(ErrorBody),
}

impl ResponseEnvelope {
    #[must_use]
    pub fn from_result(result: Result<Value, RpcError>) -> Self {
        match result {
            Ok(data) => ResponseEnvelope::Success {
                result: SuccessBody { data },
            },
            Err(error) => ResponseEnvelope::Failure(ErrorBody { error }),
        }
    }

    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            ResponseEnvelope::Success { .. } => 200,
            ResponseEnvelope::Failure(body) => body.error.http_status(),
        }
    }

    pub fn into_result(self) -> Result<Value, RpcError> {
        match self {
            ResponseEnvelope::Success { result } => Ok(result.data),
            ResponseEnvelope::Failure(body) => Err(body.error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_envelope_defaults_input_to_null() {
        let env: RequestEnvelope = serde_json::from_str("{}").unwrap();
        assert_eq!(env.input, Value::Null);
        let env: RequestEnvelope = serde_json::from_str(r#"{"input":{"text":"x"}}"#).unwrap();
        assert_eq!(env.input, json!({"text": "x"}));
    }

    #[test]
    fn success_shape() {
        let env = ResponseEnvelope::from_result(Ok(json!({})));
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"result": {"data": {}}})
        );
        assert_eq!(env.http_status(), 200);
    }

    #[test]
    fn failure_shape_and_parse_back() {
        let env = ResponseEnvelope::from_result(Err(RpcError::not_found("missing")));
        let wire = serde_json::to_value(&env).unwrap();
        assert_eq!(wire["error"]["code"], "not_found");
        assert_eq!(wire["error"]["http_status"], 404);

        let parsed: ResponseEnvelope = serde_json::from_value(wire).unwrap();
        assert_eq!(parsed.into_result(), Err(RpcError::not_found("missing")));
    }

    #[test]
    fn data_null_is_still_success() {
        let parsed: ResponseEnvelope =
            serde_json::from_value(json!({"result": {"data": null}})).unwrap();
        assert_eq!(parsed.into_result(), Ok(Value::Null));
    }
}

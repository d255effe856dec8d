// JSON-RPC 2.0 envelope types for the daemon socket protocol.
//
// Requests and responses travel newline-delimited over a Unix socket,
// one JSON object per line.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

// Standard JSON-RPC error codes.
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Request ID: integer, string, or null.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
    Null,
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: RequestId,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Request {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// A JSON-RPC 2.0 response: exactly one of `result` / `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: RequestId,
}

impl Response {
    pub fn success(id: RequestId, result: Value) -> Self {
        Response {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: RequestId, error: RpcError) -> Self {
        Response {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// A JSON-RPC 2.0 error object. `data` carries structured payloads
/// such as unresolved-item reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        RpcError {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        RpcError {
            code,
            message: message.into(),
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_ids_accept_numbers_strings_and_null() {
        let numeric: Request =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"rpc.ping","id":7}"#).unwrap();
        assert_eq!(numeric.id, RequestId::Number(7));

        let string: Request =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"rpc.ping","id":"a"}"#).unwrap();
        assert_eq!(string.id, RequestId::String("a".to_string()));

        let null: Request =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"rpc.ping","id":null}"#).unwrap();
        assert_eq!(null.id, RequestId::Null);
    }

    #[test]
    fn success_responses_omit_the_error_field() {
        let encoded =
            serde_json::to_string(&Response::success(RequestId::Number(1), json!({"ok": true})))
                .unwrap();
        assert!(encoded.contains("\"result\""));
        assert!(!encoded.contains("\"error\""));
    }

    #[test]
    fn error_responses_omit_the_result_field() {
        let encoded = serde_json::to_string(&Response::error(
            RequestId::Null,
            RpcError::new(METHOD_NOT_FOUND, "unknown method"),
        ))
        .unwrap();
        assert!(encoded.contains("\"error\""));
        assert!(!encoded.contains("\"result\""));
        assert!(!encoded.contains("\"data\""));
    }
}

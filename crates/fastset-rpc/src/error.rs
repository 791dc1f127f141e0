//! Error codes and the error object validators and proxies report.

use jsonrpsee::types::{ErrorObject, ErrorObjectOwned};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Standard JSON-RPC codes plus the FastSet application range.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub const ACCOUNT_NOT_FOUND: i32 = -32001;
    pub const INVALID_SIGNATURE: i32 = -32002;
    pub const INVALID_NONCE: i32 = -32003;
    pub const INSUFFICIENT_BALANCE: i32 = -32004;
    pub const INVALID_TRANSACTION: i32 = -32005;
    pub const CONFLICTING_TRANSACTION: i32 = -32006;
    pub const INVALID_CERTIFICATE: i32 = -32007;
    pub const UNAVAILABLE: i32 = -32010;
}

/// Server-reported error, surfaced to callers verbatim.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("rpc error {code}: {message}")]
pub struct RpcErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("method not found: {method}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == codes::ACCOUNT_NOT_FOUND
    }

    pub fn is_invalid_nonce(&self) -> bool {
        self.code == codes::INVALID_NONCE
    }
}

impl From<ErrorObjectOwned> for RpcErrorObject {
    fn from(err: ErrorObjectOwned) -> Self {
        Self {
            code: err.code(),
            message: err.message().to_string(),
            data: err
                .data()
                .and_then(|raw| serde_json::from_str(raw.get()).ok()),
        }
    }
}

impl From<RpcErrorObject> for ErrorObjectOwned {
    fn from(err: RpcErrorObject) -> Self {
        ErrorObject::owned(err.code, err.message, err.data)
    }
}

/// Serializes a params struct into a JSON object.
pub fn to_params<T: Serialize>(params: &T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(params)
}

/// Parses a params object, mapping failures to `INVALID_PARAMS`.
pub fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcErrorObject> {
    serde_json::from_value(params).map_err(|err| RpcErrorObject::invalid_params(err.to_string()))
}

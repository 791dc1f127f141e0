use std::sync::{Arc, Mutex};

use fastset_rpc::{codes, RpcErrorObject};
use serde::Serialize;
use serde_json::Value;

/// Something that answers JSON-RPC method calls, the way a validator or proxy endpoint does.
pub trait RpcHandler: Send {
    fn handle(&mut self, method: &str, params: Value) -> Result<Value, RpcErrorObject>;
}

pub type SharedHandler = Arc<Mutex<dyn RpcHandler>>;

pub(crate) fn reject(code: i32, message: impl Into<String>) -> RpcErrorObject {
    RpcErrorObject::new(code, message)
}

pub(crate) fn to_result<T: Serialize>(value: &T) -> Result<Value, RpcErrorObject> {
    serde_json::to_value(value).map_err(|err| reject(codes::INTERNAL_ERROR, err.to_string()))
}

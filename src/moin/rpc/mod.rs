//! # RPC Layer
//!
//! Everything needed to call procedures on a remote wiki, and nothing about
//! what those procedures mean (that lives in [`crate::client`]).
//!
//! - [`Value`]: the XML-RPC data model
//! - [`codec`]: `methodCall` / `methodResponse` encoding
//! - [`Transport`]: the seam between the client and the network
//! - [`http::HttpTransport`]: production transport over `reqwest`
//! - `memory::ScriptedTransport`: records calls and replays canned responses
//!   (available under `cfg(test)` or the `test_utils` feature)
//!
//! The server side of the protocol (`codec::decode_call`,
//! `codec::encode_response`, `MethodCall::from_value`, `multicall_response`)
//! exists only for stub servers in tests and sits behind the same gate.
//!
//! A remote fault is not a transport problem in the protocol sense, but callers
//! treat it the same way: it surfaces as [`MoinError::Fault`], whose kind is
//! `TransportFailure`.

use crate::error::{MoinError, Result};
use std::collections::BTreeMap;

pub mod codec;
pub mod http;
#[cfg(any(test, feature = "test_utils"))]
pub mod memory;
pub mod value;

pub use value::Value;

/// A `<fault>` returned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: i64,
    pub message: String,
}

impl Fault {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Read a `{faultCode, faultString}` struct.
    pub fn from_value(value: &Value) -> Option<Self> {
        let code = value.get("faultCode")?.as_i64()?;
        let message = value
            .get("faultString")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some(Self { code, message })
    }

    pub fn to_value(&self) -> Value {
        let mut members = BTreeMap::new();
        members.insert("faultCode".to_string(), Value::Int(self.code));
        members.insert(
            "faultString".to_string(),
            Value::String(self.message.clone()),
        );
        Value::Struct(members)
    }
}

impl From<Fault> for MoinError {
    fn from(fault: Fault) -> Self {
        MoinError::Fault {
            code: fault.code,
            message: fault.message,
        }
    }
}

/// One entry of a `system.multicall` batch.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub params: Vec<Value>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    fn to_value(&self) -> Value {
        let mut members = BTreeMap::new();
        members.insert("methodName".to_string(), Value::from(self.method.as_str()));
        members.insert("params".to_string(), Value::Array(self.params.clone()));
        Value::Struct(members)
    }

    /// Parse an entry of the `system.multicall` parameter array.
    #[cfg(any(test, feature = "test_utils"))]
    pub fn from_value(value: &Value) -> Option<Self> {
        let method = value.get("methodName")?.as_str()?.to_string();
        let params = value
            .get("params")
            .and_then(Value::as_array)
            .map(<[Value]>::to_vec)
            .unwrap_or_default();
        Some(Self { method, params })
    }
}

/// Build the value a server returns for `system.multicall`: each success is
/// wrapped in a one-element array, each fault is a fault struct.
#[cfg(any(test, feature = "test_utils"))]
pub fn multicall_response(results: &[std::result::Result<Value, Fault>]) -> Value {
    Value::Array(
        results
            .iter()
            .map(|result| match result {
                Ok(value) => Value::Array(vec![value.clone()]),
                Err(fault) => fault.to_value(),
            })
            .collect(),
    )
}

/// Something that can execute a remote procedure call.
///
/// Implementations only move values; interpreting results is the caller's job.
pub trait Transport {
    /// Call `method` and return its result. A server fault is returned as
    /// [`MoinError::Fault`].
    fn call(&self, method: &str, params: &[Value]) -> Result<Value>;

    /// Run `calls` in one `system.multicall` round trip. The outer error covers
    /// the round trip itself; each entry reports its own success or fault, in
    /// the order the calls were given.
    fn multicall(&self, calls: &[MethodCall]) -> Result<Vec<std::result::Result<Value, Fault>>> {
        let batch = Value::Array(calls.iter().map(MethodCall::to_value).collect());
        let response = self.call("system.multicall", &[batch])?;

        let unexpected = || MoinError::UnexpectedResponse {
            method: "system.multicall".to_string(),
            expected: "one result per call",
        };

        let items = response.into_array().ok_or_else(unexpected)?;
        if items.len() != calls.len() {
            return Err(unexpected());
        }

        items
            .into_iter()
            .map(|item| match item {
                Value::Array(mut single) if single.len() == 1 => Ok(Ok(single.remove(0))),
                other => Fault::from_value(&other).map(Err).ok_or_else(unexpected),
            })
            .collect()
    }
}

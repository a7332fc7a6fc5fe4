//! In-memory transport for tests: no network, no server.
//!
//! Responses are queued up front and handed out in order, one per `call`
//! (a `multicall` counts as one call). Every call is recorded so tests can
//! assert on exactly what would have gone over the wire.

use super::{Fault, MethodCall, Transport, Value};
use crate::error::{MoinError, Result};
use std::cell::RefCell;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: RefCell<VecDeque<Result<Value>>>,
    calls: RefCell<Vec<MethodCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, value: impl Into<Value>) -> Self {
        self.push(Ok(value.into()));
        self
    }

    pub fn fault(self, code: i64, message: &str) -> Self {
        self.push(Err(Fault::new(code, message).into()));
        self
    }

    pub fn fail(self, error: MoinError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn push(&self, response: Result<Value>) {
        self.responses.borrow_mut().push_back(response);
    }

    pub fn calls(&self) -> Vec<MethodCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn last_call(&self) -> Option<MethodCall> {
        self.calls.borrow().last().cloned()
    }
}

impl Transport for ScriptedTransport {
    fn call(&self, method: &str, params: &[Value]) -> Result<Value> {
        self.calls
            .borrow_mut()
            .push(MethodCall::new(method, params.to_vec()));
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| {
                Err(MoinError::Transport(format!(
                    "no scripted response for {}",
                    method
                )))
            })
    }
}

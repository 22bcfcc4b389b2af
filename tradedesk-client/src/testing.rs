//! Scripted transport for tests and offline runs.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use crate::error::TransportError;
use crate::transport::{ApiRequest, ApiResponse, Method, Transport};

/// Replays queued responses in order and records every request it sees.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<ApiResponse, TransportError>>>,
    seen: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, status: u16, body: Option<Value>) -> &Self {
        self.push(Ok(ApiResponse::new(status, body)))
    }

    pub fn respond_ok(&self, body: Value) -> &Self {
        self.respond(200, Some(body))
    }

    pub fn fail(&self, err: TransportError) -> &Self {
        self.push(Err(err))
    }

    fn push(&self, item: Result<ApiResponse, TransportError>) -> &Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(item);
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn request_count(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Methods of every request so far, in order.
    pub fn methods(&self) -> Vec<Method> {
        self.requests().iter().map(|r| r.method).collect()
    }

    pub fn last_request(&self) -> Option<ApiRequest> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::Request(format!(
                    "no scripted response for {} {}",
                    request.method, request.path
                )))
            })
    }
}

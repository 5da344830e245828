//! In-memory transport that replays scripted responses and records requests.

use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedRequest {
    Post {
        url: String,
        payload: serde_json::Value,
    },
    Delete {
        url: String,
    },
}

impl RecordedRequest {
    pub fn url(&self) -> &str {
        match self {
            RecordedRequest::Post { url, .. } | RecordedRequest::Delete { url } => url,
        }
    }

    /// Number of statements in a POST body, `None` for DELETE
    pub fn statement_count(&self) -> Option<usize> {
        match self {
            RecordedRequest::Post { payload, .. } => payload
                .get("statements")
                .and_then(serde_json::Value::as_array)
                .map(Vec::len),
            RecordedRequest::Delete { .. } => None,
        }
    }
}

/// Replays queued responses in order. Runs out with a connection error.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<String, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw response body
    pub fn respond(&self, body: impl Into<String>) -> &Self {
        self.push(Ok(body.into()))
    }

    pub fn respond_json(&self, body: serde_json::Value) -> &Self {
        self.push(Ok(body.to_string()))
    }

    /// Queue a transport failure
    pub fn fail_with(&self, error: TransportError) -> &Self {
        self.push(Err(error))
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Scripted responses not yet consumed
    pub fn remaining(&self) -> usize {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn push(&self, response: Result<String, TransportError>) -> &Self {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
        self
    }

    fn record(&self, request: RecordedRequest) -> Result<String, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("no scripted response left".into())))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, url: &str, payload: &serde_json::Value) -> Result<String, TransportError> {
        self.record(RecordedRequest::Post {
            url: url.to_string(),
            payload: payload.clone(),
        })
    }

    async fn delete(&self, url: &str) -> Result<String, TransportError> {
        self.record(RecordedRequest::Delete {
            url: url.to_string(),
        })
    }
}

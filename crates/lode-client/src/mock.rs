//! In-process test doubles for the client's collaborators.
//!
//! [`MockExecutor`] replays scripted responses in order and records every
//! request it receives; [`MockSink`] collects emitted proposals. Both are
//! exported so downstream crates can test against the client without a
//! server.

use crate::emitter::ProposalSink;
use crate::error::CatalogError;
use crate::rest::{RestError, RestExecutor};
use lode_types::ChangeProposal;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A request observed by a [`MockExecutor`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Scripted [`RestExecutor`] for tests.
#[derive(Default)]
pub struct MockExecutor {
    responses: Mutex<VecDeque<Result<Value, RestError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful JSON response.
    pub fn push_ok(&self, response: Value) {
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .push_back(Ok(response));
    }

    /// Queues a failure.
    pub fn push_err(&self, error: RestError) {
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .push_back(Err(error));
    }

    /// Returns the requests observed so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("mock lock poisoned").clone()
    }

    fn next_response(&self) -> Result<Value, RestError> {
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(RestError::Transport(
                    "no scripted response left in MockExecutor".to_string(),
                ))
            })
    }
}

impl RestExecutor for MockExecutor {
    fn get(&self, url: &str, params: &[(&str, String)]) -> Result<Value, RestError> {
        self.requests
            .lock()
            .expect("mock lock poisoned")
            .push(RecordedRequest {
                method: "GET",
                url: url.to_string(),
                params: params
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                body: None,
            });
        self.next_response()
    }

    fn post(&self, url: &str, body: &Value) -> Result<Value, RestError> {
        self.requests
            .lock()
            .expect("mock lock poisoned")
            .push(RecordedRequest {
                method: "POST",
                url: url.to_string(),
                params: Vec::new(),
                body: Some(body.clone()),
            });
        self.next_response()
    }
}

/// Recording [`ProposalSink`] for tests.
#[derive(Default)]
pub struct MockSink {
    proposals: Mutex<Vec<ChangeProposal>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the proposals emitted so far, in order.
    pub fn emitted(&self) -> Vec<ChangeProposal> {
        self.proposals.lock().expect("mock lock poisoned").clone()
    }
}

impl ProposalSink for MockSink {
    fn emit(&self, proposal: &ChangeProposal) -> Result<(), CatalogError> {
        self.proposals
            .lock()
            .expect("mock lock poisoned")
            .push(proposal.clone());
        Ok(())
    }
}

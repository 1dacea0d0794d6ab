//! Outbound call to a storage provider.
//!
//! The wire framework is external; the engine only needs "send this request
//! to that uid and give me its filled-in answer".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::core::types::Uid;
use crate::verification::requests::TaskRequest;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("provider {uid} did not answer within {timeout_ms}ms")]
    Timeout { uid: Uid, timeout_ms: u64 },

    #[error("provider {uid} unreachable: {reason}")]
    Unreachable { uid: Uid, reason: String },

    #[error("malformed response from provider {uid}: {reason}")]
    Protocol { uid: Uid, reason: String },

    #[error("dispatcher shut down")]
    Closed,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `request` to `uid`.
    ///
    /// Implementations may ignore `timeout`; the dispatcher enforces it too.
    async fn send(
        &self,
        uid: Uid,
        request: TaskRequest,
        timeout: Duration,
    ) -> Result<TaskRequest, TransportError>;
}

/// Result of querying one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub uid: Uid,
    pub response: Option<TaskRequest>,
    /// Seconds from send to answer; `None` on timeout or failure
    pub process_time: Option<f64>,
    pub error: Option<String>,
}

impl QueryResult {
    pub fn answered(uid: Uid, response: TaskRequest, process_time: f64) -> Self {
        Self {
            uid,
            response: Some(response),
            process_time: Some(process_time),
            error: None,
        }
    }

    pub fn failed(uid: Uid, error: &TransportError) -> Self {
        Self {
            uid,
            response: None,
            process_time: None,
            error: Some(error.to_string()),
        }
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }
}

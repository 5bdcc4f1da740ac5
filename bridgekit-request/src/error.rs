//! Error types for request tracking.

use crate::request::RequestStatus;
use std::fmt;
use thiserror::Error;

/// Result type for request operations.
pub type RequestResult<T> = Result<T, RequestError>;

/// Which registry a failing callback came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    Resolve,
    Reject,
    Timeout,
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve => f.write_str("resolve"),
            Self::Reject => f.write_str("reject"),
            Self::Timeout => f.write_str("timeout"),
        }
    }
}

/// Errors that can occur while settling or observing requests.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request already reached a terminal state.
    #[error("request {id} is already {status}")]
    AlreadySettled { id: String, status: RequestStatus },

    /// A registered callback returned an error. Later callbacks in the same
    /// registry were not run.
    #[error("{kind} callback #{index} failed for request {id}: {source}")]
    CallbackFault {
        id: String,
        kind: CallbackKind,
        index: usize,
        source: anyhow::Error,
    },
}

impl RequestError {
    /// The id of the request the error relates to.
    pub fn request_id(&self) -> &str {
        match self {
            Self::AlreadySettled { id, .. } | Self::CallbackFault { id, .. } => id,
        }
    }
}

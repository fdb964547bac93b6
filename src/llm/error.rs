//! Invocation error types

use thiserror::Error;

/// Model invocation error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct InvokeError {
    pub kind: InvokeErrorKind,
    pub message: String,
}

impl InvokeError {
    pub fn new(kind: InvokeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(InvokeErrorKind::Network, message)
    }

    pub fn model_not_found(message: impl Into<String>) -> Self {
        Self::new(InvokeErrorKind::ModelNotFound, message)
    }

    pub fn empty_response(message: impl Into<String>) -> Self {
        Self::new(InvokeErrorKind::EmptyResponse, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(InvokeErrorKind::Api, message)
    }
}

/// Error classification. Any kind is fatal to the turn in progress; there
/// is no retry policy at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeErrorKind {
    /// Connection or transport failure
    Network,
    /// The requested model is not available on the backend
    ModelNotFound,
    /// The backend returned an empty completion
    EmptyResponse,
    /// Any other backend-reported error
    Api,
}

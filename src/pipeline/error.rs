//! Error types for message handlers.

use std::error::Error as StdError;

use thiserror::Error;

use crate::error::BusError;
use crate::serialization::SerializationError;
use crate::storage::SagaError;

/// Error type for message handler operations.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// No handler registered for this message type.
    #[error("no handlers for message type {0}")]
    NoHandlers(String),

    /// Body decode / deserialization failed.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// Business logic rejected the message.
    #[error("rejected: {0}")]
    Rejected(String),

    /// An outgoing operation issued from the handler failed.
    #[error("bus error: {0}")]
    Bus(#[source] Box<BusError>),

    /// Other error.
    #[error("handler error: {0}")]
    Other(#[source] Box<dyn StdError + Send + Sync>),
}

impl HandlerError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        HandlerError::Rejected(reason.into())
    }

    pub fn other(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        HandlerError::Other(err.into())
    }
}

impl From<BusError> for HandlerError {
    fn from(err: BusError) -> Self {
        HandlerError::Bus(Box::new(err))
    }
}

impl From<SagaError> for HandlerError {
    fn from(err: SagaError) -> Self {
        HandlerError::from(BusError::from(err))
    }
}

impl From<SerializationError> for HandlerError {
    fn from(err: SerializationError) -> Self {
        HandlerError::DecodeFailed(err.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::DecodeFailed(err.to_string())
    }
}

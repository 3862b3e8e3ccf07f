use thiserror::Error;

use crate::transaction::TransactionError;

/// Error type for network and queue operations.
///
/// An empty queue is never an error: `receive` returns `Ok(None)` and
/// listings return an empty `Vec`.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A queue name was empty or whitespace.
    #[error("queue name must not be empty")]
    EmptyQueueName,

    /// A visibility header could not be parsed.
    #[error("invalid value {value:?} for header {name}")]
    InvalidHeader { name: String, value: String },

    /// The transaction refused the hook (already committed or disposed).
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

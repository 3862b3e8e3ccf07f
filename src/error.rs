use std::fmt;

use thiserror::Error;

use crate::messages::message_summary;
use crate::pipeline::HandlerError;
use crate::serialization::{Message, SerializationError};
use crate::storage::SagaError;
use crate::transaction::TransactionError;
use crate::transport::TransportError;

/// Top-level error for bus and harness operations.
#[derive(Debug, Error)]
pub enum BusError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// The pipeline gave up on a message and did not recover.
    #[error("message handling failed: {0}")]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Saga(#[from] SagaError),

    /// No destination could be determined for an outgoing message.
    #[error("routing failed: {0}")]
    Routing(String),

    /// A deferral delay puts the due time outside the representable range.
    #[error("deferral delay {0} is out of range")]
    DelayOutOfRange(chrono::Duration),

    /// Invalid options or builder usage.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Two of the harness's reserved queues were given the same name.
    #[error("{first} and {second} queue names must differ, but both are {name:?}")]
    ReservedQueueName {
        first: &'static str,
        second: &'static str,
        name: String,
    },

    /// The drain loop hit its processed-message ceiling.
    #[error(transparent)]
    TooManyMessagesProcessed(#[from] TooManyMessagesProcessed),

    /// The drain loop observed cancellation.
    #[error("message processing was cancelled")]
    Cancelled,
}

/// Raised when one drain call processes as many messages as the ceiling allows
/// and more are still coming, which usually means a handler feeds its own
/// input queue.
///
/// Carries every message processed by that call, in processing order.
#[derive(Debug)]
pub struct TooManyMessagesProcessed {
    processed: Vec<Message>,
}

impl TooManyMessagesProcessed {
    pub fn new(processed: Vec<Message>) -> Self {
        Self { processed }
    }

    pub fn processed_messages(&self) -> &[Message] {
        &self.processed
    }

    pub fn into_processed_messages(self) -> Vec<Message> {
        self.processed
    }
}

impl fmt::Display for TooManyMessagesProcessed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Message processing reached the limit of processing {} messages.",
            self.processed.len()
        )?;
        writeln!(f, "The following messages have been processed:")?;
        writeln!(f)?;
        write!(f, "{}", message_summary(&self.processed))
    }
}

impl std::error::Error for TooManyMessagesProcessed {}

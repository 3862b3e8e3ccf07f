//! Read-only views over messages for test assertions.
//!
//! ```text
//! Messages (trait)
//!   ├── MessageList    append-only log (processed messages)
//!   └── QueueMessages  live snapshot of a queue (pending, published, replied, ...)
//! ```

mod details;
mod list;
mod queue_view;

pub use details::{message_summary, MessageDetails};
pub use list::MessageList;
pub use queue_view::QueueMessages;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use crate::serialization::{type_name_of, Message, SerializationError};
use crate::transport::TransportMessage;

/// A sequence of messages that tests can inspect.
pub trait Messages {
    /// Deserialized messages, in order.
    fn messages(&self) -> Result<Vec<Message>, SerializationError>;

    /// Raw transport messages, in order.
    fn transport_messages(&self) -> Vec<TransportMessage>;

    fn clear(&self);

    fn len(&self) -> usize {
        self.transport_messages().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn headers(&self) -> Vec<BTreeMap<String, String>> {
        self.transport_messages().into_iter().map(|m| m.headers).collect()
    }

    /// Bodies of every message, decoded as `T`.
    fn bodies_as<T: DeserializeOwned>(&self) -> Result<Vec<T>, SerializationError>
    where
        Self: Sized,
    {
        self.messages()?.iter().map(|m| m.body_as()).collect()
    }

    /// Bodies of the messages whose type header names `T`.
    fn of_type<T: DeserializeOwned>(&self) -> Result<Vec<T>, SerializationError>
    where
        Self: Sized,
    {
        let name = type_name_of::<T>();
        self.messages()?
            .iter()
            .filter(|m| m.message_type() == Some(name))
            .map(|m| m.body_as())
            .collect()
    }

    /// Numbered [`MessageDetails`] of every message.
    fn summary(&self) -> Result<String, SerializationError> {
        Ok(message_summary(&self.messages()?))
    }
}

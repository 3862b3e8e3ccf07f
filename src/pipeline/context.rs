//! Context passed to message handlers.
//!
//! Carries the received transport message, the transaction it was received
//! under and a reference to the bus. Everything a handler sends through the
//! context is staged on that transaction, so it is delivered only if the
//! whole handling attempt commits.

use std::sync::Arc;

use chrono::Duration;

use crate::bus::Bus;
use crate::error::BusError;
use crate::serialization::{IntoMessage, Message, SerializationError};
use crate::storage::{InMemoryDataStore, SagaStorage};
use crate::transaction::Transaction;
use crate::transport::{headers, TransportMessage};

/// The context passed to every message handler.
///
/// ## Example
///
/// ```ignore
/// fn handle(ctx: &IncomingContext<'_>, order: PlaceOrder) -> Result<(), HandlerError> {
///     ctx.reply(&OrderPlaced { id: order.id.clone() })?;
///     ctx.publish(&OrderAccepted { id: order.id })?;
///     Ok(())
/// }
/// ```
pub struct IncomingContext<'a> {
    bus: &'a Bus,
    transaction: &'a Arc<Transaction>,
    message: TransportMessage,
}

impl<'a> IncomingContext<'a> {
    pub fn new(bus: &'a Bus, transaction: &'a Arc<Transaction>, message: TransportMessage) -> Self {
        Self {
            bus,
            transaction,
            message,
        }
    }

    /// The message as received from the input queue.
    pub fn transport_message(&self) -> &TransportMessage {
        &self.message
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.message.header(key)
    }

    pub fn message_id(&self) -> Option<&str> {
        self.header(headers::MESSAGE_ID)
    }

    /// Deserialize the received message with the bus's serializer.
    pub fn message(&self) -> Result<Message, SerializationError> {
        self.bus.serializer().deserialize(&self.message)
    }

    /// The transaction the message was received under.
    pub fn transaction(&self) -> &Arc<Transaction> {
        self.transaction
    }

    pub fn bus(&self) -> &Bus {
        self.bus
    }

    /// Send to the destination the router picks for the message type.
    pub fn send(&self, message: impl IntoMessage) -> Result<(), BusError> {
        self.bus.send_from(Some(self), message.into_message()?)
    }

    /// Send to this bus's own input queue.
    pub fn send_local(&self, message: impl IntoMessage) -> Result<(), BusError> {
        self.bus.send_local_from(Some(self), message.into_message()?)
    }

    pub fn defer(&self, delay: Duration, message: impl IntoMessage) -> Result<(), BusError> {
        self.bus.defer_from(Some(self), delay, message.into_message()?, false)
    }

    pub fn defer_local(&self, delay: Duration, message: impl IntoMessage) -> Result<(), BusError> {
        self.bus.defer_from(Some(self), delay, message.into_message()?, true)
    }

    pub fn publish(&self, message: impl IntoMessage) -> Result<(), BusError> {
        self.bus.publish_from(Some(self), message.into_message()?)
    }

    /// Send to the return address of the message being handled.
    pub fn reply(&self, message: impl IntoMessage) -> Result<(), BusError> {
        self.bus.reply_from(self, message.into_message()?)
    }

    /// Pass the received message on to another queue unchanged.
    pub fn forward(&self, destination: &str) -> Result<(), BusError> {
        self.bus.forward_from(self, destination, Vec::new())
    }

    /// Like [`forward`](Self::forward), adding or overwriting headers.
    pub fn forward_with_headers(
        &self,
        destination: &str,
        extra: Vec<(String, String)>,
    ) -> Result<(), BusError> {
        self.bus.forward_from(self, destination, extra)
    }

    pub fn sagas(&self) -> &dyn SagaStorage {
        self.bus.sagas().as_ref()
    }

    pub fn data_bus(&self) -> &InMemoryDataStore {
        self.bus.data_bus()
    }
}

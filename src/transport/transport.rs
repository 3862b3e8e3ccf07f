//! Transport trait binding a bus to its input queue.

use std::sync::Arc;

use super::{Network, TransportError, TransportMessage};
use crate::transaction::Transaction;

/// Point-to-point transport as seen by one bus instance.
///
/// `send` delivers to any named queue (competing consumers); `receive` only
/// ever reads the bus's own input queue. Both are staged on the given
/// transaction.
pub trait Transport: Send + Sync {
    /// The input queue this transport receives from.
    fn address(&self) -> &str;

    /// Stage `message` for delivery to `destination`.
    fn send(
        &self,
        destination: &str,
        message: &TransportMessage,
        transaction: &Transaction,
    ) -> Result<(), TransportError>;

    /// Claim the next due message from the input queue, if any.
    fn receive(&self, transaction: &Transaction) -> Result<Option<TransportMessage>, TransportError>;
}

/// [`Transport`] over an in-memory [`Network`].
#[derive(Debug, Clone)]
pub struct NetworkTransport {
    network: Arc<Network>,
    address: String,
}

impl NetworkTransport {
    pub fn new(network: Arc<Network>, input_queue: impl Into<String>) -> Self {
        Self {
            network,
            address: input_queue.into(),
        }
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }
}

impl Transport for NetworkTransport {
    fn address(&self) -> &str {
        &self.address
    }

    fn send(
        &self,
        destination: &str,
        message: &TransportMessage,
        transaction: &Transaction,
    ) -> Result<(), TransportError> {
        self.network.send(destination, message, transaction)
    }

    fn receive(&self, transaction: &Transaction) -> Result<Option<TransportMessage>, TransportError> {
        self.network.receive(&self.address, transaction)
    }
}

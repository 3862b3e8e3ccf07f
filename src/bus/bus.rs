//! Bus - outgoing operations for one input queue.

use std::sync::Arc;

use chrono::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::error::BusError;
use crate::pipeline::IncomingContext;
use crate::routing::Router;
use crate::serialization::{IntoMessage, Message, Serializer};
use crate::storage::{InMemoryDataStore, SagaStorage, SubscriptionStorage};
use crate::transport::{headers, Network, Transport};

/// Service bus for one input queue.
///
/// Each outgoing operation exists twice: on `Bus` itself, for test code
/// outside any handler, and on [`IncomingContext`], for handlers. Outside a
/// handler:
///
/// - every operation runs in its own transaction, committed before returning
/// - `send` and `defer` go to the bus's own input queue instead of the router
/// - the return address defaults to the reply queue
///
/// Inside a handler, operations are staged on the handling transaction, the
/// router picks destinations and the return address defaults to the input
/// queue.
pub struct Bus {
    pub(crate) network: Arc<Network>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) serializer: Arc<dyn Serializer>,
    pub(crate) router: Arc<dyn Router>,
    pub(crate) subscriptions: Arc<dyn SubscriptionStorage>,
    pub(crate) sagas: Arc<dyn SagaStorage>,
    pub(crate) data_bus: InMemoryDataStore,
    pub(crate) subscriber_queue: String,
    pub(crate) reply_queue: String,
}

impl Bus {
    /// The input queue of this bus.
    pub fn address(&self) -> &str {
        self.transport.address()
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        &self.serializer
    }

    pub fn subscriptions(&self) -> &Arc<dyn SubscriptionStorage> {
        &self.subscriptions
    }

    pub fn sagas(&self) -> &Arc<dyn SagaStorage> {
        &self.sagas
    }

    pub fn data_bus(&self) -> &InMemoryDataStore {
        &self.data_bus
    }

    pub fn send(&self, message: impl IntoMessage) -> Result<(), BusError> {
        self.send_from(None, message.into_message()?)
    }

    pub fn send_local(&self, message: impl IntoMessage) -> Result<(), BusError> {
        self.send_local_from(None, message.into_message()?)
    }

    /// Send `message` so that it becomes due `delay` from now.
    pub fn defer(&self, delay: Duration, message: impl IntoMessage) -> Result<(), BusError> {
        self.defer_from(None, delay, message.into_message()?, false)
    }

    pub fn defer_local(&self, delay: Duration, message: impl IntoMessage) -> Result<(), BusError> {
        self.defer_from(None, delay, message.into_message()?, true)
    }

    /// Deliver a copy to every subscriber of the message type, plus the subscriber queue.
    pub fn publish(&self, message: impl IntoMessage) -> Result<(), BusError> {
        self.publish_from(None, message.into_message()?)
    }

    /// Subscribe this bus's input queue to `topic`.
    pub fn subscribe_topic(&self, topic: &str) {
        self.subscriptions.register(topic, self.address());
        debug!(topic, address = self.address(), "subscribed");
    }

    pub fn unsubscribe_topic(&self, topic: &str) {
        self.subscriptions.unregister(topic, self.address());
        debug!(topic, address = self.address(), "unsubscribed");
    }

    /// Subscribe to messages of type `T`.
    pub fn subscribe<T>(&self) {
        self.subscribe_topic(crate::serialization::type_name_of::<T>());
    }

    pub fn unsubscribe<T>(&self) {
        self.unsubscribe_topic(crate::serialization::type_name_of::<T>());
    }

    pub(crate) fn send_from(
        &self,
        incoming: Option<&IncomingContext<'_>>,
        message: Message,
    ) -> Result<(), BusError> {
        let destination = match incoming {
            None => self.address().to_string(),
            Some(_) => self.route(&message)?,
        };
        self.dispatch(incoming, message, &[destination], headers::INTENT_POINT_TO_POINT)
    }

    pub(crate) fn send_local_from(
        &self,
        incoming: Option<&IncomingContext<'_>>,
        message: Message,
    ) -> Result<(), BusError> {
        let destination = self.address().to_string();
        self.dispatch(incoming, message, &[destination], headers::INTENT_POINT_TO_POINT)
    }

    pub(crate) fn defer_from(
        &self,
        incoming: Option<&IncomingContext<'_>>,
        delay: Duration,
        mut message: Message,
        local: bool,
    ) -> Result<(), BusError> {
        let destination = match incoming {
            Some(_) if !local => self.route(&message)?,
            _ => self.address().to_string(),
        };
        let due = self
            .network
            .clock()
            .now()
            .checked_add_signed(delay)
            .ok_or(BusError::DelayOutOfRange(delay))?;
        message.headers.insert(
            headers::DEFERRED_UNTIL.to_string(),
            headers::format_timestamp(due),
        );
        message
            .headers
            .insert(headers::DEFERRED_RECIPIENT.to_string(), destination.clone());
        self.dispatch(incoming, message, &[destination], headers::INTENT_POINT_TO_POINT)
    }

    pub(crate) fn publish_from(
        &self,
        incoming: Option<&IncomingContext<'_>>,
        message: Message,
    ) -> Result<(), BusError> {
        let topic = message
            .message_type()
            .ok_or_else(|| BusError::Routing("published message has no type header".into()))?
            .to_string();

        let mut addresses = self.subscriptions.subscriber_addresses(&topic);
        if !addresses
            .iter()
            .any(|a| a.to_lowercase() == self.subscriber_queue.to_lowercase())
        {
            addresses.push(self.subscriber_queue.clone());
        }
        self.dispatch(incoming, message, &addresses, headers::INTENT_PUBLISH)
    }

    pub(crate) fn reply_from(
        &self,
        incoming: &IncomingContext<'_>,
        mut message: Message,
    ) -> Result<(), BusError> {
        let return_address = incoming
            .header(headers::RETURN_ADDRESS)
            .ok_or_else(|| BusError::Routing("incoming message has no return address".into()))?
            .to_string();
        if let Some(id) = incoming.message_id() {
            message
                .headers
                .insert(headers::IN_REPLY_TO.to_string(), id.to_string());
        }
        self.dispatch(
            Some(incoming),
            message,
            &[return_address],
            headers::INTENT_POINT_TO_POINT,
        )
    }

    pub(crate) fn forward_from(
        &self,
        incoming: &IncomingContext<'_>,
        destination: &str,
        extra: Vec<(String, String)>,
    ) -> Result<(), BusError> {
        let mut message = incoming.transport_message().clone();
        message
            .headers
            .insert(headers::SOURCE_QUEUE.to_string(), self.address().to_string());
        message.headers.extend(extra);
        self.transport
            .send(destination, &message, incoming.transaction())?;
        debug!(destination, "message forwarded");
        Ok(())
    }

    fn route(&self, message: &Message) -> Result<String, BusError> {
        self.router.destination_address(message).ok_or_else(|| {
            BusError::Routing(format!(
                "no destination for message type {}",
                message.message_type().unwrap_or("<unknown>")
            ))
        })
    }

    /// Stamp default headers, serialize and hand the message to the transport.
    fn dispatch(
        &self,
        incoming: Option<&IncomingContext<'_>>,
        mut message: Message,
        destinations: &[String],
        intent: &str,
    ) -> Result<(), BusError> {
        let now = self.network.clock().now();
        let h = &mut message.headers;

        let message_id = h
            .entry(headers::MESSAGE_ID.to_string())
            .or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        h.entry(headers::SENT_TIME.to_string())
            .or_insert_with(|| headers::format_timestamp(now));
        h.entry(headers::INTENT.to_string())
            .or_insert_with(|| intent.to_string());
        h.entry(headers::RETURN_ADDRESS.to_string())
            .or_insert_with(|| match incoming {
                None => self.reply_queue.clone(),
                Some(_) => self.address().to_string(),
            });
        let correlation_id = incoming
            .and_then(|ctx| ctx.header(headers::CORRELATION_ID))
            .map(str::to_string)
            .unwrap_or_else(|| message_id.clone());
        h.entry(headers::CORRELATION_ID.to_string())
            .or_insert(correlation_id);

        let transport_message = self.serializer.serialize(&message)?;

        match incoming {
            Some(ctx) => {
                for destination in destinations {
                    self.transport
                        .send(destination, &transport_message, ctx.transaction())?;
                }
            }
            None => {
                let scope = self.network.begin_transaction();
                for destination in destinations {
                    self.transport
                        .send(destination, &transport_message, scope.transaction())?;
                }
                scope.complete()?;
            }
        }

        debug!(
            %message_id,
            message_type = message.message_type().unwrap_or("<unknown>"),
            ?destinations,
            "message sent"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("address", &self.address())
            .field("subscriber_queue", &self.subscriber_queue)
            .field("reply_queue", &self.reply_queue)
            .finish()
    }
}

use std::sync::Arc;

use chrono::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Bus, TestingBusBuilder};
use crate::error::{BusError, TooManyMessagesProcessed};
use crate::messages::{MessageList, Messages, QueueMessages};
use crate::options::TestingOptions;
use crate::pipeline::{IncomingContext, Pipeline, RetryStep};
use crate::serialization::IntoMessage;
use crate::storage::{InMemoryDataStore, SagaData, SubscriptionStorage};
use crate::transport::{Network, Queue};

/// A bus whose input queue is drained on demand by the test.
///
/// Nothing is processed in the background: messages sent to the input queue
/// sit there until [`process_pending_messages`](Self::process_pending_messages)
/// runs them through the pipeline on the calling thread.
///
/// ## Example
///
/// ```ignore
/// let bus = TestingBus::builder()
///     .with_pipeline(HandlerPipeline::new().handle::<PlaceOrder, _>(|ctx, order| {
///         ctx.reply(&OrderPlaced { id: order.id })?;
///         Ok(())
///     }))
///     .build()?;
///
/// bus.process_message(&PlaceOrder { id: "o1".into() })?;
/// assert_eq!(bus.replied_messages().len(), 1);
/// ```
pub struct TestingBus {
    pub(crate) bus: Arc<Bus>,
    pub(crate) options: TestingOptions,
    pub(crate) pipeline: RetryStep,
    pub(crate) processed: MessageList,
    pub(crate) input_queue: Arc<Queue>,
    pub(crate) subscriber_queue: Arc<Queue>,
    pub(crate) reply_queue: Arc<Queue>,
}

impl TestingBus {
    pub fn builder() -> TestingBusBuilder {
        TestingBusBuilder::new()
    }

    pub fn options(&self) -> &TestingOptions {
        &self.options
    }

    /// The wrapped bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn network(&self) -> &Arc<Network> {
        self.bus.network()
    }

    pub fn send(&self, message: impl IntoMessage) -> Result<(), BusError> {
        self.bus.send(message)
    }

    pub fn send_local(&self, message: impl IntoMessage) -> Result<(), BusError> {
        self.bus.send_local(message)
    }

    pub fn defer(&self, delay: Duration, message: impl IntoMessage) -> Result<(), BusError> {
        self.bus.defer(delay, message)
    }

    pub fn defer_local(&self, delay: Duration, message: impl IntoMessage) -> Result<(), BusError> {
        self.bus.defer_local(delay, message)
    }

    pub fn publish(&self, message: impl IntoMessage) -> Result<(), BusError> {
        self.bus.publish(message)
    }

    pub fn subscribe<T>(&self) {
        self.bus.subscribe::<T>()
    }

    pub fn unsubscribe<T>(&self) {
        self.bus.unsubscribe::<T>()
    }

    /// Process messages from the input queue until none is due.
    pub fn process_pending_messages(&self) -> Result<(), BusError> {
        self.drain(None)
    }

    /// Like [`process_pending_messages`](Self::process_pending_messages), but
    /// stops with [`BusError::Cancelled`] once `cancellation` is triggered.
    /// Cancellation is checked before each message, so a handler may cancel
    /// to stop the loop after the message it is handling.
    pub fn process_pending_messages_with(&self, cancellation: &CancellationToken) -> Result<(), BusError> {
        self.drain(Some(cancellation))
    }

    /// Send `message` to the input queue, then drain it.
    pub fn process_message(&self, message: impl IntoMessage) -> Result<(), BusError> {
        self.send_local(message)?;
        self.process_pending_messages()
    }

    fn drain(&self, cancellation: Option<&CancellationToken>) -> Result<(), BusError> {
        let batch = MessageList::new(Arc::clone(self.bus.serializer()));
        let max = self.options.max_processed_messages();

        loop {
            if cancellation.is_some_and(CancellationToken::is_cancelled) {
                info!(processed = batch.len(), "message processing cancelled");
                return Err(BusError::Cancelled);
            }

            if batch.len() >= max {
                warn!(max, "too many messages processed");
                return Err(TooManyMessagesProcessed::new(batch.messages()?).into());
            }

            let scope = self.bus.network().begin_transaction();
            let Some(message) = self.bus.transport().receive(scope.transaction())? else {
                break;
            };

            // decoded up front: the log hook runs after the receive already
            // removed the message, so it must not fail
            let decoded = self.processed.decode(&message);
            let (this_call, lifetime, received) = (batch.clone(), self.processed.clone(), message.clone());
            scope.transaction().on_commit(move || {
                this_call.push(received.clone(), decoded.clone());
                lifetime.push(received, decoded);
                Ok(())
            })?;

            let context = IncomingContext::new(&self.bus, scope.transaction(), message);
            self.pipeline.invoke(&context)?;
            scope.complete()?;
            debug!(transaction = %scope.id(), "message handled");
        }

        info!(processed = batch.len(), "no more pending messages");
        Ok(())
    }

    /// Failed attempts recorded so far for a message that has not yet
    /// succeeded or been moved to the error queue.
    pub fn failed_attempts(&self, message_id: &str) -> usize {
        self.pipeline.failed_attempts(message_id)
    }

    /// Shift every message in the input queue `delta` into the past.
    pub fn shift_time(&self, delta: Duration) {
        self.input_queue.shift_time(delta);
    }

    /// Bring deferred messages in the input queue `delta` closer to due.
    pub fn decrease_deferral(&self, delta: Duration) {
        self.input_queue.decrease_deferral(delta);
    }

    /// Messages waiting in the input queue.
    pub fn pending_messages(&self) -> QueueMessages {
        self.queue_view(&self.input_queue)
    }

    /// Messages delivered to the subscriber queue.
    pub fn published_messages(&self) -> QueueMessages {
        self.queue_view(&self.subscriber_queue)
    }

    /// Messages delivered to the reply queue.
    pub fn replied_messages(&self) -> QueueMessages {
        self.queue_view(&self.reply_queue)
    }

    /// Every message processed since the bus was built or last reset.
    pub fn processed_messages(&self) -> MessageList {
        self.processed.clone()
    }

    /// Messages waiting in any queue of the network.
    pub fn get_messages(&self, queue_name: &str) -> Result<QueueMessages, BusError> {
        let queue = self.bus.network().queue(queue_name)?;
        Ok(self.queue_view(&queue))
    }

    /// Messages moved to the error queue.
    pub fn error_messages(&self) -> Result<QueueMessages, BusError> {
        self.get_messages(self.options.error_queue_name())
    }

    pub fn saga_data(&self) -> Vec<SagaData> {
        self.bus.sagas().instances()
    }

    pub fn data_bus(&self) -> &InMemoryDataStore {
        self.bus.data_bus()
    }

    pub fn subscriptions(&self) -> &dyn SubscriptionStorage {
        self.bus.subscriptions().as_ref()
    }

    /// Return to a clean slate: every queue of the network, the processed
    /// log, retry bookkeeping, subscriptions, sagas and the data bus.
    pub fn reset(&self) {
        self.bus.network().reset();
        self.processed.clear();
        self.pipeline.clear();
        self.bus.subscriptions().clear();
        self.bus.sagas().clear();
        self.bus.data_bus().clear();
        info!(address = self.bus.address(), "testing bus reset");
    }

    fn queue_view(&self, queue: &Arc<Queue>) -> QueueMessages {
        QueueMessages::new(Arc::clone(queue), Arc::clone(self.bus.serializer()))
    }
}

impl std::fmt::Debug for TestingBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestingBus")
            .field("bus", &self.bus)
            .field("options", &self.options)
            .field("processed", &self.processed.len())
            .finish()
    }
}

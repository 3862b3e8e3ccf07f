use std::sync::Arc;

use tracing::info;

use super::{Bus, TestingBus};
use crate::clock::{Clock, SystemClock};
use crate::error::BusError;
use crate::messages::MessageList;
use crate::options::TestingOptions;
use crate::pipeline::{HandlerPipeline, Pipeline, RetryStep};
use crate::routing::{Router, TypeBasedRouter};
use crate::serialization::{JsonSerializer, Serializer};
use crate::storage::{
    InMemoryDataStore, InMemorySagaStorage, InMemorySubscriptionStorage, SagaStorage,
    SubscriptionStorage,
};
use crate::transport::{Network, NetworkTransport};

/// Builder for [`TestingBus`].
///
/// Every collaborator has an in-memory default. Several buses can share one
/// [`Network`] via [`with_network`](Self::with_network); the network then
/// decides the clock and the deferral lookahead, and `build` rejects options
/// whose lookahead differs from the network's.
pub struct TestingBusBuilder {
    options: TestingOptions,
    pipeline: Option<Box<dyn Pipeline>>,
    router: Option<Arc<dyn Router>>,
    serializer: Option<Arc<dyn Serializer>>,
    subscriptions: Option<Arc<dyn SubscriptionStorage>>,
    sagas: Option<Arc<dyn SagaStorage>>,
    clock: Option<Arc<dyn Clock>>,
    network: Option<Arc<Network>>,
}

impl Default for TestingBusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestingBusBuilder {
    pub fn new() -> Self {
        Self {
            options: TestingOptions::default(),
            pipeline: None,
            router: None,
            serializer: None,
            subscriptions: None,
            sagas: None,
            clock: None,
            network: None,
        }
    }

    pub fn with_options(mut self, options: TestingOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_pipeline(mut self, pipeline: impl Pipeline + 'static) -> Self {
        self.pipeline = Some(Box::new(pipeline));
        self
    }

    pub fn with_router(mut self, router: impl Router + 'static) -> Self {
        self.router = Some(Arc::new(router));
        self
    }

    pub fn with_serializer(mut self, serializer: impl Serializer + 'static) -> Self {
        self.serializer = Some(Arc::new(serializer));
        self
    }

    pub fn with_subscription_storage(mut self, storage: Arc<dyn SubscriptionStorage>) -> Self {
        self.subscriptions = Some(storage);
        self
    }

    pub fn with_saga_storage(mut self, storage: Arc<dyn SagaStorage>) -> Self {
        self.sagas = Some(storage);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Attach to an existing network instead of creating one.
    ///
    /// The options' deferral processing limit must equal the network's.
    pub fn with_network(mut self, network: Arc<Network>) -> Self {
        self.network = Some(network);
        self
    }

    pub fn build(self) -> Result<TestingBus, BusError> {
        let options = self.options;

        let network = match (self.network, self.clock) {
            (Some(_), Some(_)) => {
                return Err(BusError::Configuration(
                    "a shared network brings its own clock; configure the clock on the network".into(),
                ))
            }
            (Some(network), None) => {
                if network.deferral_processing_limit() != options.deferral_processing_limit() {
                    return Err(BusError::Configuration(format!(
                        "deferral processing limit {}ms differs from the shared network's {}ms",
                        options.deferral_processing_limit().num_milliseconds(),
                        network.deferral_processing_limit().num_milliseconds()
                    )));
                }
                network
            }
            (None, clock) => Arc::new(Network::new(
                clock.unwrap_or_else(|| Arc::new(SystemClock)),
                options.deferral_processing_limit(),
            )),
        };

        let input_queue = network.queue(options.input_queue_name())?;
        let subscriber_queue = network.queue(options.subscriber_queue_name())?;
        let reply_queue = network.queue(options.reply_queue_name())?;

        let serializer = self
            .serializer
            .unwrap_or_else(|| Arc::new(JsonSerializer));

        let bus = Bus {
            transport: Arc::new(NetworkTransport::new(
                Arc::clone(&network),
                options.input_queue_name(),
            )),
            network,
            serializer: Arc::clone(&serializer),
            router: self
                .router
                .unwrap_or_else(|| Arc::new(TypeBasedRouter::new())),
            subscriptions: self
                .subscriptions
                .unwrap_or_else(|| Arc::new(InMemorySubscriptionStorage::new())),
            sagas: self
                .sagas
                .unwrap_or_else(|| Arc::new(InMemorySagaStorage::new())),
            data_bus: InMemoryDataStore::new(),
            subscriber_queue: options.subscriber_queue_name().to_string(),
            reply_queue: options.reply_queue_name().to_string(),
        };

        let pipeline = RetryStep::new(
            self.pipeline
                .unwrap_or_else(|| Box::new(HandlerPipeline::new())),
            options.error_queue_name(),
            options.max_delivery_attempts(),
        );

        info!(
            input = options.input_queue_name(),
            subscriber = options.subscriber_queue_name(),
            reply = options.reply_queue_name(),
            "testing bus ready"
        );

        Ok(TestingBus {
            bus: Arc::new(bus),
            pipeline,
            processed: MessageList::new(serializer),
            input_queue,
            subscriber_queue,
            reply_queue,
            options,
        })
    }
}

//! In-memory transactional message network and a bounded drain loop for
//! deterministic message-bus integration tests.

mod bus;
mod clock;
mod error;
mod messages;
mod options;
mod pipeline;
mod routing;
mod serialization;
mod storage;
mod transaction;
pub mod transport;

pub use bus::{Bus, TestingBus, TestingBusBuilder};
pub use clock::{Clock, SystemClock, VirtualClock};
pub use error::{BusError, TooManyMessagesProcessed};
pub use messages::{message_summary, MessageDetails, MessageList, Messages, QueueMessages};
pub use options::{TestingOptions, TestingOptionsBuilder};
pub use pipeline::{HandlerError, HandlerPipeline, IncomingContext, Pipeline, RetryStep};
pub use routing::{Router, TypeBasedRouter};
pub use serialization::{
    type_name_of, IntoMessage, JsonSerializer, Message, SerializationError, Serializer,
};
pub use storage::{
    InMemoryDataStore, InMemorySagaStorage, InMemorySubscriptionStorage, SagaData, SagaError,
    SagaStorage, SubscriptionStorage,
};
pub use transaction::{
    CommitHook, DisposeHook, HookError, Transaction, TransactionError, TransactionId,
    TransactionScope,
};
pub use transport::{
    headers, MessageId, Network, NetworkMessage, NetworkTransport, Queue, Transport,
    TransportError, TransportMessage,
};

// Re-export the cancellation token accepted by the drain loop
pub use tokio_util::sync::CancellationToken;

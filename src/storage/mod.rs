//! In-memory storage collaborators owned by a bus.
//!
//! Saga state, topic subscriptions and the attachment data bus all live in
//! memory next to the network, so a harness reset can wipe them together.

mod data_bus;
mod sagas;
mod subscriptions;

pub use data_bus::InMemoryDataStore;
pub use sagas::{InMemorySagaStorage, SagaData, SagaError, SagaStorage};
pub use subscriptions::{InMemorySubscriptionStorage, SubscriptionStorage};

use std::sync::Arc;

use super::Messages;
use crate::serialization::{Message, SerializationError, Serializer};
use crate::transport::{Queue, TransportMessage};

/// Live view of the available messages of one queue.
///
/// Every read takes a fresh snapshot; clearing the view empties the queue.
#[derive(Clone)]
pub struct QueueMessages {
    queue: Arc<Queue>,
    serializer: Arc<dyn Serializer>,
}

impl QueueMessages {
    pub fn new(queue: Arc<Queue>, serializer: Arc<dyn Serializer>) -> Self {
        Self { queue, serializer }
    }

    pub fn queue_name(&self) -> &str {
        self.queue.name()
    }
}

impl Messages for QueueMessages {
    fn messages(&self) -> Result<Vec<Message>, SerializationError> {
        self.queue
            .list_available()
            .iter()
            .map(|m| self.serializer.deserialize(m))
            .collect()
    }

    fn transport_messages(&self) -> Vec<TransportMessage> {
        self.queue.list_available()
    }

    fn clear(&self) {
        self.queue.clear();
    }
}

impl std::fmt::Debug for QueueMessages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueMessages")
            .field("queue", &self.queue.name())
            .finish()
    }
}

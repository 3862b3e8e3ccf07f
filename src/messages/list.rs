use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::Messages;
use crate::serialization::{Message, SerializationError, Serializer};
use crate::transport::TransportMessage;

/// Append-only, thread-safe log of messages.
///
/// Clones share the same log. Each entry keeps the envelope next to its
/// decoded form; see [`decode`](Self::decode) for bodies the serializer
/// cannot read.
#[derive(Clone)]
pub struct MessageList {
    serializer: Arc<dyn Serializer>,
    entries: Arc<Mutex<Vec<(TransportMessage, Message)>>>,
}

impl MessageList {
    pub fn new(serializer: Arc<dyn Serializer>) -> Self {
        Self {
            serializer,
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Decode `message` for the log without failing.
    ///
    /// A body the serializer rejects is kept as its raw text, so poison
    /// messages still show up in views and summaries.
    pub fn decode(&self, message: &TransportMessage) -> Message {
        self.serializer.deserialize(message).unwrap_or_else(|err| {
            debug!(error = %err, "logging undecodable body as raw text");
            Message::new(
                message.headers.clone(),
                Value::String(String::from_utf8_lossy(&message.body).into_owned()),
            )
        })
    }

    /// Append an already decoded entry.
    pub fn push(&self, message: TransportMessage, decoded: Message) {
        self.entries.lock().push((message, decoded));
    }

    /// Decode and append `message`.
    pub fn add(&self, message: &TransportMessage) {
        let decoded = self.decode(message);
        self.push(message.clone(), decoded);
    }
}

impl Messages for MessageList {
    fn messages(&self) -> Result<Vec<Message>, SerializationError> {
        Ok(self.entries.lock().iter().map(|(_, m)| m.clone()).collect())
    }

    fn transport_messages(&self) -> Vec<TransportMessage> {
        self.entries.lock().iter().map(|(t, _)| t.clone()).collect()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl std::fmt::Debug for MessageList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageList").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::JsonSerializer;

    #[test]
    fn clones_share_the_log() {
        let list = MessageList::new(Arc::new(JsonSerializer));
        let other = list.clone();

        list.add(&TransportMessage::with_string_body("1"));
        other.add(&TransportMessage::with_string_body("\"two\""));

        assert_eq!(list.len(), 2);
        assert_eq!(other.bodies_as::<serde_json::Value>().unwrap()[1], "two");

        other.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn undecodable_body_is_kept_as_text() {
        let list = MessageList::new(Arc::new(JsonSerializer));
        list.add(&TransportMessage::with_string_body("not json").with_header("k", "v"));

        let messages = list.messages().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, Value::String("not json".into()));
        assert_eq!(messages[0].header("k"), Some("v"));
    }
}

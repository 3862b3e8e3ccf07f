use std::collections::BTreeMap;

use parking_lot::Mutex;

/// Topic to subscriber-address registry.
///
/// Addresses are compared case-insensitively, like queue names.
pub trait SubscriptionStorage: Send + Sync {
    /// Addresses subscribed to `topic`, in registration order.
    fn subscriber_addresses(&self, topic: &str) -> Vec<String>;

    fn register(&self, topic: &str, address: &str);

    fn unregister(&self, topic: &str, address: &str);

    fn clear(&self);
}

/// In-memory subscription storage.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionStorage {
    topics: Mutex<BTreeMap<String, Vec<String>>>,
}

impl InMemorySubscriptionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every topic with at least one subscriber.
    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().keys().cloned().collect()
    }
}

impl SubscriptionStorage for InMemorySubscriptionStorage {
    fn subscriber_addresses(&self, topic: &str) -> Vec<String> {
        self.topics.lock().get(topic).cloned().unwrap_or_default()
    }

    fn register(&self, topic: &str, address: &str) {
        let mut topics = self.topics.lock();
        let addresses = topics.entry(topic.to_string()).or_default();
        if !addresses.iter().any(|a| a.eq_ignore_ascii_case(address)) {
            addresses.push(address.to_string());
        }
    }

    fn unregister(&self, topic: &str, address: &str) {
        let mut topics = self.topics.lock();
        if let Some(addresses) = topics.get_mut(topic) {
            addresses.retain(|a| !a.eq_ignore_ascii_case(address));
            if addresses.is_empty() {
                topics.remove(topic);
            }
        }
    }

    fn clear(&self) {
        self.topics.lock().clear();
    }
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Duration;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{Queue, TransportError, TransportMessage};
use crate::clock::{Clock, SystemClock};
use crate::transaction::{Transaction, TransactionId, TransactionScope};

/// Registry of queues by name.
///
/// Queue names are case-insensitive: `"Orders"` and `"orders"` resolve to the
/// same [`Queue`]. Queues are created on first reference and never removed;
/// [`reset`](Self::reset) only empties them, so names held by test code as
/// routing identities stay valid.
///
/// The network also owns the id counters for messages and transactions, so
/// ids are reproducible per network instead of per process.
pub struct Network {
    clock: Arc<dyn Clock>,
    deferral_processing_limit: Duration,
    queues: Mutex<HashMap<String, Arc<Queue>>>,
    message_ids: Arc<AtomicU64>,
    transaction_ids: AtomicU64,
}

impl Default for Network {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), Duration::zero())
    }
}

impl Network {
    /// Create a network reading time from `clock`.
    ///
    /// `deferral_processing_limit` is the lookahead added to "now" when
    /// deciding whether a deferred message is due for receive.
    pub fn new(clock: Arc<dyn Clock>, deferral_processing_limit: Duration) -> Self {
        Self {
            clock,
            deferral_processing_limit,
            queues: Mutex::new(HashMap::new()),
            message_ids: Arc::new(AtomicU64::new(0)),
            transaction_ids: AtomicU64::new(0),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn deferral_processing_limit(&self) -> Duration {
        self.deferral_processing_limit
    }

    /// Get (or create) the queue called `name`.
    ///
    /// Repeated calls with the same name, in any letter case, return the same `Arc`.
    pub fn queue(&self, name: &str) -> Result<Arc<Queue>, TransportError> {
        if name.trim().is_empty() {
            return Err(TransportError::EmptyQueueName);
        }

        let mut queues = self.queues.lock();
        let queue = queues.entry(name.to_lowercase()).or_insert_with(|| {
            debug!(queue = %name, "queue created");
            Arc::new(Queue::new(
                name,
                Arc::clone(&self.clock),
                Arc::clone(&self.message_ids),
                self.deferral_processing_limit,
            ))
        });
        Ok(Arc::clone(queue))
    }

    /// Open a new transaction scope with a network-unique id.
    pub fn begin_transaction(&self) -> TransactionScope {
        let id = self.transaction_ids.fetch_add(1, Ordering::Relaxed) + 1;
        TransactionScope::new(Transaction::new(TransactionId(id)))
    }

    pub fn send(
        &self,
        queue_name: &str,
        message: &TransportMessage,
        transaction: &Transaction,
    ) -> Result<(), TransportError> {
        self.queue(queue_name)?.send(message, transaction)
    }

    pub fn receive(
        &self,
        queue_name: &str,
        transaction: &Transaction,
    ) -> Result<Option<TransportMessage>, TransportError> {
        self.queue(queue_name)?.receive(transaction)
    }

    /// Snapshot of the available messages of a queue, in consumption order.
    pub fn list_available(&self, queue_name: &str) -> Result<Vec<TransportMessage>, TransportError> {
        Ok(self.queue(queue_name)?.list_available())
    }

    /// Whether a queue holds a message that is unowned and due within the lookahead.
    pub fn has_available(&self, queue_name: &str) -> Result<bool, TransportError> {
        Ok(self.queue(queue_name)?.has_available())
    }

    pub fn shift_time(&self, queue_name: &str, delta: Duration) -> Result<(), TransportError> {
        self.queue(queue_name)?.shift_time(delta);
        Ok(())
    }

    pub fn decrease_deferral(&self, queue_name: &str, delta: Duration) -> Result<(), TransportError> {
        self.queue(queue_name)?.decrease_deferral(delta);
        Ok(())
    }

    /// Names of every queue referenced so far, sorted.
    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .queues
            .lock()
            .values()
            .map(|q| q.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Empty every queue. The queues themselves stay registered.
    pub fn reset(&self) {
        let queues: Vec<Arc<Queue>> = self.queues.lock().values().cloned().collect();
        for queue in &queues {
            queue.clear();
        }
        info!(queues = queues.len(), "network reset");
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("queues", &self.queue_names())
            .field("deferral_processing_limit", &self.deferral_processing_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::transport::headers;
    use std::collections::HashSet;

    fn network() -> (VirtualClock, Network) {
        let clock = VirtualClock::default();
        let network = Network::new(Arc::new(clock.clone()), Duration::zero());
        (clock, network)
    }

    #[test]
    fn same_name_any_case_returns_same_queue() {
        let (_, network) = network();
        let a = network.queue("Orders").unwrap();
        let b = network.queue("ORDERS").unwrap();
        let c = network.queue("payments").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(b.name(), "Orders");
    }

    #[test]
    fn empty_name_is_rejected() {
        let (_, network) = network();
        assert!(matches!(network.queue(""), Err(TransportError::EmptyQueueName)));
        assert!(matches!(network.queue("  "), Err(TransportError::EmptyQueueName)));
    }

    #[test]
    fn transaction_ids_are_per_network() {
        let (_, first) = network();
        let (_, second) = network();
        assert_eq!(first.begin_transaction().id(), TransactionId(1));
        assert_eq!(first.begin_transaction().id(), TransactionId(2));
        assert_eq!(second.begin_transaction().id(), TransactionId(1));
    }

    #[test]
    fn delegates_to_queues() {
        let (clock, network) = network();
        let due = clock.now() + Duration::seconds(5);
        let message = TransportMessage::with_string_body("E1")
            .with_header(headers::DEFERRED_UNTIL, headers::format_timestamp(due));

        let scope = network.begin_transaction();
        network.send("input", &message, scope.transaction()).unwrap();
        scope.complete().unwrap();
        drop(scope);

        assert!(!network.has_available("INPUT").unwrap());
        let scope = network.begin_transaction();
        assert!(network.receive("input", scope.transaction()).unwrap().is_none());
        drop(scope);

        network.decrease_deferral("Input", Duration::seconds(5)).unwrap();
        let scope = network.begin_transaction();
        let received = network.receive("input", scope.transaction()).unwrap().unwrap();
        assert_eq!(received.body_str(), Some("E1"));
    }

    #[test]
    fn reset_empties_queues_but_keeps_them() {
        let (_, network) = network();
        let queue = network.queue("input").unwrap();
        let scope = network.begin_transaction();
        network
            .send("input", &TransportMessage::with_string_body("A"), scope.transaction())
            .unwrap();
        network
            .send("other", &TransportMessage::with_string_body("B"), scope.transaction())
            .unwrap();
        scope.complete().unwrap();

        network.reset();

        assert!(network.list_available("input").unwrap().is_empty());
        assert!(network.list_available("other").unwrap().is_empty());
        assert_eq!(network.queue_names(), vec!["input", "other"]);
        assert!(Arc::ptr_eq(&queue, &network.queue("input").unwrap()));
    }

    #[test]
    fn concurrent_receivers_never_share_a_message() {
        let (_, network) = network();
        let scope = network.begin_transaction();
        for i in 0..200 {
            network
                .send("work", &TransportMessage::with_string_body(i.to_string()), scope.transaction())
                .unwrap();
        }
        scope.complete().unwrap();
        drop(scope);

        let received: Vec<Vec<String>> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        let mut mine = Vec::new();
                        loop {
                            let scope = network.begin_transaction();
                            match network.receive("work", scope.transaction()).unwrap() {
                                Some(message) => {
                                    mine.push(message.body_str().unwrap_or_default().to_string());
                                    scope.complete().unwrap();
                                }
                                None => break,
                            }
                        }
                        mine
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        let all: Vec<String> = received.into_iter().flatten().collect();
        let unique: HashSet<&String> = all.iter().collect();
        assert_eq!(all.len(), 200);
        assert_eq!(unique.len(), 200);
        assert!(network.queue("work").unwrap().is_empty());
    }
}

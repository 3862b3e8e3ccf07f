//! One named mailbox with transactional visibility.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Duration;
use parking_lot::Mutex;
use tracing::debug;

use super::{MessageId, NetworkMessage, TransportError, TransportMessage};
use crate::clock::{saturating_add, Clock};
use crate::transaction::Transaction;

/// A named, unbounded, in-memory queue.
///
/// Features:
/// - `send` is staged: the message appears only when the transaction commits
/// - `receive` claims the earliest due message for a transaction; commit
///   removes it, dispose without commit releases it for redelivery
/// - Ordering is `(visible_after, id)` for both receive and listing
/// - Every read and write of the stored list happens under one per-queue lock,
///   and only copies leave it
///
/// Queues are obtained from a [`Network`](super::Network):
///
/// ```
/// use testbus::{Network, TransportMessage};
///
/// let network = Network::default();
/// let queue = network.queue("orders").unwrap();
///
/// let scope = network.begin_transaction();
/// queue.send(&TransportMessage::with_string_body("{}"), scope.transaction()).unwrap();
/// assert!(queue.list_available().is_empty());
///
/// scope.complete().unwrap();
/// assert_eq!(queue.list_available().len(), 1);
/// ```
pub struct Queue {
    name: String,
    messages: Arc<Mutex<Vec<NetworkMessage>>>,
    message_ids: Arc<AtomicU64>,
    clock: Arc<dyn Clock>,
    deferral_processing_limit: Duration,
}

impl Queue {
    pub(crate) fn new(
        name: impl Into<String>,
        clock: Arc<dyn Clock>,
        message_ids: Arc<AtomicU64>,
        deferral_processing_limit: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            messages: Arc::new(Mutex::new(Vec::new())),
            message_ids,
            clock,
            deferral_processing_limit,
        }
    }

    /// The name the queue was first referenced by.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stage `message` for delivery when `transaction` commits.
    ///
    /// The queue keeps its own copy; the visibility window is computed now,
    /// from the headers as they are at this call.
    pub fn send(
        &self,
        message: &TransportMessage,
        transaction: &Transaction,
    ) -> Result<(), TransportError> {
        let id = MessageId(self.message_ids.fetch_add(1, Ordering::Relaxed) + 1);
        let network_message = NetworkMessage::new(id, message.clone(), self.clock.now())?;

        let storage = Arc::clone(&self.messages);
        let queue = self.name.clone();
        transaction.on_commit(move || {
            storage.lock().push(network_message);
            debug!(queue = %queue, message_id = id.0, "message committed");
            Ok(())
        })?;

        debug!(
            queue = %self.name,
            message_id = id.0,
            transaction_id = transaction.id().0,
            "send staged"
        );
        Ok(())
    }

    /// Claim the earliest due message for `transaction`.
    ///
    /// Due means unowned, not expired, and `visible_after` no later than now
    /// plus the deferral processing limit. Expired unowned messages met on the
    /// way are discarded. Returns `Ok(None)` when nothing is due.
    pub fn receive(
        &self,
        transaction: &Transaction,
    ) -> Result<Option<TransportMessage>, TransportError> {
        let now = self.clock.now();
        let horizon = saturating_add(now, self.deferral_processing_limit);
        let mut messages = self.messages.lock();

        let before = messages.len();
        messages.retain(|m| m.owner().is_some() || !m.is_expired(now));
        if messages.len() < before {
            debug!(queue = %self.name, discarded = before - messages.len(), "expired messages discarded");
        }

        let index = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_receivable(now, horizon))
            .min_by_key(|(_, m)| m.sort_key())
            .map(|(index, _)| index);
        let Some(index) = index else {
            return Ok(None);
        };

        let id = messages[index].id();
        let owner = transaction.id();

        let release = Arc::clone(&self.messages);
        let queue = self.name.clone();
        transaction.on_dispose(move || {
            if let Some(m) = release
                .lock()
                .iter_mut()
                .find(|m| m.id() == id && m.owner() == Some(owner))
            {
                m.set_owner(None);
                debug!(queue = %queue, message_id = id.0, transaction_id = owner.0, "message released");
            }
        })?;

        let remove = Arc::clone(&self.messages);
        let queue = self.name.clone();
        transaction.on_commit(move || {
            remove.lock().retain(|m| m.id() != id);
            debug!(queue = %queue, message_id = id.0, "message removed");
            Ok(())
        })?;

        let claimed = &mut messages[index];
        claimed.set_owner(Some(owner));
        debug!(queue = %self.name, message_id = id.0, transaction_id = owner.0, "message claimed");
        Ok(Some(claimed.message().clone()))
    }

    /// Copies of every unowned, unexpired message in consumption order,
    /// deferred ones included.
    pub fn list_available(&self) -> Vec<TransportMessage> {
        let now = self.clock.now();
        let messages = self.messages.lock();

        let mut available: Vec<&NetworkMessage> = messages
            .iter()
            .filter(|m| m.owner().is_none() && !m.is_expired(now))
            .collect();
        available.sort_by_key(|m| m.sort_key());
        available.into_iter().map(|m| m.message().clone()).collect()
    }

    /// Whether `receive` would currently return a message.
    pub fn has_available(&self) -> bool {
        let now = self.clock.now();
        let horizon = saturating_add(now, self.deferral_processing_limit);
        self.messages
            .lock()
            .iter()
            .any(|m| m.is_receivable(now, horizon))
    }

    /// Simulate `delta` of elapsed time for every stored message.
    pub fn shift_time(&self, delta: Duration) {
        let mut messages = self.messages.lock();
        for message in messages.iter_mut() {
            message.shift_time(delta);
        }
        debug!(queue = %self.name, shifted_ms = delta.num_milliseconds(), count = messages.len(), "time shifted");
    }

    /// Bring every stored message's earliest-visible time `delta` closer.
    pub fn decrease_deferral(&self, delta: Duration) {
        let mut messages = self.messages.lock();
        for message in messages.iter_mut() {
            message.decrease_deferral(delta);
        }
        debug!(queue = %self.name, decreased_ms = delta.num_milliseconds(), count = messages.len(), "deferral decreased");
    }

    /// Drop every stored message, owned or not.
    pub fn clear(&self) {
        let mut messages = self.messages.lock();
        let dropped = messages.len();
        messages.clear();
        debug!(queue = %self.name, dropped, "queue cleared");
    }

    /// Number of stored messages, including claimed and deferred ones.
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("deferral_processing_limit", &self.deferral_processing_limit)
            .finish()
    }
}

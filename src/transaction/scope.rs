use std::sync::Arc;

use tracing::warn;

use super::{Transaction, TransactionError, TransactionId};

/// Scoped ownership of a [`Transaction`].
///
/// `complete()` commits. Dropping the scope disposes the transaction if the
/// caller did not, so claimed messages are released even when the code in
/// between returns early with an error.
///
/// ```
/// use testbus::{Transaction, TransactionId, TransactionScope};
///
/// let scope = TransactionScope::new(Transaction::new(TransactionId(1)));
/// scope.transaction().on_dispose(|| {}).unwrap();
/// scope.complete().unwrap();
/// // dropped here: dispose-hooks run
/// ```
#[derive(Debug)]
pub struct TransactionScope {
    transaction: Arc<Transaction>,
}

impl TransactionScope {
    pub fn new(transaction: Transaction) -> Self {
        Self {
            transaction: Arc::new(transaction),
        }
    }

    /// The transaction this scope owns, for staging queue operations.
    pub fn transaction(&self) -> &Arc<Transaction> {
        &self.transaction
    }

    pub fn id(&self) -> TransactionId {
        self.transaction.id()
    }

    /// Commit the transaction. Disposal still happens on drop.
    pub fn complete(&self) -> Result<bool, TransactionError> {
        self.transaction.commit()
    }

    /// Dispose now instead of on drop, surfacing any usage error.
    pub fn dispose(self) -> Result<(), TransactionError> {
        self.transaction.dispose()
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if self.transaction.is_disposed() {
            return;
        }
        if let Err(err) = self.transaction.dispose() {
            warn!(error = %err, "transaction scope dispose failed");
        }
    }
}

use thiserror::Error;

use super::transaction::{HookError, TransactionId};

/// Error type for transaction operations.
///
/// `AlreadyCommitted` and `AlreadyDisposed` are usage errors: they mean the
/// caller broke the single-shot contract and must never be ignored.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// `commit` or `on_commit` called after the transaction committed.
    #[error("{0} has already been committed")]
    AlreadyCommitted(TransactionId),

    /// `dispose`, `on_dispose`, `on_commit` or `commit` called after dispose.
    #[error("{0} has already been disposed")]
    AlreadyDisposed(TransactionId),

    /// A commit-hook failed; hooks after it did not run.
    #[error("commit hook #{index} of {transaction} failed: {source}")]
    CommitHookFailed {
        transaction: TransactionId,
        index: usize,
        #[source]
        source: HookError,
    },
}

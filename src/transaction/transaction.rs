use std::error::Error;
use std::fmt;

use parking_lot::Mutex;
use tracing::trace;

use super::TransactionError;

/// Error returned by a failing commit-hook.
pub type HookError = Box<dyn Error + Send + Sync>;

/// Callback run once when the transaction commits.
pub type CommitHook = Box<dyn FnOnce() -> Result<(), HookError> + Send>;

/// Callback run once when the transaction is disposed.
pub type DisposeHook = Box<dyn FnOnce() + Send>;

/// Identifier of a transaction, unique per [`Network`](crate::Network).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transaction #{}", self.0)
    }
}

#[derive(Default)]
struct State {
    committed: bool,
    disposed: bool,
    aborted: bool,
    commit_hooks: Vec<CommitHook>,
    dispose_hooks: Vec<DisposeHook>,
}

/// A single-shot commit/dispose boundary.
///
/// Hooks run outside the internal lock, so a hook may safely call back into
/// queues that register hooks on *other* transactions. Registering a hook on
/// this transaction after the matching terminal action ran is an error.
pub struct Transaction {
    id: TransactionId,
    state: Mutex<State>,
}

impl Transaction {
    /// Create a fresh transaction.
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: Mutex::new(State::default()),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Register a callback to run, in registration order, on commit.
    pub fn on_commit<F>(&self, hook: F) -> Result<(), TransactionError>
    where
        F: FnOnce() -> Result<(), HookError> + Send + 'static,
    {
        let mut state = self.state.lock();
        if state.committed {
            return Err(TransactionError::AlreadyCommitted(self.id));
        }
        if state.disposed {
            return Err(TransactionError::AlreadyDisposed(self.id));
        }
        state.commit_hooks.push(Box::new(hook));
        Ok(())
    }

    /// Register a callback to run, in registration order, on dispose.
    pub fn on_dispose<F>(&self, hook: F) -> Result<(), TransactionError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(TransactionError::AlreadyDisposed(self.id));
        }
        state.dispose_hooks.push(Box::new(hook));
        Ok(())
    }

    /// Mark the transaction for rollback.
    ///
    /// A later [`commit`](Self::commit) discards the commit-hooks instead of
    /// running them. Has no effect once the transaction committed.
    pub fn abort(&self) {
        let mut state = self.state.lock();
        if !state.committed {
            state.aborted = true;
        }
    }

    /// Run all commit-hooks in registration order.
    ///
    /// Returns `Ok(true)` when the hooks ran and `Ok(false)` when the
    /// transaction had been aborted. Does not dispose.
    pub fn commit(&self) -> Result<bool, TransactionError> {
        let (hooks, aborted) = {
            let mut state = self.state.lock();
            if state.committed {
                return Err(TransactionError::AlreadyCommitted(self.id));
            }
            if state.disposed {
                return Err(TransactionError::AlreadyDisposed(self.id));
            }
            state.committed = true;
            (std::mem::take(&mut state.commit_hooks), state.aborted)
        };

        if aborted {
            trace!(transaction = %self.id, discarded = hooks.len(), "commit skipped, transaction aborted");
            return Ok(false);
        }

        trace!(transaction = %self.id, hooks = hooks.len(), "committing");
        for (index, hook) in hooks.into_iter().enumerate() {
            hook().map_err(|source| TransactionError::CommitHookFailed {
                transaction: self.id,
                index,
                source,
            })?;
        }
        Ok(true)
    }

    /// Run all dispose-hooks in registration order, exactly once.
    ///
    /// Without a prior successful commit this is the rollback path.
    pub fn dispose(&self) -> Result<(), TransactionError> {
        let hooks = {
            let mut state = self.state.lock();
            if state.disposed {
                return Err(TransactionError::AlreadyDisposed(self.id));
            }
            state.disposed = true;
            state.commit_hooks.clear();
            std::mem::take(&mut state.dispose_hooks)
        };

        trace!(transaction = %self.id, hooks = hooks.len(), "disposing");
        for hook in hooks {
            hook();
        }
        Ok(())
    }

    pub fn is_committed(&self) -> bool {
        self.state.lock().committed
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    pub fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("committed", &state.committed)
            .field("disposed", &state.disposed)
            .field("aborted", &state.aborted)
            .field("commit_hooks", &state.commit_hooks.len())
            .field("dispose_hooks", &state.dispose_hooks.len())
            .finish()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    fn recorder() -> Arc<StdMutex<Vec<&'static str>>> {
        Arc::new(StdMutex::new(Vec::new()))
    }

    #[test]
    fn commit_runs_hooks_in_order() {
        let tx = Transaction::new(TransactionId(1));
        let log = recorder();

        for name in ["first", "second", "third"] {
            let log = log.clone();
            tx.on_commit(move || {
                log.lock().unwrap().push(name);
                Ok(())
            })
            .unwrap();
        }

        assert!(tx.commit().unwrap());
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn double_commit_is_an_error() {
        let tx = Transaction::new(TransactionId(2));
        tx.commit().unwrap();
        assert!(matches!(
            tx.commit(),
            Err(TransactionError::AlreadyCommitted(TransactionId(2)))
        ));
    }

    #[test]
    fn double_dispose_is_an_error() {
        let tx = Transaction::new(TransactionId(3));
        tx.dispose().unwrap();
        assert!(matches!(
            tx.dispose(),
            Err(TransactionError::AlreadyDisposed(TransactionId(3)))
        ));
    }

    #[test]
    fn registering_after_terminal_action_fails() {
        let tx = Transaction::new(TransactionId(4));
        tx.commit().unwrap();
        assert!(matches!(
            tx.on_commit(|| Ok(())),
            Err(TransactionError::AlreadyCommitted(_))
        ));
        tx.on_dispose(|| {}).unwrap();

        tx.dispose().unwrap();
        assert!(matches!(
            tx.on_dispose(|| {}),
            Err(TransactionError::AlreadyDisposed(_))
        ));
    }

    #[test]
    fn dispose_without_commit_skips_commit_hooks() {
        let tx = Transaction::new(TransactionId(5));
        let log = recorder();

        let commit_log = log.clone();
        tx.on_commit(move || {
            commit_log.lock().unwrap().push("commit");
            Ok(())
        })
        .unwrap();
        let dispose_log = log.clone();
        tx.on_dispose(move || dispose_log.lock().unwrap().push("dispose"))
            .unwrap();

        tx.dispose().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["dispose"]);
        assert!(matches!(
            tx.commit(),
            Err(TransactionError::AlreadyDisposed(_))
        ));
    }

    #[test]
    fn aborted_commit_discards_hooks() {
        let tx = Transaction::new(TransactionId(6));
        let log = recorder();
        let commit_log = log.clone();
        tx.on_commit(move || {
            commit_log.lock().unwrap().push("commit");
            Ok(())
        })
        .unwrap();

        tx.abort();
        assert!(!tx.commit().unwrap());
        assert!(tx.is_aborted());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn failing_hook_stops_commit() {
        let tx = Transaction::new(TransactionId(7));
        let log = recorder();

        tx.on_commit(|| Err("boom".into())).unwrap();
        let later = log.clone();
        tx.on_commit(move || {
            later.lock().unwrap().push("later");
            Ok(())
        })
        .unwrap();

        let err = tx.commit().unwrap_err();
        assert!(matches!(
            err,
            TransactionError::CommitHookFailed { index: 0, .. }
        ));
        assert!(err.to_string().contains("boom"));
        assert!(log.lock().unwrap().is_empty());
    }
}

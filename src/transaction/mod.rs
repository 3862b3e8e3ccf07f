//! Transactions - the commit/rollback boundary every queue mutation goes through.
//!
//! A [`Transaction`] collects commit-hooks and dispose-hooks. Queues never
//! mutate their storage directly on `send` or `receive`; they register hooks
//! that run when the transaction commits (making the change visible) or is
//! disposed (releasing whatever it claimed).
//!
//! ```text
//!   begin ──► on_commit / on_dispose ... ──► commit ──► dispose
//!                                       └──────────────► dispose   (rollback)
//! ```
//!
//! [`TransactionScope`] is the RAII guard callers hold: dropping it disposes
//! the transaction, so a claimed message is released on every exit path.

mod error;
mod scope;
mod transaction;

pub use error::TransactionError;
pub use scope::TransactionScope;
pub use transaction::{CommitHook, DisposeHook, HookError, Transaction, TransactionId};

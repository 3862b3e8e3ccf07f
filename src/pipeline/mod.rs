//! Incoming message pipeline.
//!
//! The drain loop hands every received message to a [`Pipeline`] together
//! with an [`IncomingContext`]. What happens inside is up to the pipeline;
//! the loop only looks at whether `invoke` returned an error.
//!
//! ```text
//! drain loop ──► RetryStep ──► HandlerPipeline ──► handler(ctx, T)
//!                   │                                   │
//!                   │ failure: abort tx, count          └─ ctx.send / reply / publish
//!                   │ exhausted: forward to error queue      (staged on the tx)
//! ```

mod context;
mod error;
mod handlers;
mod retry;

pub use context::IncomingContext;
pub use error::HandlerError;
pub use handlers::HandlerPipeline;
pub use retry::RetryStep;

/// Processes one received message within its transaction.
///
/// Returning `Err` makes the drain loop stop and propagate the error; the
/// message is released back to its queue when the transaction is disposed.
pub trait Pipeline: Send + Sync {
    fn invoke(&self, context: &IncomingContext<'_>) -> Result<(), HandlerError>;
}

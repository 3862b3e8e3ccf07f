//! Bus and testing harness.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 TestingBus (per test)                        │
//! │  - process_pending_messages() / process_message()           │
//! │  - pending / published / replied / processed views          │
//! │  - shift_time() / decrease_deferral() / reset()             │
//! └─────────────────────────────────────────────────────────────┘
//!                            │ wraps
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Bus                                   │
//! │  send / send_local / defer / publish / subscribe            │
//! │  reply / forward (from handlers, via IncomingContext)        │
//! └─────────────────────────────────────────────────────────────┘
//!          │                  │                     │
//!          ▼                  ▼                     ▼
//! ┌─────────────┐    ┌──────────────────┐    ┌──────────────────┐
//! │   Router    │    │ NetworkTransport │    │ Subscriptions,   │
//! │             │    │   over Network   │    │ sagas, data bus  │
//! └─────────────┘    └──────────────────┘    └──────────────────┘
//! ```
//!
//! ## Drain loop
//!
//! Each iteration opens a transaction, receives one due message, registers
//! a commit hook that appends it to the processed logs, runs the pipeline
//! and completes the transaction. The loop ends when nothing is due, when
//! one call has processed `max_processed_messages` messages, or when the
//! cancellation token fires.

mod builder;
mod bus;
mod testing_bus;

pub use builder::TestingBusBuilder;
pub use bus::Bus;
pub use testing_bus::TestingBus;

//! In-memory transport: the transactional queue network the harness runs on.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Network (one per harness)                    │
//! │  - name → Queue registry, case-insensitive, get-or-create    │
//! │  - owns message / transaction id counters and the clock      │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Queue (one lock per queue)                   │
//! │  send    → commit-hook appends                               │
//! │  receive → claim now, commit-hook removes, dispose releases  │
//! │  list / shift_time / decrease_deferral / clear               │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │   NetworkMessage: copy of TransportMessage + visibility      │
//! │   window [visible_after, visible_before] + owner             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod headers;

mod error;
mod message;
mod network;
mod network_message;
mod queue;
mod transport;

pub use error::TransportError;
pub use message::TransportMessage;
pub use network::Network;
pub use network_message::{MessageId, NetworkMessage};
pub use queue::Queue;
pub use transport::{NetworkTransport, Transport};

//! # murmur-core
//!
//! Message distribution and presence tracking for the murmur chat service.
//!
//! This crate provides the building blocks behind every API operation:
//!
//! - **UserStore** - nickname-keyed user records with presence checks
//! - **Mailbox** - bounded per-user frame queue, drop-on-full
//! - **MessageRouter** - registry of listening clients, broadcast and private delivery
//! - **PresenceCoordinator** - login, logout and user listing
//! - **DeliveryLoop** - per-stream mailbox/heartbeat multiplexer
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐     ┌─────────────┐
//! │ PresenceCoordinator │────▶│  UserStore  │
//! └──────────┬──────────┘     └──────▲──────┘
//!            │                       │
//!            ▼                       │
//!     ┌───────────────┐              │
//!     │ MessageRouter │──────────────┘
//!     └───────┬───────┘
//!             │ try-enqueue
//!             ▼
//!       ┌───────────┐     ┌──────────────┐     ┌───────────┐
//!       │  Mailbox  │────▶│ DeliveryLoop │────▶│ FrameSink │
//!       └───────────┘     └──────────────┘     └───────────┘
//! ```
//!
//! Delivery is best-effort: every enqueue is non-blocking and a full mailbox
//! silently drops the frame for that recipient.

pub mod delivery;
pub mod error;
pub mod mailbox;
pub mod presence;
pub mod registry;
pub mod router;
pub mod sink;
pub mod store;
pub mod user;

pub use delivery::{DeliveryLoop, SessionSummary, DEFAULT_HEARTBEAT_INTERVAL};
pub use error::{AuthFailure, ChatError};
pub use mailbox::{Delivery, Mailbox, MailboxReader, DEFAULT_MAILBOX_CAPACITY};
pub use presence::PresenceCoordinator;
pub use registry::ConnectedRegistry;
pub use router::{FanOut, MessageRouter, RouterStats};
pub use sink::{FrameSink, SinkError};
pub use store::{StoreError, UserStore};
pub use user::{unix_timestamp, validate_nickname, User};

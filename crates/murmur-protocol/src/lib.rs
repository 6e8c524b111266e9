//! # murmur-protocol
//!
//! Wire definitions for the murmur chat service.
//!
//! ## Stream frames
//!
//! A listening client receives a sequence of [`Frame`]s:
//!
//! - `PublicMessage` / `PrivateMessage` - chat traffic
//! - `Presence` - login and logout notifications
//! - `Heartbeat` - keepalive, roughly once per second
//!
//! Frames are length-prefixed MessagePack (see [`codec`]).
//! Unary request/response bodies live in [`api`] and are plain serde types.
//!
//! ## Example
//!
//! ```rust
//! use murmur_protocol::{codec, Frame};
//!
//! let frame = Frame::public("alice", "hi", 1_700_000_000);
//!
//! let encoded = codec::encode(&frame).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(frame, decoded);
//! ```

pub mod api;
pub mod codec;
pub mod frames;

pub use api::{
    Ack, Credentials, ErrorBody, ErrorCode, ListUsersResponse, LoginRequest,
    PrivateMessageRequest, PublicMessageRequest,
};
pub use codec::{decode, encode, ProtocolError};
pub use frames::{Frame, FrameType, PresenceKind, UserInfo};

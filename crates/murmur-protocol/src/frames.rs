//! Frame types for the murmur listen stream.
//!
//! A frame is one unit pushed from the server to a listening client.
//! Each frame is serialized using MessagePack for efficient binary encoding.

use serde::{Deserialize, Serialize};

/// Frame type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum FrameType {
    PublicMessage = 0x01,
    PrivateMessage = 0x02,
    Presence = 0x03,
    Heartbeat = 0x04,
}

impl From<FrameType> for u8 {
    fn from(ft: FrameType) -> u8 {
        ft as u8
    }
}

impl TryFrom<u8> for FrameType {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
        match value {
            0x01 => Ok(FrameType::PublicMessage),
            0x02 => Ok(FrameType::PrivateMessage),
            0x03 => Ok(FrameType::Presence),
            0x04 => Ok(FrameType::Heartbeat),
            _ => Err("Invalid frame type"),
        }
    }
}

/// Presence transitions announced to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum PresenceKind {
    /// A user logged in.
    Login = 0,
    /// A user logged out or their listen stream ended.
    Logout = 1,
}

impl From<PresenceKind> for u8 {
    fn from(kind: PresenceKind) -> u8 {
        kind as u8
    }
}

impl TryFrom<u8> for PresenceKind {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PresenceKind::Login),
            1 => Ok(PresenceKind::Logout),
            _ => Err("Invalid presence kind"),
        }
    }
}

/// Public view of a user: nickname and last-seen time (unix seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub nickname: String,
    pub last_seen: i64,
}

impl UserInfo {
    #[must_use]
    pub fn new(nickname: impl Into<String>, last_seen: i64) -> Self {
        Self {
            nickname: nickname.into(),
            last_seen,
        }
    }
}

/// A stream frame.
///
/// Timestamps are unix seconds stamped by the server when the frame is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// Message addressed to everyone currently listening.
    #[serde(rename = "public_message")]
    PublicMessage {
        /// Sender nickname.
        from: String,
        /// Message text.
        text: String,
        /// Send time.
        sent_at: i64,
    },

    /// Message addressed to a single nickname.
    #[serde(rename = "private_message")]
    PrivateMessage {
        /// Recipient nickname.
        to: String,
        /// Sender nickname.
        from: String,
        /// Message text.
        text: String,
        /// Send time.
        sent_at: i64,
    },

    /// Login/logout notification.
    #[serde(rename = "presence")]
    Presence {
        kind: PresenceKind,
        /// The user whose state changed, as stored after the change.
        user: UserInfo,
        /// When the event was emitted.
        at: i64,
    },

    /// Keepalive with no content.
    #[serde(rename = "heartbeat")]
    Heartbeat {},
}

impl Frame {
    /// Get the frame type.
    #[must_use]
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::PublicMessage { .. } => FrameType::PublicMessage,
            Frame::PrivateMessage { .. } => FrameType::PrivateMessage,
            Frame::Presence { .. } => FrameType::Presence,
            Frame::Heartbeat {} => FrameType::Heartbeat,
        }
    }

    /// Create a new PublicMessage frame.
    #[must_use]
    pub fn public(from: impl Into<String>, text: impl Into<String>, sent_at: i64) -> Self {
        Frame::PublicMessage {
            from: from.into(),
            text: text.into(),
            sent_at,
        }
    }

    /// Create a new PrivateMessage frame.
    #[must_use]
    pub fn private(
        to: impl Into<String>,
        from: impl Into<String>,
        text: impl Into<String>,
        sent_at: i64,
    ) -> Self {
        Frame::PrivateMessage {
            to: to.into(),
            from: from.into(),
            text: text.into(),
            sent_at,
        }
    }

    /// Create a new Presence frame.
    #[must_use]
    pub fn presence(kind: PresenceKind, user: UserInfo, at: i64) -> Self {
        Frame::Presence { kind, user, at }
    }

    /// Create a new Heartbeat frame.
    #[must_use]
    pub fn heartbeat() -> Self {
        Frame::Heartbeat {}
    }

    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Frame::Heartbeat {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_type() {
        let public = Frame::public("alice", "hi", 0);
        assert_eq!(public.frame_type(), FrameType::PublicMessage);

        assert_eq!(Frame::heartbeat().frame_type(), FrameType::Heartbeat);
        assert!(Frame::heartbeat().is_heartbeat());
        assert!(!public.is_heartbeat());
    }

    #[test]
    fn test_presence_kind_conversion() {
        assert_eq!(PresenceKind::try_from(0), Ok(PresenceKind::Login));
        assert_eq!(PresenceKind::try_from(1), Ok(PresenceKind::Logout));
        assert!(PresenceKind::try_from(2).is_err());
        assert!(FrameType::try_from(0x05).is_err());
    }

    #[test]
    fn test_frame_json_shape() {
        let frame = Frame::presence(PresenceKind::Logout, UserInfo::new("bob", 7), 9);
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "presence");
        assert_eq!(json["kind"], 1);
        assert_eq!(json["user"]["nickname"], "bob");

        let hb = serde_json::to_string(&Frame::heartbeat()).unwrap();
        assert_eq!(hb, r#"{"type":"heartbeat"}"#);
    }
}

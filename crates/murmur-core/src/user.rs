//! User records.

use crate::mailbox::Mailbox;
use murmur_protocol::UserInfo;
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum nickname length in bytes.
pub const MAX_NICKNAME_LENGTH: usize = 64;

/// Current wall-clock time in unix seconds.
#[must_use]
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Validate a nickname for a new login.
///
/// # Errors
///
/// Returns an error message if the nickname is invalid.
pub fn validate_nickname(nickname: &str) -> Result<(), &'static str> {
    if nickname.is_empty() {
        return Err("nickname cannot be empty");
    }
    if nickname.len() > MAX_NICKNAME_LENGTH {
        return Err("nickname too long");
    }
    if nickname.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err("nickname contains whitespace or control characters");
    }
    Ok(())
}

/// A stored user.
///
/// The nickname and mailbox are fixed at creation; only the presence fields
/// change afterwards.
#[derive(Debug, Clone)]
pub struct User {
    nickname: String,
    online: bool,
    last_seen: i64,
    mailbox: Mailbox,
}

impl User {
    /// Create an offline user seen now.
    #[must_use]
    pub fn new(nickname: impl Into<String>, mailbox: Mailbox) -> Self {
        Self {
            nickname: nickname.into(),
            online: false,
            last_seen: unix_timestamp(),
            mailbox,
        }
    }

    /// Replace the last-seen timestamp.
    #[must_use]
    pub fn with_last_seen(mut self, last_seen: i64) -> Self {
        self.last_seen = last_seen;
        self
    }

    #[must_use]
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Last presence change, unix seconds.
    #[must_use]
    pub fn last_seen(&self) -> i64 {
        self.last_seen
    }

    #[must_use]
    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Mark online and refresh last seen.
    pub fn go_online(&mut self) {
        self.online = true;
        self.touch();
    }

    /// Set the online flag only; last seen is left alone.
    pub fn mark_online(&mut self) {
        self.online = true;
    }

    /// Mark offline and refresh last seen.
    pub fn go_offline(&mut self) {
        self.online = false;
        self.touch();
    }

    /// Refresh last seen.
    pub fn touch(&mut self) {
        self.last_seen = unix_timestamp();
    }

    /// Public view of this user.
    #[must_use]
    pub fn info(&self) -> UserInfo {
        UserInfo::new(self.nickname.clone(), self.last_seen)
    }
}

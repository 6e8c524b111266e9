//! Service-level errors.
//!
//! Every operation surfaces its failure to the immediate caller; nothing here
//! is fatal to the server. Dropped deliveries are not errors.

use thiserror::Error;

/// Why a credential or login was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("user not found")]
    UnknownUser,

    #[error("user not logged-in")]
    NotLoggedIn,

    #[error("user already online")]
    AlreadyOnline,

    #[error("user already listening for messages")]
    AlreadyListening,
}

/// Errors returned by the chat operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Unknown nickname, not logged in, or a conflicting presence state.
    #[error("authentication error: {0}")]
    Authentication(#[from] AuthFailure),

    /// Private message recipient unknown to the store.
    #[error("user {0:?} not found")]
    NotFound(String),

    /// Nickname rejected at login.
    #[error("invalid nickname: {0}")]
    InvalidNickname(&'static str),

    /// Unexpected store failure.
    #[error("internal server error: {0}")]
    Internal(String),
}

impl ChatError {
    /// Short label used for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Authentication(_) => "authentication",
            ChatError::NotFound(_) => "not_found",
            ChatError::InvalidNickname(_) => "invalid_nickname",
            ChatError::Internal(_) => "internal",
        }
    }
}

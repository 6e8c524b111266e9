//! Request and response bodies for the unary operations.
//!
//! These travel as JSON over HTTP; only stream frames use the binary codec.

use serde::{Deserialize, Serialize};

use crate::frames::UserInfo;

/// Login request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub nickname: String,
}

/// Opaque credential returned by login.
///
/// It carries only the nickname; presence is the sole proof of identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credentials {
    pub nickname: String,
}

impl Credentials {
    #[must_use]
    pub fn new(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicMessageRequest {
    pub credentials: Credentials,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateMessageRequest {
    pub credentials: Credentials,
    /// Recipient nickname.
    pub to: String,
    pub text: String,
}

/// Online users sorted by nickname.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserInfo>,
}

/// Empty acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ack {}

/// Error categories surfaced to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Authentication,
    NotFound,
    InvalidArgument,
    Internal,
}

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorBody {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_request_deserialize() {
        let json = r#"{"credentials": {"nickname": "alice"}, "to": "bob", "text": "hi"}"#;
        let req: PrivateMessageRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.credentials, Credentials::new("alice"));
        assert_eq!(req.to, "bob");
    }

    #[test]
    fn test_error_code_serialize() {
        let body = ErrorBody::new(ErrorCode::NotFound, "user \"zed\" not found");
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"code\":\"not_found\""));
    }
}

//! Authentication failure taxonomy.
//!
//! Every rejection carries a machine-distinguishable kind plus a message that is safe
//! to return to the client. Library errors (jsonwebtoken, reqwest) are reclassified
//! into these kinds before they leave `services::auth`.
use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    MalformedHeader,
    MalformedToken,
    KeyResolutionFailed,
    SignatureInvalid,
    AudienceMismatch,
    Expired,
}

impl AuthErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedHeader => "malformed_header",
            Self::MalformedToken => "malformed_token",
            Self::KeyResolutionFailed => "key_resolution_failed",
            Self::SignatureInvalid => "signature_invalid",
            Self::AudienceMismatch => "audience_mismatch",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub message: String,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn malformed_header() -> Self {
        Self::new(
            AuthErrorKind::MalformedHeader,
            "Missing or malformed Authorization header",
        )
    }

    pub fn malformed_token(reason: impl fmt::Display) -> Self {
        Self::new(
            AuthErrorKind::MalformedToken,
            format!("Invalid token: {reason}"),
        )
    }

    pub fn key_resolution_failed() -> Self {
        Self::new(
            AuthErrorKind::KeyResolutionFailed,
            "Unable to resolve token signing key",
        )
    }

    pub fn signature_invalid() -> Self {
        Self::new(AuthErrorKind::SignatureInvalid, "Invalid token signature")
    }

    pub fn audience_mismatch() -> Self {
        Self::new(AuthErrorKind::AudienceMismatch, "Invalid token audience")
    }

    pub fn expired() -> Self {
        Self::new(AuthErrorKind::Expired, "Token has expired")
    }
}

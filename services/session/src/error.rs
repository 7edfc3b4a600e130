//! Error taxonomy for token issuance and verification.
//!
//! Every variant carries a stable [`ErrorCode`]. Messages that could be shown
//! to a client go through [`ErrorResponse`], which never echoes key, secret or
//! token material.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Sensitive patterns that should be sanitized from error messages
const SENSITIVE_PATTERNS: &[&str] = &[
    "secret",
    "token",
    "key",
    "bearer",
    "authorization",
    "cookie",
];

/// Errors raised by the identifier codec, the token codec and the issuer.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SessionError {
    /// Secret or key missing or malformed; a deployment defect.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Artifact is structurally invalid
    #[error("Token malformed: {reason}")]
    MalformedToken {
        /// Description of the malformation
        reason: String,
    },

    /// Signature, algorithm or issuer did not match
    #[error("Token signature invalid")]
    SignatureInvalid,

    /// Structurally valid but past its expiry
    #[error("Token expired at {expired_at}")]
    TokenExpired {
        /// When the token expired
        expired_at: DateTime<Utc>,
    },

    /// AEAD tag check failed while decrypting an identifier
    #[error("Identifier authentication failed")]
    AuthenticationFailed,
}

impl SessionError {
    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a malformed-token error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedToken {
            reason: reason.into(),
        }
    }

    /// Get the error code for this error
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Configuration(_) => ErrorCode::Configuration,
            Self::MalformedToken { .. } => ErrorCode::TokenMalformed,
            Self::SignatureInvalid => ErrorCode::SignatureInvalid,
            Self::TokenExpired { .. } => ErrorCode::TokenExpired,
            Self::AuthenticationFailed => ErrorCode::AuthenticationFailed,
        }
    }

    /// Whether this error is the client's fault rather than the deployment's.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Deployment defect
    Configuration,
    /// Structurally invalid artifact
    TokenMalformed,
    /// Signature failure
    SignatureInvalid,
    /// Expired token
    TokenExpired,
    /// AEAD failure
    AuthenticationFailed,
}

impl ErrorCode {
    /// Get the string representation of the error code
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "SESSION_CONFIGURATION_ERROR",
            Self::TokenMalformed => "SESSION_TOKEN_MALFORMED",
            Self::SignatureInvalid => "SESSION_SIGNATURE_INVALID",
            Self::TokenExpired => "SESSION_TOKEN_EXPIRED",
            Self::AuthenticationFailed => "SESSION_AUTHENTICATION_FAILED",
        }
    }

    /// HTTP status this code surfaces as when it reaches a client.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Configuration => 500,
            _ => 401,
        }
    }
}

/// JSON error body: `{"title": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    /// Short title
    pub title: String,
    /// Sanitized message
    pub message: String,
}

impl ErrorResponse {
    /// Body of every gate rejection.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self {
            title: "Unauthorized".to_string(),
            message: crate::session::Rejection::Unauthenticated.reason().to_string(),
        }
    }

    /// Body for a failure that should not leak details.
    #[must_use]
    pub fn internal() -> Self {
        Self {
            title: "Error".to_string(),
            message: "Internal error".to_string(),
        }
    }

    /// Generic error body with a sanitized message.
    #[must_use]
    pub fn error(message: &str) -> Self {
        Self {
            title: "Error".to_string(),
            message: sanitize_message(message),
        }
    }

    /// Success body.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            title: "Success".to_string(),
            message: message.into(),
        }
    }
}

impl From<&SessionError> for ErrorResponse {
    fn from(err: &SessionError) -> Self {
        if err.is_client_error() {
            Self::unauthorized()
        } else {
            Self::internal()
        }
    }
}

/// Sanitize a message by removing sensitive information
fn sanitize_message(message: &str) -> String {
    if contains_sensitive_info(message) {
        return "Request could not be processed".to_string();
    }
    message.to_string()
}

/// Check if a string contains sensitive information
#[must_use]
pub fn contains_sensitive_info(text: &str) -> bool {
    let lower = text.to_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

impl From<jsonwebtoken::errors::Error> for SessionError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            // Exact exp is re-derived by the codec when it has the claims.
            ErrorKind::ExpiredSignature => Self::TokenExpired {
                expired_at: Utc::now(),
            },
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidIssuer => Self::SignatureInvalid,
            ErrorKind::InvalidKeyFormat => Self::config("signing key rejected"),
            ErrorKind::MissingRequiredClaim(claim) => {
                Self::malformed(format!("missing required claim {claim}"))
            }
            ErrorKind::InvalidToken => Self::malformed("not a compact JWT"),
            ErrorKind::Base64(_) => Self::malformed("invalid base64 segment"),
            ErrorKind::Json(_) | ErrorKind::Utf8(_) => Self::malformed("invalid claims payload"),
            _ => Self::malformed("token validation failed"),
        }
    }
}

//! Claims carried by session tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::EncryptedIdentifier;

/// Issuer stamped into, and required on, every session token.
pub const ISSUER: &str = "session-service";

/// Payload of a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Encrypted user identifier
    #[serde(rename = "ID")]
    pub uid: EncryptedIdentifier,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

impl SessionClaims {
    /// Claims issued now by this service, expiring at `expires_at`.
    #[must_use]
    pub fn new(uid: EncryptedIdentifier, expires_at: DateTime<Utc>) -> Self {
        SessionClaims {
            uid,
            iat: Utc::now().timestamp(),
            exp: expires_at.timestamp(),
            iss: ISSUER.to_string(),
        }
    }

    /// Whether `exp` has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    /// Whether `exp` is before `timestamp` (seconds since epoch).
    #[must_use]
    pub fn is_expired_at(&self, timestamp: i64) -> bool {
        self.exp < timestamp
    }

    /// Expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

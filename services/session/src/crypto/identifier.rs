//! Reversible, randomized encryption of user identifiers.
//!
//! Wire format: standard base64 of `nonce (12 bytes) || AES-256-GCM ciphertext`,
//! where the plaintext is the decimal text of the identifier.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// AES-256 key length in bytes.
pub const IDENTIFIER_KEY_LEN: usize = 32;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Numeric user identity. Never leaves the service unencrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Base64 text produced by [`IdentifierCodec::encode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedIdentifier(String);

impl EncryptedIdentifier {
    /// Borrow the encoded text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the encoded text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for EncryptedIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for EncryptedIdentifier {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// AES-256-GCM codec for [`UserId`]s.
#[derive(Clone)]
pub struct IdentifierCodec {
    cipher: Aes256Gcm,
}

impl fmt::Debug for IdentifierCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierCodec").finish_non_exhaustive()
    }
}

impl IdentifierCodec {
    /// Build a codec from a 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if the key is not exactly
    /// [`IDENTIFIER_KEY_LEN`] bytes.
    pub fn new(key: &[u8]) -> Result<Self, SessionError> {
        if key.len() != IDENTIFIER_KEY_LEN {
            return Err(SessionError::config(format!(
                "identifier key must be {IDENTIFIER_KEY_LEN} bytes for AES-256, got {}",
                key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| SessionError::config(format!("identifier key rejected: {e}")))?;

        Ok(Self { cipher })
    }

    /// Encrypt an identifier under a fresh random nonce.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if the cipher refuses to seal,
    /// which only happens for inputs far larger than an `i64` rendering.
    pub fn encode(&self, id: UserId) -> Result<EncryptedIdentifier, SessionError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, id.get().to_string().as_bytes())
            .map_err(|e| SessionError::config(format!("identifier encryption failed: {e}")))?;

        let mut framed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        framed.extend_from_slice(&nonce_bytes);
        framed.extend(ciphertext);

        Ok(EncryptedIdentifier(STANDARD.encode(framed)))
    }

    /// Decrypt an identifier produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// - [`SessionError::MalformedToken`] for bad base64, input shorter than a
    ///   nonce, or a plaintext that is not an `i64`.
    /// - [`SessionError::AuthenticationFailed`] when the GCM tag does not verify.
    pub fn decode(&self, token: &str) -> Result<UserId, SessionError> {
        let data = STANDARD
            .decode(token)
            .map_err(|_| SessionError::malformed("identifier is not valid base64"))?;

        if data.len() < NONCE_LEN {
            return Err(SessionError::malformed("identifier shorter than nonce"));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| SessionError::AuthenticationFailed)?;

        std::str::from_utf8(&plaintext)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(UserId::new)
            .ok_or_else(|| SessionError::malformed("identifier payload is not an integer"))
    }
}

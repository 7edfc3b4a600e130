//! HS256 signing and HMAC verification of session tokens, keyed by token class.

use std::fmt;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::crypto::EncryptedIdentifier;
use crate::error::SessionError;
use crate::jwt::claims::{SessionClaims, ISSUER};
use crate::jwt::class::TokenClass;

/// A signed, class-scoped session token in compact JWT form.
///
/// `Debug` is redacted so tokens never end up in logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedToken(String);

impl SignedToken {
    /// Borrow the compact JWT.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the compact JWT.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SignedToken(<redacted>)")
    }
}

impl AsRef<str> for SignedToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

struct ClassKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl ClassKeys {
    fn from_secret(class: TokenClass, secret: &[u8]) -> Result<Self, SessionError> {
        if secret.is_empty() {
            return Err(SessionError::config(format!("{class} signing secret is empty")));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        })
    }
}

/// Signs and verifies [`SessionClaims`] under per-class secrets.
pub struct TokenCodec {
    access: ClassKeys,
    refresh: ClassKeys,
    validation: Validation,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .field("issuer", &ISSUER)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from the access and refresh signing secrets.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if either secret is empty.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Result<Self, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Any HMAC variant under the class secret verifies; nothing asymmetric.
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        // Expiry is checked after the signature so the exact instant is known.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iat", "iss"]);

        Ok(Self {
            access: ClassKeys::from_secret(TokenClass::Access, access_secret)?,
            refresh: ClassKeys::from_secret(TokenClass::Refresh, refresh_secret)?,
            validation,
        })
    }

    fn keys(&self, class: TokenClass) -> &ClassKeys {
        match class {
            TokenClass::Access => &self.access,
            TokenClass::Refresh => &self.refresh,
        }
    }

    /// Sign a token of `class` carrying `uid`, valid until `expires_at`.
    ///
    /// `iat` is stamped to now and `iss` to the service name.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if signing fails.
    pub fn issue(
        &self,
        class: TokenClass,
        uid: &EncryptedIdentifier,
        expires_at: DateTime<Utc>,
    ) -> Result<SignedToken, SessionError> {
        let claims = SessionClaims::new(uid.clone(), expires_at);

        encode(&Header::new(Algorithm::HS256), &claims, &self.keys(class).encoding)
            .map(SignedToken)
            .map_err(|e| SessionError::config(format!("{class} token signing failed: {e}")))
    }

    /// Verify a token of `class` and return its claims.
    ///
    /// # Errors
    ///
    /// - [`SessionError::SignatureInvalid`] on signature, algorithm or issuer
    ///   mismatch (including a token of the other class).
    /// - [`SessionError::TokenExpired`] when `exp` has passed.
    /// - [`SessionError::MalformedToken`] for anything structurally wrong.
    pub fn verify(&self, class: TokenClass, token: &str) -> Result<SessionClaims, SessionError> {
        let data = decode::<SessionClaims>(token, &self.keys(class).decoding, &self.validation)?;
        let claims = data.claims;

        if claims.is_expired() {
            return Err(SessionError::TokenExpired {
                expired_at: claims.expires_at(),
            });
        }

        Ok(claims)
    }
}

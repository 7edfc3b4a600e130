//! Credential issuance: login pairs, single access tokens and cookie directives.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::config::SessionConfig;
use crate::crypto::{IdentifierCodec, UserId};
use crate::error::SessionError;
use crate::jwt::{Lifetimes, RefreshTier, SignedToken, TokenClass, TokenCodec};
use crate::session::cookie::{CookieDirective, CookieSettings};

/// A token together with the instant it stops verifying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// The signed token
    pub token: SignedToken,
    /// Expiry stamped into the token
    pub expires_at: DateTime<Utc>,
}

/// Access and refresh tokens minted together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    /// Short-lived access token
    pub access: IssuedToken,
    /// Long-lived refresh token
    pub refresh: IssuedToken,
    /// Refresh tier chosen at issuance
    pub tier: RefreshTier,
}

/// Mints session tokens and the directives that hand them to the client.
#[derive(Debug)]
pub struct CredentialIssuer {
    tokens: TokenCodec,
    identifiers: IdentifierCodec,
    lifetimes: Lifetimes,
    cookies: CookieSettings,
}

impl CredentialIssuer {
    /// Assemble an issuer from its parts.
    #[must_use]
    pub const fn new(
        tokens: TokenCodec,
        identifiers: IdentifierCodec,
        lifetimes: Lifetimes,
        cookies: CookieSettings,
    ) -> Self {
        Self {
            tokens,
            identifiers,
            lifetimes,
            cookies,
        }
    }

    /// Build an issuer from validated session configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if a secret or the identifier
    /// key is unusable.
    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        Ok(Self::new(
            TokenCodec::new(config.access_secret(), config.refresh_secret())?,
            IdentifierCodec::new(config.identifier_key())?,
            config.lifetimes,
            CookieSettings::new(config.cookie_domain.clone(), config.environment.is_secure()),
        ))
    }

    /// The token codec.
    #[must_use]
    pub const fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    /// The identifier codec.
    #[must_use]
    pub const fn identifiers(&self) -> &IdentifierCodec {
        &self.identifiers
    }

    /// Mint an access+refresh pair for a freshly authenticated user.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if encryption or signing fails.
    pub fn issue_login_pair(&self, id: UserId, remember: bool) -> Result<CredentialPair, SessionError> {
        let tier = RefreshTier::from_remember(remember);
        let access = self.issue(TokenClass::Access, id, tier)?;
        let refresh = self.issue(TokenClass::Refresh, id, tier)?;

        debug!(refresh_tier = ?tier, "Issued credential pair");

        Ok(CredentialPair {
            access,
            refresh,
            tier,
        })
    }

    /// Mint a single access token, as done during rotation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if encryption or signing fails.
    pub fn issue_access(&self, id: UserId) -> Result<IssuedToken, SessionError> {
        self.issue(TokenClass::Access, id, RefreshTier::Session)
    }

    fn issue(&self, class: TokenClass, id: UserId, tier: RefreshTier) -> Result<IssuedToken, SessionError> {
        let lifetime = class.lifetime(&self.lifetimes, tier);
        let expires_at = expiry_after(lifetime)?;
        let uid = self.identifiers.encode(id)?;
        let token = self.tokens.issue(class, &uid, expires_at)?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a presented token of `class` and recover its user.
    ///
    /// # Errors
    ///
    /// Any [`SessionError`] from the token codec or the identifier codec.
    pub fn resolve(&self, class: TokenClass, raw: &str) -> Result<UserId, SessionError> {
        let claims = self.tokens.verify(class, raw)?;
        self.identifiers.decode(claims.uid.as_str())
    }

    /// Directives storing both tokens of `pair` on the client.
    #[must_use]
    pub fn build_session_directives(&self, pair: &CredentialPair, remember: bool) -> [CookieDirective; 2] {
        let tier = RefreshTier::from_remember(remember);
        [
            self.directive(TokenClass::Access, &pair.access.token, tier),
            self.directive(TokenClass::Refresh, &pair.refresh.token, tier),
        ]
    }

    /// Directive storing a rotated access token.
    #[must_use]
    pub fn access_directive(&self, token: &SignedToken) -> CookieDirective {
        self.directive(TokenClass::Access, token, RefreshTier::Session)
    }

    /// Directives that clear both artifacts immediately, whatever their state.
    #[must_use]
    pub fn build_logout_directives(&self) -> [CookieDirective; 2] {
        [
            self.cookies.removal(TokenClass::Access),
            self.cookies.removal(TokenClass::Refresh),
        ]
    }

    fn directive(&self, class: TokenClass, token: &SignedToken, tier: RefreshTier) -> CookieDirective {
        let max_age = max_age_secs(class.lifetime(&self.lifetimes, tier));
        self.cookies.directive(class, token.as_str().to_string(), max_age)
    }
}

fn expiry_after(lifetime: Duration) -> Result<DateTime<Utc>, SessionError> {
    TimeDelta::from_std(lifetime)
        .ok()
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .ok_or_else(|| SessionError::config(format!("token lifetime {lifetime:?} out of range")))
}

fn max_age_secs(lifetime: Duration) -> i64 {
    i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX)
}

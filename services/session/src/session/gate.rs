//! Per-request authentication decision with transparent access rotation.

use std::sync::Arc;

use tracing::{debug, error};

use crate::crypto::UserId;
use crate::jwt::TokenClass;
use crate::session::cookie::{CookieDirective, SessionArtifacts};
use crate::session::issuer::CredentialIssuer;

/// Why a request was turned away. Deliberately coarse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No usable session; full re-authentication required
    Unauthenticated,
}

impl Rejection {
    /// Machine-readable reason surfaced to the client.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

/// An admitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Recovered user
    pub user_id: UserId,
    /// New access cookie to write back when the request was admitted by rotation
    pub renewed_access: Option<CookieDirective>,
}

/// Terminal outcome of [`SessionGate::authenticate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Request belongs to a user
    Admitted(Admission),
    /// Request must be rejected
    Rejected(Rejection),
}

impl AuthOutcome {
    /// The admitted user, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Admitted(admission) => Some(admission.user_id),
            Self::Rejected(_) => None,
        }
    }

    /// Directives the caller must write with the response.
    #[must_use]
    pub fn directives(&self) -> &[CookieDirective] {
        match self {
            Self::Admitted(Admission {
                renewed_access: Some(directive),
                ..
            }) => std::slice::from_ref(directive),
            _ => &[],
        }
    }
}

/// Decides whether a request carries a valid session.
///
/// Stateless apart from the shared issuer; safe to call concurrently.
#[derive(Debug, Clone)]
pub struct SessionGate {
    issuer: Arc<CredentialIssuer>,
}

impl SessionGate {
    /// Gate backed by `issuer`.
    #[must_use]
    pub const fn new(issuer: Arc<CredentialIssuer>) -> Self {
        Self { issuer }
    }

    /// The issuer used for verification and rotation.
    #[must_use]
    pub const fn issuer(&self) -> &Arc<CredentialIssuer> {
        &self.issuer
    }

    /// Authenticate a request from its presented artifacts.
    ///
    /// A valid access token admits directly. Otherwise a valid refresh token
    /// admits and yields a freshly minted access directive. Anything else is
    /// rejected. Never fails and never re-issues the refresh token.
    pub fn authenticate(&self, artifacts: &SessionArtifacts) -> AuthOutcome {
        if let Some(raw) = artifacts.get(TokenClass::Access) {
            match self.issuer.resolve(TokenClass::Access, raw) {
                Ok(user_id) => {
                    return AuthOutcome::Admitted(Admission {
                        user_id,
                        renewed_access: None,
                    });
                }
                // A corrupted access token must not lock out a valid refresh token.
                Err(e) => debug!(error_code = e.code().as_str(), "Access token unusable"),
            }
        }

        let Some(raw) = artifacts.get(TokenClass::Refresh) else {
            debug!("No refresh token presented");
            return AuthOutcome::Rejected(Rejection::Unauthenticated);
        };

        let user_id = match self.issuer.resolve(TokenClass::Refresh, raw) {
            Ok(user_id) => user_id,
            Err(e) => {
                debug!(error_code = e.code().as_str(), "Refresh token rejected");
                return AuthOutcome::Rejected(Rejection::Unauthenticated);
            }
        };

        let issued = match self.issuer.issue_access(user_id) {
            Ok(issued) => issued,
            Err(e) => {
                error!(error = %e, "Failed to mint rotated access token");
                return AuthOutcome::Rejected(Rejection::Unauthenticated);
            }
        };

        debug!("Rotated access token from refresh token");

        AuthOutcome::Admitted(Admission {
            user_id,
            renewed_access: Some(self.issuer.access_directive(&issued.token)),
        })
    }
}

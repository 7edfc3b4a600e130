//! Token classes and their lifetime policy.

use std::fmt;
use std::time::Duration;

/// Closed set of session token classes.
///
/// Each class is signed under its own secret and has its own lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    /// Short-lived, checked on every request
    Access,
    /// Long-lived, used only to mint new access tokens
    Refresh,
}

impl TokenClass {
    /// Name of the client-side artifact (cookie) carrying this class.
    #[must_use]
    pub const fn cookie_name(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }

    /// Validity duration of a token of this class.
    ///
    /// `tier` only matters for refresh tokens.
    #[must_use]
    pub const fn lifetime(self, lifetimes: &Lifetimes, tier: RefreshTier) -> Duration {
        match self {
            Self::Access => lifetimes.access,
            Self::Refresh => match tier {
                RefreshTier::Session => lifetimes.refresh_short,
                RefreshTier::Remember => lifetimes.refresh_long,
            },
        }
    }
}

impl fmt::Display for TokenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cookie_name())
    }
}

/// Refresh lifetime tier, fixed at issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshTier {
    /// Session-only intent
    #[default]
    Session,
    /// "Remember me" intent
    Remember,
}

impl RefreshTier {
    /// Tier selected by a login form's "remember me" flag.
    #[must_use]
    pub const fn from_remember(remember: bool) -> Self {
        if remember {
            Self::Remember
        } else {
            Self::Session
        }
    }
}

/// Configured lifetimes. Validated so that
/// `access < refresh_short < refresh_long`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetimes {
    /// Access token lifetime
    pub access: Duration,
    /// Refresh lifetime without "remember me"
    pub refresh_short: Duration,
    /// Refresh lifetime with "remember me"
    pub refresh_long: Duration,
}

impl Default for Lifetimes {
    fn default() -> Self {
        Self {
            access: Duration::from_secs(600),
            refresh_short: Duration::from_secs(86_400),
            refresh_long: Duration::from_secs(604_800),
        }
    }
}

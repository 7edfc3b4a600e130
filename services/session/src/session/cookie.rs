//! Client-storage directives (`Set-Cookie`) and the artifacts a client presents.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::jwt::TokenClass;

/// Cookie path for both session artifacts.
pub const COOKIE_PATH: &str = "/";

/// `Expires` attribute format (RFC 7231 IMF-fixdate).
const EXPIRES_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Attributes shared by every session cookie the service writes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CookieSettings {
    /// `Domain` attribute; omitted when `None`
    pub domain: Option<String>,
    /// Whether to set `Secure`
    pub secure: bool,
}

impl CookieSettings {
    /// Settings for `domain` (empty means host-only) and the `secure` flag.
    #[must_use]
    pub fn new(domain: impl Into<String>, secure: bool) -> Self {
        let domain = domain.into();
        Self {
            domain: (!domain.is_empty()).then_some(domain),
            secure,
        }
    }

    /// Directive storing `value` in the cookie for `class` for `max_age` seconds.
    #[must_use]
    pub fn directive(&self, class: TokenClass, value: String, max_age: i64) -> CookieDirective {
        CookieDirective {
            name: class.cookie_name(),
            value,
            path: COOKIE_PATH,
            domain: self.domain.clone(),
            max_age,
            expires: None,
            secure: self.secure,
            http_only: true,
        }
    }

    /// Directive that overwrites the cookie for `class` and expires it at once.
    #[must_use]
    pub fn removal(&self, class: TokenClass) -> CookieDirective {
        CookieDirective {
            expires: Some(DateTime::<Utc>::UNIX_EPOCH),
            ..self.directive(class, String::new(), 0)
        }
    }
}

/// Instruction to the client to store or overwrite one session artifact.
///
/// Always `HttpOnly` and `SameSite=Lax`. `Debug` redacts the value.
#[derive(Clone, PartialEq, Eq)]
pub struct CookieDirective {
    /// Artifact name
    pub name: &'static str,
    /// Artifact value; empty for removals
    pub value: String,
    /// `Path` attribute
    pub path: &'static str,
    /// `Domain` attribute
    pub domain: Option<String>,
    /// `Max-Age` in seconds; zero or less expires immediately
    pub max_age: i64,
    /// `Expires` attribute
    pub expires: Option<DateTime<Utc>>,
    /// `Secure` attribute
    pub secure: bool,
    /// `HttpOnly` attribute
    pub http_only: bool,
}

impl CookieDirective {
    /// Whether this directive clears the artifact.
    #[must_use]
    pub const fn is_removal(&self) -> bool {
        self.max_age <= 0
    }

    /// Render as a `Set-Cookie` header value.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}; Path={}", self.name, self.value, self.path);
        if let Some(domain) = &self.domain {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        out.push_str(&format!("; Max-Age={}", self.max_age.max(0)));
        if let Some(expires) = self.expires {
            out.push_str(&format!("; Expires={}", expires.format(EXPIRES_FORMAT)));
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if self.secure {
            out.push_str("; Secure");
        }
        out.push_str("; SameSite=Lax");
        out
    }
}

impl fmt::Debug for CookieDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieDirective")
            .field("name", &self.name)
            .field("value_len", &self.value.len())
            .field("domain", &self.domain)
            .field("max_age", &self.max_age)
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

/// The two artifacts a client may present with a request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionArtifacts {
    access: Option<String>,
    refresh: Option<String>,
}

impl SessionArtifacts {
    /// No artifacts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the access artifact.
    #[must_use]
    pub fn with_access(mut self, value: impl Into<String>) -> Self {
        self.access = Some(value.into());
        self
    }

    /// Set the refresh artifact.
    #[must_use]
    pub fn with_refresh(mut self, value: impl Into<String>) -> Self {
        self.refresh = Some(value.into());
        self
    }

    /// Parse a `Cookie` request header (`name1=value1; name2=value2`).
    ///
    /// The first occurrence of each name wins.
    #[must_use]
    pub fn from_cookie_header(header: &str) -> Self {
        let mut artifacts = Self::default();
        for part in header.split(';') {
            let Some((name, value)) = part.trim().split_once('=') else {
                continue;
            };
            let slot = match name.trim() {
                n if n == TokenClass::Access.cookie_name() => &mut artifacts.access,
                n if n == TokenClass::Refresh.cookie_name() => &mut artifacts.refresh,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.trim().trim_matches('"').to_string());
            }
        }
        artifacts
    }

    /// The non-empty artifact for `class`, if presented.
    #[must_use]
    pub fn get(&self, class: TokenClass) -> Option<&str> {
        let value = match class {
            TokenClass::Access => self.access.as_deref(),
            TokenClass::Refresh => self.refresh.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }
}

impl fmt::Debug for SessionArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionArtifacts")
            .field("access", &self.get(TokenClass::Access).is_some())
            .field("refresh", &self.get(TokenClass::Refresh).is_some())
            .finish()
    }
}

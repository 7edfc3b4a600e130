//! Centralized configuration for the session service.
//!
//! All configuration is loaded from environment variables (with `.env`
//! support) and validated at startup. Nothing reads the environment after
//! that; the resulting values are passed to constructors.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use zeroize::Zeroizing;

use crate::crypto::IDENTIFIER_KEY_LEN;
use crate::jwt::Lifetimes;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid port number
    #[error("Invalid port: must be between 1 and 65535")]
    InvalidPort,

    /// Invalid TTL value
    #[error("Invalid TTL {name}: {reason}")]
    InvalidTtl {
        /// Variable name
        name: String,
        /// What is wrong
        reason: String,
    },

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Secret is present but unusable
    #[error("Invalid secret {name}: {reason}")]
    InvalidSecret {
        /// Variable name
        name: String,
        /// What is wrong
        reason: String,
    },

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },
}

/// Deployment environment. Decides the `Secure` cookie attribute and the log
/// format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Developer machine
    Local,
    /// Shared development deployment
    Development,
    /// Production
    Production,
    /// Any other named deployment (staging, qa, ...)
    Other(String),
}

impl Environment {
    /// Whether cookies must carry `Secure`.
    #[must_use]
    pub const fn is_secure(&self) -> bool {
        !matches!(self, Self::Local | Self::Development)
    }

    /// Whether this is production.
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "local" => Self::Local,
            "development" | "dev" => Self::Development,
            "production" | "prod" => Self::Production,
            other => Self::Other(other.to_string()),
        })
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Secrets, lifetimes and cookie attributes of the session core.
#[derive(Clone)]
pub struct SessionConfig {
    access_secret: Zeroizing<Vec<u8>>,
    refresh_secret: Zeroizing<Vec<u8>>,
    identifier_key: Zeroizing<Vec<u8>>,
    /// Token lifetimes
    pub lifetimes: Lifetimes,
    /// Cookie `Domain`; empty for host-only cookies
    pub cookie_domain: String,
    /// Deployment environment
    pub environment: Environment,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("identifier_key", &"<redacted>")
            .field("lifetimes", &self.lifetimes)
            .field("cookie_domain", &self.cookie_domain)
            .field("environment", &self.environment)
            .finish()
    }
}

impl SessionConfig {
    /// Assemble session configuration. Call [`validate`](Self::validate)
    /// before use.
    #[must_use]
    pub fn new(
        access_secret: impl Into<Vec<u8>>,
        refresh_secret: impl Into<Vec<u8>>,
        identifier_key: impl Into<Vec<u8>>,
        lifetimes: Lifetimes,
    ) -> Self {
        Self {
            access_secret: Zeroizing::new(access_secret.into()),
            refresh_secret: Zeroizing::new(refresh_secret.into()),
            identifier_key: Zeroizing::new(identifier_key.into()),
            lifetimes,
            cookie_domain: String::new(),
            environment: Environment::Local,
        }
    }

    /// Set the cookie domain.
    #[must_use]
    pub fn with_cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_domain = domain.into();
        self
    }

    /// Set the environment.
    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Access token signing secret.
    #[must_use]
    pub fn access_secret(&self) -> &[u8] {
        &self.access_secret
    }

    /// Refresh token signing secret.
    #[must_use]
    pub fn refresh_secret(&self) -> &[u8] {
        &self.refresh_secret
    }

    /// Identifier encryption key.
    #[must_use]
    pub fn identifier_key(&self) -> &[u8] {
        &self.identifier_key
    }

    /// Validates secrets and the lifetime ordering.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_secret.is_empty() {
            return Err(ConfigError::MissingRequired("JWT_ACCESS_SECRET".to_string()));
        }
        if self.refresh_secret.is_empty() {
            return Err(ConfigError::MissingRequired("JWT_REFRESH_SECRET".to_string()));
        }
        if self.identifier_key.is_empty() {
            return Err(ConfigError::MissingRequired("JWT_ENCODE_ID_SECRET".to_string()));
        }
        if self.access_secret.as_slice() == self.refresh_secret.as_slice() {
            return Err(ConfigError::InvalidSecret {
                name: "JWT_REFRESH_SECRET".to_string(),
                reason: "must differ from JWT_ACCESS_SECRET".to_string(),
            });
        }
        if self.identifier_key.len() != IDENTIFIER_KEY_LEN {
            return Err(ConfigError::InvalidSecret {
                name: "JWT_ENCODE_ID_SECRET".to_string(),
                reason: format!(
                    "must be {IDENTIFIER_KEY_LEN} bytes for AES-256, got {}",
                    self.identifier_key.len()
                ),
            });
        }

        let l = &self.lifetimes;
        if l.access.is_zero() {
            return Err(ConfigError::InvalidTtl {
                name: "TTL_ACCESS".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if l.access >= l.refresh_short {
            return Err(ConfigError::InvalidTtl {
                name: "TTL_REFRESH_SHORT".to_string(),
                reason: "must be longer than TTL_ACCESS".to_string(),
            });
        }
        if l.refresh_short >= l.refresh_long {
            return Err(ConfigError::InvalidTtl {
                name: "TTL_REFRESH_LONG".to_string(),
                reason: "must be longer than TTL_REFRESH_SHORT".to_string(),
            });
        }
        Ok(())
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Session core settings
    pub session: SessionConfig,
}

impl Config {
    /// Load configuration from `.env` and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let lifetimes = Lifetimes {
            access: Duration::from_secs(parse_var(&get, "TTL_ACCESS", 600)?),
            refresh_short: Duration::from_secs(parse_var(&get, "TTL_REFRESH_SHORT", 86_400)?),
            refresh_long: Duration::from_secs(parse_var(&get, "TTL_REFRESH_LONG", 604_800)?),
        };

        let environment = get("ENVIRONMENT")
            .map_or(Environment::Local, |v| v.parse().unwrap_or(Environment::Local));

        let session = SessionConfig::new(
            get("JWT_ACCESS_SECRET").unwrap_or_default(),
            get("JWT_REFRESH_SECRET").unwrap_or_default(),
            get("JWT_ENCODE_ID_SECRET").unwrap_or_default(),
            lifetimes,
        )
        .with_cookie_domain(get("COOKIE_DOMAIN").unwrap_or_default())
        .with_environment(environment);

        let config = Self {
            host: get("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_var(&get, "SERVER_PORT", 8080)?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "debug".to_string()),
            session,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        self.session.validate()
    }

    /// `host:port` to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a variable with a default value.
fn parse_var<T, G>(get: &G, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

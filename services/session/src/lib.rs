//! Session service library.
//!
//! Cookie-based session authentication: encrypted user identifiers carried in
//! HS256 access and refresh tokens, with transparent access rotation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod http;
pub mod jwt;
pub mod login;
pub mod observability;
pub mod session;

// Re-exports for convenience
pub use config::Config;
pub use error::SessionError;
pub use session::{AuthOutcome, CredentialIssuer, SessionGate};

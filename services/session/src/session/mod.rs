//! Session lifecycle: issuance, per-request gating and client directives.

pub mod cookie;
pub mod gate;
pub mod issuer;

pub use cookie::{CookieDirective, CookieSettings, SessionArtifacts, COOKIE_PATH};
pub use gate::{Admission, AuthOutcome, Rejection, SessionGate};
pub use issuer::{CredentialIssuer, CredentialPair, IssuedToken};

//! Session token claims, classes and the HS256 codec.

pub mod claims;
pub mod class;
pub mod codec;

pub use claims::{SessionClaims, ISSUER};
pub use class::{Lifetimes, RefreshTier, TokenClass};
pub use codec::{SignedToken, TokenCodec};

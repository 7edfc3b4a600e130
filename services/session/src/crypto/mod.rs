//! Symmetric encryption of user identifiers embedded in session tokens.

pub mod identifier;

pub use identifier::{EncryptedIdentifier, IdentifierCodec, UserId, IDENTIFIER_KEY_LEN, NONCE_LEN};

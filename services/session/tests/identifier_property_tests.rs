//! Property-based tests for the identifier codec.

use base64::{engine::general_purpose::STANDARD, Engine};
use proptest::prelude::*;
use session_service::crypto::{IdentifierCodec, UserId, NONCE_LEN};
use session_service::SessionError;

const KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

fn codec() -> IdentifierCodec {
    IdentifierCodec::new(KEY).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any identifier decodes back to itself.
    #[test]
    fn prop_identifier_round_trip(id in any::<i64>()) {
        let codec = codec();
        let encoded = codec.encode(UserId::new(id)).unwrap();
        prop_assert_eq!(codec.decode(encoded.as_str()).unwrap(), UserId::new(id));
    }

    /// Two encodings of the same identifier never share nonce or output.
    #[test]
    fn prop_nonce_freshness(id in any::<i64>()) {
        let codec = codec();
        let a = codec.encode(UserId::new(id)).unwrap();
        let b = codec.encode(UserId::new(id)).unwrap();
        prop_assert_ne!(a.as_str(), b.as_str());

        let a = STANDARD.decode(a.as_str()).unwrap();
        let b = STANDARD.decode(b.as_str()).unwrap();
        prop_assert_ne!(&a[..NONCE_LEN], &b[..NONCE_LEN]);
    }

    /// Flipping any bit of the nonce, ciphertext or tag fails authentication.
    #[test]
    fn prop_tamper_detection(id in any::<i64>(), index in any::<prop::sample::Index>(), bit in 0u8..8) {
        let codec = codec();
        let encoded = codec.encode(UserId::new(id)).unwrap();
        let mut raw = STANDARD.decode(encoded.as_str()).unwrap();
        let i = index.index(raw.len());
        raw[i] ^= 1 << bit;

        let result = codec.decode(&STANDARD.encode(&raw));
        prop_assert!(matches!(result, Err(SessionError::AuthenticationFailed)));
    }

    /// A codec under another key rejects every identifier.
    #[test]
    fn prop_foreign_key_rejected(id in any::<i64>(), other in prop::array::uniform32(any::<u8>())) {
        prop_assume!(&other != KEY);
        let encoded = codec().encode(UserId::new(id)).unwrap();
        let foreign = IdentifierCodec::new(&other).unwrap();
        prop_assert!(matches!(
            foreign.decode(encoded.as_str()),
            Err(SessionError::AuthenticationFailed)
        ));
    }

    /// Keys of any length other than 32 bytes are refused.
    #[test]
    fn prop_key_length_enforced(key in prop::collection::vec(any::<u8>(), 0..64)) {
        prop_assume!(key.len() != 32);
        prop_assert!(matches!(
            IdentifierCodec::new(&key),
            Err(SessionError::Configuration(_))
        ));
    }
}

#[test]
fn test_short_input_is_malformed() {
    let short = STANDARD.encode([0u8; NONCE_LEN - 1]);
    assert!(matches!(
        codec().decode(&short),
        Err(SessionError::MalformedToken { .. })
    ));
}

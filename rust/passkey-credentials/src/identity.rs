//! Fixed-width on-chain references for variable-length credential ids.

use alloy_primitives::{B256, U256, keccak256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 256-bit key identifier: `keccak256(utf8(key_id))` read as a big-endian
/// unsigned integer.
///
/// Credential ids are opaque, authenticator-chosen and of varying length.
/// The account contract indexes keys by this identifier instead. It is an
/// index, not a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyIdentifier(U256);

impl KeyIdentifier {
    /// Derive the identifier for `key_id`.
    #[must_use]
    pub fn derive(key_id: &str) -> Self {
        Self(U256::from_be_bytes(keccak256(key_id.as_bytes()).0))
    }

    /// Wrap an identifier read back from an encoded payload.
    #[must_use]
    pub const fn from_u256(value: U256) -> Self {
        Self(value)
    }

    /// The identifier as an integer.
    #[must_use]
    pub const fn as_u256(&self) -> U256 {
        self.0
    }
}

impl From<KeyIdentifier> for U256 {
    fn from(identifier: KeyIdentifier) -> Self {
        identifier.0
    }
}

impl fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", B256::from(self.0.to_be_bytes::<32>()))
    }
}

/// Derive the on-chain identifier for a credential id.
#[must_use]
pub fn derive_identifier(key_id: &str) -> KeyIdentifier {
    KeyIdentifier::derive(key_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_matches_the_keccak_of_the_key_id() {
        // keccak256("") is the well-known empty-input digest
        assert_eq!(
            derive_identifier("").to_string(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn it_is_deterministic() {
        let key_id = "KEbWNCc7NgaYnUyrNeFGX9_3Y-8oJVJYS9E6KpnbCzY";
        assert_eq!(derive_identifier(key_id), derive_identifier(key_id));
        assert_eq!(
            derive_identifier(key_id).as_u256(),
            U256::from_be_bytes(keccak256(key_id).0)
        );
        assert_ne!(derive_identifier(key_id), derive_identifier("another-credential"));
    }

    #[test]
    fn it_serializes_as_a_quantity() {
        let identifier = derive_identifier("");
        let json = serde_json::to_string(&identifier).unwrap();
        let restored: KeyIdentifier = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, identifier);
    }
}

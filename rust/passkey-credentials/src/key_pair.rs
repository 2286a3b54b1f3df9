//! The identity bound to one registered passkey credential.

use crate::{codec::PublicKeyCoordinates, identity::KeyIdentifier};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Optional descriptive data captured at registration time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetadata {
    /// Human-readable name the credential was registered under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Authenticator model identifier (AAGUID).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aaguid: Option<String>,
    /// Registration time, in seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<u64>,
}

/// A registered passkey: its credential id, the identifier the account
/// contract knows it by, and its P-256 public key.
///
/// The identifier is always derived from `key_id`; it is never stored
/// independently. A deserialized key pair re-derives it, so two key pairs
/// with the same `key_id` always agree on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredKeyPair")]
pub struct KeyPair {
    key_id: String,
    key_identifier: KeyIdentifier,
    public_key: PublicKeyCoordinates,
    #[serde(default)]
    metadata: KeyMetadata,
}

impl KeyPair {
    /// Bind a credential id to its public key.
    #[must_use]
    pub fn new(key_id: impl Into<String>, public_key: PublicKeyCoordinates) -> Self {
        let key_id = key_id.into();
        Self {
            key_identifier: KeyIdentifier::derive(&key_id),
            key_id,
            public_key,
            metadata: KeyMetadata::default(),
        }
    }

    /// Attach registration metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: KeyMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// The authenticator-assigned credential id (base64url).
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// The on-chain key reference.
    #[must_use]
    pub const fn key_identifier(&self) -> KeyIdentifier {
        self.key_identifier
    }

    /// The public key coordinates.
    #[must_use]
    pub const fn public_key(&self) -> &PublicKeyCoordinates {
        &self.public_key
    }

    /// The x coordinate of the public key.
    #[must_use]
    pub const fn public_key_x(&self) -> U256 {
        self.public_key.x
    }

    /// The y coordinate of the public key.
    #[must_use]
    pub const fn public_key_y(&self) -> U256 {
        self.public_key.y
    }

    /// Registration metadata.
    #[must_use]
    pub const fn metadata(&self) -> &KeyMetadata {
        &self.metadata
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredKeyPair {
    key_id: String,
    public_key: PublicKeyCoordinates,
    #[serde(default)]
    metadata: KeyMetadata,
}

impl From<StoredKeyPair> for KeyPair {
    fn from(stored: StoredKeyPair) -> Self {
        KeyPair::new(stored.key_id, stored.public_key).with_metadata(stored.metadata)
    }
}

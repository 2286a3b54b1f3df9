//! Binding an operation hash to a WebAuthn challenge and back.
//!
//! The authenticator is asked to sign `base64url(operation_hash)` (no
//! padding). It embeds that string in `clientDataJSON`, hashes the JSON and
//! signs `authenticatorData || SHA-256(clientDataJSON)`. Re-encoding JSON on
//! chain is expensive, so instead the JSON is cut into the part before and the
//! part after the challenge; the contract splices its own challenge back in
//! between the two and hashes the result.

use crate::error::CredentialError;
use alloy_primitives::B256;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of the challenge string for a 32-byte hash.
pub const CHALLENGE_LENGTH: usize = 43;

/// Derive the challenge string the authenticator is asked to sign.
#[must_use]
pub fn derive_challenge(operation_hash: &B256) -> String {
    URL_SAFE_NO_PAD.encode(operation_hash)
}

/// `clientDataJSON` with the challenge cut out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDataParts {
    /// Everything before the first occurrence of the challenge.
    pub prefix: String,
    /// Everything after the first occurrence of the challenge.
    pub suffix: String,
}

impl ClientDataParts {
    /// Reassemble the full `clientDataJSON` around `challenge`.
    #[must_use]
    pub fn join(&self, challenge: &str) -> String {
        splice(&self.prefix, challenge, &self.suffix)
    }
}

/// `prefix || challenge || suffix` in a single allocation.
pub(crate) fn splice(prefix: &str, challenge: &str, suffix: &str) -> String {
    let mut json = String::with_capacity(prefix.len() + challenge.len() + suffix.len());
    json.push_str(prefix);
    json.push_str(challenge);
    json.push_str(suffix);
    json
}

/// Split `client_data_json` around the first occurrence of `challenge`.
///
/// # Errors
///
/// Returns [`CredentialError::ChallengeNotFound`] if `challenge` is empty or
/// does not occur in `client_data_json`. That means the authenticator signed
/// something other than what was asked for and must not be papered over.
pub fn split_client_data(
    client_data_json: &str,
    challenge: &str,
) -> Result<ClientDataParts, CredentialError> {
    if challenge.is_empty() {
        return Err(CredentialError::ChallengeNotFound);
    }
    let position = client_data_json
        .find(challenge)
        .ok_or(CredentialError::ChallengeNotFound)?;

    Ok(ClientDataParts {
        prefix: client_data_json[..position].to_owned(),
        suffix: client_data_json[position + challenge.len()..].to_owned(),
    })
}

/// `SHA-256(clientDataJSON)`.
#[must_use]
pub fn client_data_hash(client_data_json: &[u8]) -> B256 {
    B256::from_slice(&Sha256::digest(client_data_json))
}

/// The digest an ES256 authenticator signs:
/// `SHA-256(authenticatorData || SHA-256(clientDataJSON))`.
#[must_use]
pub fn message_hash(authenticator_data: &[u8], client_data_json: &[u8]) -> B256 {
    let mut hasher = Sha256::new();
    hasher.update(authenticator_data);
    hasher.update(client_data_hash(client_data_json));
    B256::from_slice(&hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CLIENT_DATA: &str = r#"{"type":"webauthn.get","challenge":"CHALLENGE","origin":"https://example.com","crossOrigin":false}"#;

    #[test]
    fn it_encodes_hashes_as_unpadded_base64url() {
        let hash = B256::repeat_byte(0xff);
        let challenge = derive_challenge(&hash);

        assert_eq!(challenge.len(), CHALLENGE_LENGTH);
        assert!(!challenge.contains('='));
        assert!(!challenge.contains('+') && !challenge.contains('/'));
        assert_eq!(challenge, format!("{}8", "_".repeat(42)));
    }

    #[test]
    fn it_splits_around_the_first_occurrence() {
        let parts = split_client_data(CLIENT_DATA, "CHALLENGE").unwrap();
        assert_eq!(parts.prefix, r#"{"type":"webauthn.get","challenge":""#);
        assert_eq!(
            parts.suffix,
            r#"","origin":"https://example.com","crossOrigin":false}"#
        );
        assert_eq!(parts.join("CHALLENGE"), CLIENT_DATA);

        let twice = split_client_data("aXbXc", "X").unwrap();
        assert_eq!(twice.prefix, "a");
        assert_eq!(twice.suffix, "bXc");
    }

    #[test]
    fn it_reports_a_missing_challenge() {
        assert_eq!(
            split_client_data(CLIENT_DATA, "OTHER"),
            Err(CredentialError::ChallengeNotFound)
        );
        assert_eq!(
            split_client_data(CLIENT_DATA, ""),
            Err(CredentialError::ChallengeNotFound)
        );
    }

    #[test]
    fn it_hashes_authenticator_data_with_the_client_data_digest() {
        let auth_data = [0x01u8; 37];
        let mut signed = auth_data.to_vec();
        signed.extend_from_slice(Sha256::digest(CLIENT_DATA).as_slice());

        assert_eq!(
            message_hash(&auth_data, CLIENT_DATA.as_bytes()),
            B256::from_slice(&Sha256::digest(&signed))
        );
    }

    proptest! {
        #[test]
        fn split_then_join_is_byte_exact(
            hash in prop::array::uniform32(any::<u8>()),
            before in "[ -~]{0,64}",
            after in "[ -~]{0,64}",
        ) {
            let challenge = derive_challenge(&B256::from(hash));
            let json = format!("{before}{challenge}{after}");
            prop_assume!(json.matches(challenge.as_str()).count() == 1);

            let parts = split_client_data(&json, &challenge).unwrap();

            prop_assert_eq!(&parts.prefix, &before);
            prop_assert_eq!(parts.join(&challenge), json);
        }
    }
}

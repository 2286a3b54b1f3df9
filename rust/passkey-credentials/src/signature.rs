//! The structured result of one passkey signing ceremony.
//!
//! A [`PasskeySignature`] carries exactly what the account contract needs to
//! rebuild the authenticator's signed message and verify it:
//!
//! 1. The contract derives the challenge from the operation hash it is
//!    validating and splices it between `client_data_prefix` and
//!    `client_data_suffix`
//! 2. It computes `SHA-256(authenticatorData || SHA-256(clientDataJSON))`
//! 3. It verifies `(r, s)` against the P-256 key registered under
//!    `key_identifier`
//!
//! [`PasskeySignature::verify`] runs the same steps locally.

use crate::{
    challenge::{self, ClientDataParts},
    codec::{EcdsaScalars, PublicKeyCoordinates},
    error::CredentialError,
    identity::KeyIdentifier,
    key_pair::KeyPair,
};
use alloy_primitives::{B256, Bytes, U256};
use alloy_sol_types::SolValue;
use p256::{
    FieldBytes,
    ecdsa::{Signature, signature::hazmat::PrehashVerifier as _},
};
use serde::{Deserialize, Serialize};

/// ABI layout of the signature field:
/// `(uint256 identifier, uint256 r, uint256 s, bytes authenticatorData,
/// string clientDataPrefix, string clientDataSuffix)`.
type EncodedSignature = (U256, U256, U256, Bytes, String, String);

/// A decoded, contract-ready passkey signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasskeySignature {
    /// Identifier of the key that signed.
    pub key_identifier: KeyIdentifier,
    /// ECDSA `r`, without DER sign padding.
    pub r: U256,
    /// ECDSA `s`, without DER sign padding.
    pub s: U256,
    /// Raw authenticator data, passed through untouched.
    pub authenticator_data: Bytes,
    /// `clientDataJSON` up to the challenge.
    pub client_data_prefix: String,
    /// `clientDataJSON` after the challenge.
    pub client_data_suffix: String,
}

impl PasskeySignature {
    /// Assemble a signature from its decoded parts.
    #[must_use]
    pub fn new(
        key_identifier: KeyIdentifier,
        scalars: EcdsaScalars,
        authenticator_data: impl Into<Bytes>,
        client_data: ClientDataParts,
    ) -> Self {
        Self {
            key_identifier,
            r: scalars.r,
            s: scalars.s,
            authenticator_data: authenticator_data.into(),
            client_data_prefix: client_data.prefix,
            client_data_suffix: client_data.suffix,
        }
    }

    /// The `(r, s)` pair.
    #[must_use]
    pub const fn scalars(&self) -> EcdsaScalars {
        EcdsaScalars {
            r: self.r,
            s: self.s,
        }
    }

    /// Reassemble the `clientDataJSON` the authenticator hashed.
    #[must_use]
    pub fn client_data_json(&self, challenge: &str) -> String {
        challenge::splice(&self.client_data_prefix, challenge, &self.client_data_suffix)
    }

    /// The digest covered by `(r, s)` when `challenge` is spliced back in.
    #[must_use]
    pub fn message_hash(&self, challenge: &str) -> B256 {
        challenge::message_hash(
            &self.authenticator_data,
            self.client_data_json(challenge).as_bytes(),
        )
    }

    /// Verify the signature over `challenge` with the public key of
    /// `key_pair`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidSignature`] if the signature was
    /// made by a different key, over a different challenge, or if the
    /// scalars are not a valid P-256 signature. Returns
    /// [`CredentialError::InvalidKeyFormat`] if the key is not on the curve.
    pub fn verify(&self, challenge: &str, key_pair: &KeyPair) -> Result<(), CredentialError> {
        if self.key_identifier != key_pair.key_identifier() {
            return Err(CredentialError::InvalidSignature(format!(
                "signed by key {} but verified against {}",
                self.key_identifier,
                key_pair.key_identifier()
            )));
        }
        self.verify_with_key(challenge, key_pair.public_key())
    }

    /// Verify the signature over `challenge` against raw coordinates.
    ///
    /// # Errors
    ///
    /// See [`PasskeySignature::verify`].
    pub fn verify_with_key(
        &self,
        challenge: &str,
        public_key: &PublicKeyCoordinates,
    ) -> Result<(), CredentialError> {
        let key = public_key.to_verifying_key()?;
        let r: FieldBytes = self.r.to_be_bytes::<32>().into();
        let s: FieldBytes = self.s.to_be_bytes::<32>().into();
        let signature = Signature::from_scalars(r, s)
            .map_err(|e| CredentialError::InvalidSignature(e.to_string()))?;

        key.verify_prehash(self.message_hash(challenge).as_slice(), &signature)
            .map_err(|e| CredentialError::InvalidSignature(e.to_string()))
    }

    /// ABI-encode the signature as the account contract expects it.
    #[must_use]
    pub fn abi_encode(&self) -> Bytes {
        let encoded: EncodedSignature = (
            self.key_identifier.as_u256(),
            self.r,
            self.s,
            self.authenticator_data.clone(),
            self.client_data_prefix.clone(),
            self.client_data_suffix.clone(),
        );
        encoded.abi_encode_params().into()
    }

    /// Decode an ABI-encoded signature field.
    ///
    /// The key identifier is taken as-is; it cannot be checked without the
    /// credential id it was derived from.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidKeyFormat`] if `data` is not the
    /// expected ABI layout.
    pub fn abi_decode(data: &[u8]) -> Result<Self, CredentialError> {
        let (identifier, r, s, authenticator_data, client_data_prefix, client_data_suffix) =
            EncodedSignature::abi_decode_params(data).map_err(|e| {
                CredentialError::InvalidKeyFormat(format!("malformed signature payload: {e}"))
            })?;

        Ok(Self {
            key_identifier: KeyIdentifier::from_u256(identifier),
            r,
            s,
            authenticator_data,
            client_data_prefix,
            client_data_suffix,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{derive_challenge, split_client_data};
    use crate::codec::decode_signature;
    use p256::ecdsa::{SigningKey, signature::hazmat::PrehashSigner as _};
    use sha2::{Digest, Sha256};

    fn build_client_data_json(challenge: &str) -> String {
        serde_json::json!({
            "type": "webauthn.get",
            "challenge": challenge,
            "origin": "https://example.com",
            "crossOrigin": false
        })
        .to_string()
    }

    /// rpIdHash (32) | flags (1) | signCount (4)
    fn build_authenticator_data() -> Vec<u8> {
        let mut auth_data = Sha256::digest(b"example.com").to_vec();
        auth_data.push(0x05);
        auth_data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
        auth_data
    }

    fn create_test_fixture(operation_hash: B256) -> (KeyPair, String, PasskeySignature) {
        let sk = SigningKey::from_bytes(&[42u8; 32].into()).unwrap();
        let key_pair = KeyPair::new(
            "fixture-credential",
            PublicKeyCoordinates::from(sk.verifying_key()),
        );

        let challenge = derive_challenge(&operation_hash);
        let client_data_json = build_client_data_json(&challenge);
        let authenticator_data = build_authenticator_data();

        let digest = challenge::message_hash(&authenticator_data, client_data_json.as_bytes());
        let ecdsa: Signature = sk.sign_prehash(digest.as_slice()).unwrap();
        let der = ecdsa.to_der();

        let signature = PasskeySignature::new(
            key_pair.key_identifier(),
            decode_signature(der.as_bytes()).unwrap(),
            authenticator_data,
            split_client_data(&client_data_json, &challenge).unwrap(),
        );
        (key_pair, challenge, signature)
    }

    #[test]
    fn it_reassembles_the_client_data() {
        let (_, challenge, signature) = create_test_fixture(B256::repeat_byte(0x11));
        assert_eq!(
            signature.client_data_json(&challenge),
            build_client_data_json(&challenge)
        );

        let parts = ClientDataParts {
            prefix: signature.client_data_prefix.clone(),
            suffix: signature.client_data_suffix.clone(),
        };
        assert_eq!(parts.join(&challenge), signature.client_data_json(&challenge));
    }

    #[test]
    fn it_verifies_a_valid_signature() {
        let (key_pair, challenge, signature) = create_test_fixture(B256::repeat_byte(0x22));
        signature.verify(&challenge, &key_pair).unwrap();
    }

    #[test]
    fn it_rejects_a_different_challenge() {
        let (key_pair, _, signature) = create_test_fixture(B256::repeat_byte(0x33));
        let other = derive_challenge(&B256::repeat_byte(0x34));
        assert!(matches!(
            signature.verify(&other, &key_pair),
            Err(CredentialError::InvalidSignature(_))
        ));
    }

    #[test]
    fn it_rejects_a_different_key() {
        let (_, challenge, signature) = create_test_fixture(B256::repeat_byte(0x44));
        let other_sk = SigningKey::from_bytes(&[99u8; 32].into()).unwrap();
        let other = PublicKeyCoordinates::from(other_sk.verifying_key());

        assert!(signature.verify_with_key(&challenge, &other).is_err());
    }

    #[test]
    fn it_rejects_a_mismatched_key_identifier() {
        let (key_pair, challenge, signature) = create_test_fixture(B256::repeat_byte(0x55));
        let renamed = KeyPair::new("another-credential", *key_pair.public_key());

        assert!(matches!(
            signature.verify(&challenge, &renamed),
            Err(CredentialError::InvalidSignature(_))
        ));
    }

    #[test]
    fn it_rejects_tampered_authenticator_data() {
        let (key_pair, challenge, mut signature) = create_test_fixture(B256::repeat_byte(0x66));
        let mut auth_data = signature.authenticator_data.to_vec();
        auth_data[0] ^= 0xff;
        signature.authenticator_data = auth_data.into();

        assert!(signature.verify(&challenge, &key_pair).is_err());
    }

    #[test]
    fn it_encodes_in_the_contract_field_order() {
        let (key_pair, _, signature) = create_test_fixture(B256::repeat_byte(0x77));
        let encoded = signature.abi_encode();

        // Six head words, then the three dynamic tails.
        assert_eq!(
            &encoded[0..32],
            &key_pair.key_identifier().as_u256().to_be_bytes::<32>()[..]
        );
        assert_eq!(&encoded[32..64], &signature.r.to_be_bytes::<32>()[..]);
        assert_eq!(&encoded[64..96], &signature.s.to_be_bytes::<32>()[..]);
        assert_eq!(U256::from_be_slice(&encoded[96..128]), U256::from(6 * 32));

        assert_eq!(PasskeySignature::abi_decode(&encoded).unwrap(), signature);
    }

    #[test]
    fn it_rejects_a_truncated_payload() {
        let (_, _, signature) = create_test_fixture(B256::repeat_byte(0x88));
        let encoded = signature.abi_encode();
        assert!(PasskeySignature::abi_decode(&encoded[..100]).is_err());
    }
}

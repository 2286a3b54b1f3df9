//! One authenticator round trip in, one contract-ready signature out.

use crate::{
    authenticator::{
        AuthenticationRequest, Authenticator, ES256, RegistrationOptions, RegistrationRequest,
        UserVerification,
    },
    challenge::{derive_challenge, split_client_data},
    codec::{decode_public_key, decode_signature},
    error::{AuthenticatorError, CredentialError},
    key_pair::{KeyMetadata, KeyPair},
    platform,
    signature::PasskeySignature,
};
use alloy_primitives::B256;
use std::fmt;
use tracing::{debug, instrument, trace};

/// Progress of a single [`PasskeySigningAdapter::sign`] call.
///
/// Stages only move forward. A failure at any stage ends the call without a
/// signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SigningStage {
    /// Nothing has happened yet.
    Idle,
    /// The challenge string has been derived from the operation hash.
    ChallengeDerived,
    /// Waiting for the user / authenticator.
    AwaitingAuthenticator,
    /// The authenticator answered.
    ResponseReceived,
    /// Signature scalars and client data have been decoded.
    Decoded,
    /// The signature has been assembled.
    Complete,
}

impl fmt::Display for SigningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::ChallengeDerived => "challenge_derived",
            Self::AwaitingAuthenticator => "awaiting_authenticator",
            Self::ResponseReceived => "response_received",
            Self::Decoded => "decoded",
            Self::Complete => "complete",
        })
    }
}

fn advance(stage: &mut SigningStage, next: SigningStage) {
    debug_assert!(next > *stage, "signing stage moved from {stage} to {next}");
    debug!(from = %stage, to = %next, "signing stage");
    *stage = next;
}

/// Turns an [`Authenticator`] into a source of [`PasskeySignature`]s over
/// operation hashes.
///
/// The adapter holds no state besides the authenticator, so a single adapter
/// can serve concurrent calls for different key pairs.
#[derive(Debug, Clone)]
pub struct PasskeySigningAdapter<A> {
    authenticator: A,
}

impl<A> PasskeySigningAdapter<A>
where
    A: Authenticator,
{
    /// Wrap an authenticator.
    pub const fn new(authenticator: A) -> Self {
        Self { authenticator }
    }

    /// The wrapped authenticator.
    pub const fn authenticator(&self) -> &A {
        &self.authenticator
    }

    /// Ask the authenticator to sign `operation_hash` with `key_pair` and
    /// decode the assertion.
    ///
    /// The authenticator call is awaited without a timeout. Dropping the
    /// returned future abandons the ceremony.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::AuthenticatorDeclined`] if the authenticator
    ///   fails, or answers with a different credential
    /// - [`CredentialError::InvalidKeyFormat`] if the signature is not DER
    /// - [`CredentialError::InvalidClientData`] if `clientDataJSON` is not
    ///   UTF-8
    /// - [`CredentialError::ChallengeNotFound`] if `clientDataJSON` does not
    ///   carry the challenge
    #[instrument(skip_all, fields(key_id = %key_pair.key_id(), %operation_hash), err)]
    pub async fn sign(
        &self,
        key_pair: &KeyPair,
        operation_hash: B256,
    ) -> Result<PasskeySignature, CredentialError> {
        let mut stage = SigningStage::Idle;

        let challenge = derive_challenge(&operation_hash);
        advance(&mut stage, SigningStage::ChallengeDerived);
        trace!(%challenge, "derived challenge");

        advance(&mut stage, SigningStage::AwaitingAuthenticator);
        let response = self
            .authenticator
            .authenticate(AuthenticationRequest {
                challenge: challenge.clone(),
                credential_id: Some(key_pair.key_id().to_owned()),
                user_verification: UserVerification::Required,
            })
            .await?;
        advance(&mut stage, SigningStage::ResponseReceived);

        if response.credential_id != key_pair.key_id() {
            return Err(AuthenticatorError::InvalidResponse(format!(
                "asked for credential {} but {} signed",
                key_pair.key_id(),
                response.credential_id
            ))
            .into());
        }
        trace!(
            signature = response.signature.len(),
            client_data = response.client_data_json.len(),
            authenticator_data = response.authenticator_data.len(),
            "assertion sizes"
        );

        let scalars = decode_signature(&response.signature)?;
        let client_data_json = String::from_utf8(response.client_data_json)
            .map_err(|e| CredentialError::InvalidClientData(e.to_string()))?;
        let client_data = split_client_data(&client_data_json, &challenge)?;
        advance(&mut stage, SigningStage::Decoded);

        let signature = PasskeySignature::new(
            key_pair.key_identifier(),
            scalars,
            response.authenticator_data,
            client_data,
        );
        advance(&mut stage, SigningStage::Complete);

        Ok(signature)
    }

    /// Register a new passkey and return its key pair.
    ///
    /// A random 32-byte challenge is used unless `options` carries one.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::AuthenticatorDeclined`] if the authenticator
    ///   fails or no randomness is available for the challenge
    /// - [`CredentialError::InvalidKeyFormat`] if the credential is not an
    ///   ES256 key
    #[instrument(skip_all, fields(user = %options.user_name), err)]
    pub async fn register(&self, options: RegistrationOptions) -> Result<KeyPair, CredentialError> {
        let challenge = match options.challenge {
            Some(challenge) => challenge,
            None => platform::random_bytes::<32>()
                .map_err(|e| AuthenticatorError::Device(format!("no randomness: {e}")))?
                .to_vec(),
        };
        let user_display_name = options
            .display_name
            .clone()
            .unwrap_or_else(|| options.user_name.clone());

        debug!("awaiting authenticator");
        let response = self
            .authenticator
            .register(RegistrationRequest {
                challenge,
                user_id: options.user_id,
                user_name: options.user_name,
                user_display_name,
                user_verification: UserVerification::Required,
            })
            .await?;

        if response.algorithm != ES256 {
            return Err(CredentialError::InvalidKeyFormat(format!(
                "expected ES256 (alg -7), got alg {}",
                response.algorithm
            )));
        }
        let public_key = decode_public_key(&response.public_key)?;

        let metadata = KeyMetadata {
            display_name: options.display_name.or(response.metadata.display_name),
            aaguid: response.metadata.aaguid,
            registered_at: response
                .metadata
                .registered_at
                .or_else(|| Some(platform::unix_seconds())),
        };
        let key_pair = KeyPair::new(response.credential_id, public_key).with_metadata(metadata);
        debug!(
            key_id = key_pair.key_id(),
            key_identifier = %key_pair.key_identifier(),
            "registered passkey"
        );

        Ok(key_pair)
    }
}

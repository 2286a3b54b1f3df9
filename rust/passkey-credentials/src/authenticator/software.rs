//! An in-process authenticator backed by a P-256 signing key.

use super::{
    AuthenticationRequest, AuthenticationResponse, Authenticator, ES256, RegistrationRequest,
    RegistrationResponse, UserVerification,
};
use crate::{
    codec::PublicKeyCoordinates, error::AuthenticatorError, key_pair::KeyMetadata, platform,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use p256::{
    ecdsa::{Signature, SigningKey, VerifyingKey, signature::Signer as _},
    pkcs8::EncodePublicKey,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU32, Ordering};

const FLAG_USER_PRESENT: u8 = 0x01;
const FLAG_USER_VERIFIED: u8 = 0x04;

/// The authenticator model this implementation reports.
pub const SOFTWARE_AAGUID: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientData<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    challenge: &'a str,
    origin: &'a str,
    cross_origin: bool,
}

/// A single-credential authenticator that signs in memory.
///
/// It produces exactly what a platform authenticator would: a DER
/// signature over `authenticatorData || SHA-256(clientDataJSON)`, where
/// `authenticatorData` is `rpIdHash || flags || signCount`.
#[derive(Debug)]
pub struct SoftwareAuthenticator {
    signing_key: SigningKey,
    credential_id: String,
    rp_id: String,
    origin: String,
    sign_count: AtomicU32,
}

impl SoftwareAuthenticator {
    /// Create an authenticator holding a freshly generated key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticatorError::Device`] if no randomness is available.
    pub fn generate() -> Result<Self, AuthenticatorError> {
        loop {
            let secret = platform::random_bytes::<32>()
                .map_err(|e| AuthenticatorError::Device(e.to_string()))?;
            // Rejects zero and values above the group order.
            if let Ok(authenticator) = Self::from_secret_bytes(&secret) {
                return Ok(authenticator);
            }
        }
    }

    /// Create an authenticator from a 32-byte secret scalar.
    ///
    /// The credential id is derived from the public key, so the same secret
    /// always yields the same credential.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticatorError::Device`] if `secret` is not a valid
    /// P-256 scalar.
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Result<Self, AuthenticatorError> {
        let signing_key = SigningKey::from_bytes(secret.into())
            .map_err(|_| AuthenticatorError::Device("invalid P-256 secret".into()))?;
        let point = signing_key.verifying_key().to_encoded_point(false);
        let credential_id = URL_SAFE_NO_PAD.encode(&Sha256::digest(point.as_bytes())[..16]);

        Ok(Self {
            signing_key,
            credential_id,
            rp_id: "localhost".into(),
            origin: "http://localhost".into(),
            sign_count: AtomicU32::new(0),
        })
    }

    /// Set the relying party id hashed into authenticator data.
    #[must_use]
    pub fn with_rp_id(mut self, rp_id: impl Into<String>) -> Self {
        self.rp_id = rp_id.into();
        self
    }

    /// Set the origin written into `clientDataJSON`.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Replace the credential id.
    #[must_use]
    pub fn with_credential_id(mut self, credential_id: impl Into<String>) -> Self {
        self.credential_id = credential_id.into();
        self
    }

    /// The base64url credential id.
    #[must_use]
    pub fn credential_id(&self) -> &str {
        &self.credential_id
    }

    /// The relying party id.
    #[must_use]
    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }

    /// The verifying half of the held key.
    #[must_use]
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// The public key as curve coordinates.
    #[must_use]
    pub fn public_key(&self) -> PublicKeyCoordinates {
        PublicKeyCoordinates::from(self.verifying_key())
    }

    /// Number of assertions produced so far.
    #[must_use]
    pub fn sign_count(&self) -> u32 {
        self.sign_count.load(Ordering::SeqCst)
    }

    fn authenticator_data(&self, user_verification: UserVerification, count: u32) -> Vec<u8> {
        let mut flags = FLAG_USER_PRESENT;
        if user_verification != UserVerification::Discouraged {
            flags |= FLAG_USER_VERIFIED;
        }
        let mut data = Vec::with_capacity(37);
        data.extend_from_slice(&Sha256::digest(self.rp_id.as_bytes()));
        data.push(flags);
        data.extend_from_slice(&count.to_be_bytes());
        data
    }

    fn client_data_json(
        &self,
        kind: &'static str,
        challenge: &str,
    ) -> Result<Vec<u8>, AuthenticatorError> {
        serde_json::to_vec(&ClientData {
            kind,
            challenge,
            origin: &self.origin,
            cross_origin: false,
        })
        .map_err(|e| AuthenticatorError::Device(e.to_string()))
    }
}

impl Authenticator for SoftwareAuthenticator {
    async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationResponse, AuthenticatorError> {
        if request.challenge.is_empty() {
            return Err(AuthenticatorError::NotAllowed(
                "registration challenge is empty".into(),
            ));
        }
        let public_key = self
            .verifying_key()
            .to_public_key_der()
            .map_err(|e| AuthenticatorError::Device(e.to_string()))?;

        Ok(RegistrationResponse {
            credential_id: self.credential_id.clone(),
            public_key: public_key.as_bytes().to_vec(),
            algorithm: ES256,
            metadata: KeyMetadata {
                display_name: Some(request.user_display_name),
                aaguid: Some(SOFTWARE_AAGUID.into()),
                registered_at: None,
            },
        })
    }

    async fn authenticate(
        &self,
        request: AuthenticationRequest,
    ) -> Result<AuthenticationResponse, AuthenticatorError> {
        if let Some(credential_id) = &request.credential_id {
            if *credential_id != self.credential_id {
                return Err(AuthenticatorError::CredentialNotFound);
            }
        }

        let count = self.sign_count.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        let authenticator_data = self.authenticator_data(request.user_verification, count);
        let client_data_json = self.client_data_json("webauthn.get", &request.challenge)?;

        let mut signed = authenticator_data.clone();
        signed.extend_from_slice(&Sha256::digest(&client_data_json));
        let signature: Signature = self.signing_key.sign(&signed);

        Ok(AuthenticationResponse {
            credential_id: self.credential_id.clone(),
            signature: signature.to_der().as_bytes().to_vec(),
            client_data_json,
            authenticator_data,
        })
    }
}

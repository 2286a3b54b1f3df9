//! The authenticator capability: whatever holds the passkey and runs the
//! WebAuthn ceremonies.
//!
//! Implementations:
//! - [`SoftwareAuthenticator`]: an in-process P-256 key producing
//!   WebAuthn-shaped assertions, for tests and local development
//! - `BrowserAuthenticator`: `navigator.credentials` on
//!   `wasm32-unknown-unknown`
//!
//! Responses that arrive already serialized by a browser client library can be
//! read with [`RegistrationEncoded`] and [`AuthenticationEncoded`].

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
mod browser;
mod encoded;
mod software;

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
pub use browser::*;
pub use encoded::*;
pub use software::*;

use crate::{
    error::AuthenticatorError,
    key_pair::KeyMetadata,
    platform::{ConditionalSend, ConditionalSync},
};
use serde::{Deserialize, Serialize};

/// COSE algorithm identifier for ES256 (ECDSA P-256 with SHA-256).
pub const ES256: i64 = -7;

/// Whether the authenticator must verify the user (biometric / PIN).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerification {
    /// The ceremony fails unless the user is verified.
    #[default]
    Required,
    /// Verify the user if the authenticator can.
    Preferred,
    /// Do not verify the user.
    Discouraged,
}

impl UserVerification {
    /// The WebAuthn string value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Preferred => "preferred",
            Self::Discouraged => "discouraged",
        }
    }
}

/// Caller-facing options for registering a new passkey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    /// An opaque user identifier (unique per user on the relying party).
    pub user_id: Vec<u8>,
    /// The user's account name.
    pub user_name: String,
    /// A human-readable display name, also recorded on the key pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Registration challenge. A random one is drawn when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<Vec<u8>>,
}

impl RegistrationOptions {
    /// Options for `user_name`, using its UTF-8 bytes as the user id.
    pub fn new(user_name: impl Into<String>) -> Self {
        let user_name = user_name.into();
        Self {
            user_id: user_name.as_bytes().to_vec(),
            user_name,
            display_name: None,
            challenge: None,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Use a fixed registration challenge.
    #[must_use]
    pub fn with_challenge(mut self, challenge: impl Into<Vec<u8>>) -> Self {
        self.challenge = Some(challenge.into());
        self
    }
}

/// What an authenticator is asked to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    /// Raw challenge bytes.
    pub challenge: Vec<u8>,
    /// User identifier.
    pub user_id: Vec<u8>,
    /// User account name.
    pub user_name: String,
    /// User display name.
    pub user_display_name: String,
    /// User verification requirement.
    pub user_verification: UserVerification,
}

/// What an authenticator hands back after creating a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationResponse {
    /// base64url credential id.
    pub credential_id: String,
    /// The public key, SPKI, COSE_Key or SEC1 encoded.
    pub public_key: Vec<u8>,
    /// COSE algorithm identifier of the key.
    pub algorithm: i64,
    /// Whatever the authenticator reports about itself.
    pub metadata: KeyMetadata,
}

/// What an authenticator is asked to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationRequest {
    /// The base64url challenge string, as it must appear in `clientDataJSON`.
    pub challenge: String,
    /// Restrict the ceremony to this credential.
    pub credential_id: Option<String>,
    /// User verification requirement.
    pub user_verification: UserVerification,
}

/// The raw output of an assertion ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResponse {
    /// base64url id of the credential that signed.
    pub credential_id: String,
    /// DER-encoded ECDSA signature.
    pub signature: Vec<u8>,
    /// UTF-8 `clientDataJSON`.
    pub client_data_json: Vec<u8>,
    /// Raw authenticator data.
    pub authenticator_data: Vec<u8>,
}

/// A passkey holder able to run WebAuthn registration and assertion
/// ceremonies.
///
/// Both methods are suspension points that may wait on a user gesture for an
/// unbounded time. Dropping the returned future abandons the ceremony.
pub trait Authenticator: ConditionalSync {
    /// Create a new ES256 credential.
    fn register(
        &self,
        request: RegistrationRequest,
    ) -> impl Future<Output = Result<RegistrationResponse, AuthenticatorError>> + ConditionalSend;

    /// Sign `request.challenge` with an existing credential.
    fn authenticate(
        &self,
        request: AuthenticationRequest,
    ) -> impl Future<Output = Result<AuthenticationResponse, AuthenticatorError>> + ConditionalSend;
}

impl<A> Authenticator for std::sync::Arc<A>
where
    A: Authenticator,
{
    fn register(
        &self,
        request: RegistrationRequest,
    ) -> impl Future<Output = Result<RegistrationResponse, AuthenticatorError>> + ConditionalSend
    {
        A::register(self, request)
    }

    fn authenticate(
        &self,
        request: AuthenticationRequest,
    ) -> impl Future<Output = Result<AuthenticationResponse, AuthenticatorError>> + ConditionalSend
    {
        A::authenticate(self, request)
    }
}

//! Error types for passkey decoding and signing ceremonies.

use thiserror::Error;

/// Failures reported by an [`Authenticator`](crate::authenticator::Authenticator).
///
/// These are surfaced to callers unchanged (wrapped in
/// [`CredentialError::AuthenticatorDeclined`]). Nothing in this crate retries
/// them, since a retry means prompting the user again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticatorError {
    /// The user dismissed the prompt or the caller aborted the ceremony.
    #[error("ceremony cancelled")]
    Cancelled,

    /// The authenticator or platform refused the request (for example
    /// user verification failed, or the origin is not allowed).
    #[error("authenticator refused the request: {0}")]
    NotAllowed(String),

    /// The requested credential is not held by this authenticator.
    #[error("credential not recognised by the authenticator")]
    CredentialNotFound,

    /// The WebAuthn API is not available in this environment.
    #[error("WebAuthn API not available: {0}")]
    NotAvailable(String),

    /// The device reported an internal failure.
    #[error("authenticator device error: {0}")]
    Device(String),

    /// The authenticator answered with a response that could not be read.
    #[error("malformed authenticator response: {0}")]
    InvalidResponse(String),
}

/// Errors from decoding authenticator output and assembling signatures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// Public-key or signature bytes are structurally invalid, or the key is
    /// not a P-256 point.
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// The `clientDataJSON` returned by the authenticator does not contain
    /// the challenge that was requested.
    #[error("challenge not found in clientDataJSON")]
    ChallengeNotFound,

    /// The `clientDataJSON` is not valid UTF-8.
    #[error("invalid clientDataJSON: {0}")]
    InvalidClientData(String),

    /// The ECDSA signature does not verify against the given key.
    #[error("invalid ECDSA signature: {0}")]
    InvalidSignature(String),

    /// The authenticator call failed (user declined, device error, ...).
    #[error("authenticator declined: {0}")]
    AuthenticatorDeclined(#[from] AuthenticatorError),
}

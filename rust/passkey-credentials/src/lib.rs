//! Passkey (WebAuthn ES256) credentials for P-256 smart-contract accounts.
//!
//! An authenticator answers a signing request with an ASN.1 DER signature,
//! an encoded public key and a `clientDataJSON` blob carrying a base64url
//! challenge. Contracts verifying P-256 signatures want none of these
//! formats. This crate decodes them into raw curve values and re-packs them
//! into a [`PasskeySignature`] that a contract can cheaply check on chain:
//!
//! - [`codec`]: DER signatures and SPKI / COSE / SEC1 keys to scalars and
//!   coordinates
//! - [`challenge`]: operation hash to challenge, and `clientDataJSON` split
//!   around it
//! - [`identity`]: fixed-width identifiers for credential ids
//! - [`authenticator`]: the ceremony capability and its implementations
//! - [`adapter`]: one ceremony in, one [`PasskeySignature`] out

pub mod adapter;
pub mod authenticator;
pub mod challenge;
pub mod codec;
pub mod error;
pub mod identity;
pub mod key_pair;
pub mod platform;
pub mod signature;

pub use adapter::{PasskeySigningAdapter, SigningStage};
pub use authenticator::{Authenticator, RegistrationOptions, SoftwareAuthenticator};
pub use codec::{EcdsaScalars, PublicKeyCoordinates};
pub use error::{AuthenticatorError, CredentialError};
pub use identity::KeyIdentifier;
pub use key_pair::{KeyMetadata, KeyPair};
pub use signature::PasskeySignature;

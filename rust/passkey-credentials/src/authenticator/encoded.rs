//! JSON wire forms of WebAuthn responses, as emitted by browser client
//! libraries: every binary field is a base64url string.

use super::{AuthenticationResponse, ES256, RegistrationResponse};
use crate::{error::AuthenticatorError, key_pair::KeyMetadata};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

/// COSE algorithm identifier for RS256.
const RS256: i64 = -257;

/// Attested credential data is present in authenticator data.
const FLAG_ATTESTED_CREDENTIAL_DATA: u8 = 0x40;

/// `rpIdHash (32) || flags (1) || signCount (4)`.
const AUTHENTICATOR_DATA_HEADER: usize = 37;

/// A registration result in wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationEncoded {
    /// The user name the credential was created for.
    pub username: String,
    /// The new credential.
    pub credential: CredentialEncoded,
    /// base64url authenticator data.
    pub authenticator_data: String,
    /// base64url `clientDataJSON`.
    pub client_data: String,
}

/// The credential part of a [`RegistrationEncoded`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialEncoded {
    /// base64url credential id.
    pub id: String,
    /// base64url SPKI public key.
    pub public_key: String,
    /// JOSE algorithm name (`"ES256"`).
    pub algorithm: String,
}

/// An assertion result in wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationEncoded {
    /// base64url credential id.
    pub credential_id: String,
    /// base64url authenticator data.
    pub authenticator_data: String,
    /// base64url `clientDataJSON`.
    pub client_data: String,
    /// base64url DER signature.
    pub signature: String,
    /// base64url user handle, when the authenticator returned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<String>,
}

impl RegistrationEncoded {
    /// Decode into a typed [`RegistrationResponse`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticatorError::InvalidResponse`] if a field is not
    /// base64url or the algorithm is unknown.
    pub fn decode(&self) -> Result<RegistrationResponse, AuthenticatorError> {
        let algorithm = match self.credential.algorithm.as_str() {
            "ES256" => ES256,
            "RS256" => RS256,
            other => {
                return Err(AuthenticatorError::InvalidResponse(format!(
                    "unknown credential algorithm {other}"
                )));
            }
        };
        let authenticator_data = decode_field("authenticatorData", &self.authenticator_data)?;

        Ok(RegistrationResponse {
            credential_id: self.credential.id.clone(),
            public_key: decode_field("publicKey", &self.credential.public_key)?,
            algorithm,
            metadata: KeyMetadata {
                display_name: Some(self.username.clone()),
                aaguid: aaguid(&authenticator_data),
                registered_at: None,
            },
        })
    }
}

impl AuthenticationEncoded {
    /// Decode into a typed [`AuthenticationResponse`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticatorError::InvalidResponse`] if a field is not
    /// base64url.
    pub fn decode(&self) -> Result<AuthenticationResponse, AuthenticatorError> {
        Ok(AuthenticationResponse {
            credential_id: self.credential_id.clone(),
            signature: decode_field("signature", &self.signature)?,
            client_data_json: decode_field("clientData", &self.client_data)?,
            authenticator_data: decode_field("authenticatorData", &self.authenticator_data)?,
        })
    }
}

impl From<&AuthenticationResponse> for AuthenticationEncoded {
    fn from(response: &AuthenticationResponse) -> Self {
        Self {
            credential_id: response.credential_id.clone(),
            authenticator_data: URL_SAFE_NO_PAD.encode(&response.authenticator_data),
            client_data: URL_SAFE_NO_PAD.encode(&response.client_data_json),
            signature: URL_SAFE_NO_PAD.encode(&response.signature),
            user_handle: None,
        }
    }
}

/// Tolerates trailing `=` padding.
fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, AuthenticatorError> {
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| AuthenticatorError::InvalidResponse(format!("{name} is not base64url: {e}")))
}

/// The AAGUID from attested credential data, formatted as a UUID.
fn aaguid(authenticator_data: &[u8]) -> Option<String> {
    let flags = *authenticator_data.get(32)?;
    if flags & FLAG_ATTESTED_CREDENTIAL_DATA == 0 {
        return None;
    }
    let bytes = authenticator_data.get(AUTHENTICATOR_DATA_HEADER..AUTHENTICATOR_DATA_HEADER + 16)?;
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    Some(format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(authenticator_data: &[u8], algorithm: &str) -> RegistrationEncoded {
        RegistrationEncoded {
            username: "alice".into(),
            credential: CredentialEncoded {
                id: "Y3JlZGVudGlhbA".into(),
                public_key: URL_SAFE_NO_PAD.encode([0x30, 0x59]),
                algorithm: algorithm.into(),
            },
            authenticator_data: URL_SAFE_NO_PAD.encode(authenticator_data),
            client_data: URL_SAFE_NO_PAD.encode(b"{}"),
        }
    }

    #[test]
    fn it_decodes_a_registration_with_attested_data() {
        let mut auth_data = vec![0u8; 32];
        auth_data.push(0x45);
        auth_data.extend_from_slice(&[0, 0, 0, 0]);
        auth_data.extend_from_slice(&[
            0xad, 0xce, 0x00, 0x02, 0x35, 0xbc, 0xc6, 0x0a, 0x64, 0x8b, 0x0b, 0x25, 0xf1, 0xf0,
            0x55, 0x03,
        ]);

        let response = registration(&auth_data, "ES256").decode().unwrap();
        assert_eq!(response.credential_id, "Y3JlZGVudGlhbA");
        assert_eq!(response.public_key, vec![0x30, 0x59]);
        assert_eq!(response.algorithm, ES256);
        assert_eq!(
            response.metadata.aaguid.as_deref(),
            Some("adce0002-35bc-c60a-648b-0b25f1f05503")
        );
        assert_eq!(response.metadata.display_name.as_deref(), Some("alice"));
    }

    #[test]
    fn it_skips_the_aaguid_without_attested_data() {
        let auth_data = [0u8; 37];
        let response = registration(&auth_data, "ES256").decode().unwrap();
        assert_eq!(response.metadata.aaguid, None);
    }

    #[test]
    fn it_rejects_unknown_algorithms() {
        assert!(matches!(
            registration(&[0u8; 37], "EdDSA").decode(),
            Err(AuthenticatorError::InvalidResponse(_))
        ));
    }

    #[test]
    fn it_reads_the_camel_case_wire_shape() {
        let json = r#"{
            "credentialId": "abc",
            "authenticatorData": "AQID",
            "clientData": "e30=",
            "signature": "MAA"
        }"#;
        let encoded: AuthenticationEncoded = serde_json::from_str(json).unwrap();
        let response = encoded.decode().unwrap();

        assert_eq!(response.authenticator_data, vec![1, 2, 3]);
        assert_eq!(response.client_data_json, b"{}".to_vec());
        assert_eq!(response.signature, vec![0x30, 0x00]);
        assert_eq!(AuthenticationEncoded::from(&response).decode().unwrap(), response);
    }

    #[test]
    fn it_rejects_non_base64url_fields() {
        let encoded = AuthenticationEncoded {
            credential_id: "abc".into(),
            authenticator_data: "not+base64/url".into(),
            client_data: "e30".into(),
            signature: "MAA".into(),
            user_handle: None,
        };
        assert!(matches!(
            encoded.decode(),
            Err(AuthenticatorError::InvalidResponse(_))
        ));
    }
}

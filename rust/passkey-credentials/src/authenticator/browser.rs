//! Passkey ceremonies through the browser's Web Authentication API.
//!
//! Only available on `wasm32-unknown-unknown`. The futures returned here wrap
//! JS promises and are not `Send`, which [`ConditionalSend`] permits on wasm.
//!
//! [`ConditionalSend`]: crate::platform::ConditionalSend

use super::{
    AuthenticationRequest, AuthenticationResponse, Authenticator, ES256, RegistrationRequest,
    RegistrationResponse,
};
use crate::{error::AuthenticatorError, key_pair::KeyMetadata};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use js_sys::{Object, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

/// How long the browser may wait for a user gesture, in milliseconds.
const CEREMONY_TIMEOUT_MS: f64 = 60_000.0;

/// An [`Authenticator`] backed by `navigator.credentials`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserAuthenticator {
    rp_id: String,
    rp_name: String,
}

impl BrowserAuthenticator {
    /// Drive ceremonies for the relying party `rp_id` (typically the page's
    /// domain).
    pub fn new(rp_id: impl Into<String>, rp_name: impl Into<String>) -> Self {
        Self {
            rp_id: rp_id.into(),
            rp_name: rp_name.into(),
        }
    }

    /// The relying party id.
    #[must_use]
    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }
}

impl Authenticator for BrowserAuthenticator {
    /// Calls `navigator.credentials.create()`. Only ES256 credentials are
    /// requested and accepted.
    async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationResponse, AuthenticatorError> {
        let public_key_opts = Object::new();
        js_set(
            &public_key_opts,
            "challenge",
            &Uint8Array::from(request.challenge.as_slice()),
        )?;

        let rp = Object::new();
        js_set(&rp, "id", &JsValue::from_str(&self.rp_id))?;
        js_set(&rp, "name", &JsValue::from_str(&self.rp_name))?;
        js_set(&public_key_opts, "rp", &rp)?;

        let user = Object::new();
        js_set(&user, "id", &Uint8Array::from(request.user_id.as_slice()))?;
        js_set(&user, "name", &JsValue::from_str(&request.user_name))?;
        js_set(
            &user,
            "displayName",
            &JsValue::from_str(&request.user_display_name),
        )?;
        js_set(&public_key_opts, "user", &user)?;

        let params = js_sys::Array::new();
        let param = Object::new();
        js_set(&param, "type", &JsValue::from_str("public-key"))?;
        js_set(&param, "alg", &JsValue::from_f64(ES256 as f64))?;
        params.push(&param);
        js_set(&public_key_opts, "pubKeyCredParams", &params)?;

        let selection = Object::new();
        js_set(&selection, "residentKey", &JsValue::from_str("required"))?;
        js_set(
            &selection,
            "userVerification",
            &JsValue::from_str(request.user_verification.as_str()),
        )?;
        js_set(&public_key_opts, "authenticatorSelection", &selection)?;
        js_set(
            &public_key_opts,
            "timeout",
            &JsValue::from_f64(CEREMONY_TIMEOUT_MS),
        )?;

        let options = Object::new();
        js_set(&options, "publicKey", &public_key_opts)?;
        let credential = call_credentials("create", &options).await?;

        let credential_id = js_get(&credential, "id")?
            .as_string()
            .ok_or_else(|| invalid("credential id is not a string"))?;
        let response = js_get(&credential, "response")?;

        let algorithm = call_method(&response, "getPublicKeyAlgorithm")?
            .as_f64()
            .map(|alg| alg as i64)
            .ok_or_else(|| invalid("public key algorithm is not a number"))?;
        if algorithm != ES256 {
            return Err(AuthenticatorError::NotAllowed(format!(
                "expected ES256 (alg -7), got alg {algorithm}"
            )));
        }

        let spki = call_method(&response, "getPublicKey")?;
        if spki.is_null() || spki.is_undefined() {
            return Err(invalid("authenticator did not return a public key"));
        }

        Ok(RegistrationResponse {
            credential_id,
            public_key: array_buffer_to_vec(&spki),
            algorithm,
            metadata: KeyMetadata {
                display_name: Some(request.user_display_name),
                ..KeyMetadata::default()
            },
        })
    }

    /// Calls `navigator.credentials.get()`. The browser base64url-encodes
    /// the raw challenge bytes into `clientDataJSON`, so the challenge string
    /// is decoded first.
    async fn authenticate(
        &self,
        request: AuthenticationRequest,
    ) -> Result<AuthenticationResponse, AuthenticatorError> {
        let challenge = URL_SAFE_NO_PAD.decode(&request.challenge).map_err(|e| {
            AuthenticatorError::NotAllowed(format!("challenge is not base64url: {e}"))
        })?;

        let public_key_opts = Object::new();
        js_set(
            &public_key_opts,
            "challenge",
            &Uint8Array::from(challenge.as_slice()),
        )?;
        js_set(&public_key_opts, "rpId", &JsValue::from_str(&self.rp_id))?;
        js_set(
            &public_key_opts,
            "userVerification",
            &JsValue::from_str(request.user_verification.as_str()),
        )?;
        js_set(
            &public_key_opts,
            "timeout",
            &JsValue::from_f64(CEREMONY_TIMEOUT_MS),
        )?;

        if let Some(credential_id) = &request.credential_id {
            let raw_id = URL_SAFE_NO_PAD
                .decode(credential_id)
                .map_err(|_| AuthenticatorError::CredentialNotFound)?;
            let descriptor = Object::new();
            js_set(&descriptor, "type", &JsValue::from_str("public-key"))?;
            js_set(&descriptor, "id", &Uint8Array::from(raw_id.as_slice()))?;
            let allow = js_sys::Array::new();
            allow.push(&descriptor);
            js_set(&public_key_opts, "allowCredentials", &allow)?;
        }

        let options = Object::new();
        js_set(&options, "publicKey", &public_key_opts)?;
        let credential = call_credentials("get", &options).await?;

        let credential_id = js_get(&credential, "id")?
            .as_string()
            .ok_or_else(|| invalid("credential id is not a string"))?;
        let response = js_get(&credential, "response")?;

        Ok(AuthenticationResponse {
            credential_id,
            signature: array_buffer_to_vec(&js_get(&response, "signature")?),
            client_data_json: array_buffer_to_vec(&js_get(&response, "clientDataJSON")?),
            authenticator_data: array_buffer_to_vec(&js_get(&response, "authenticatorData")?),
        })
    }
}

/// `navigator.credentials[method](options)`, awaited.
async fn call_credentials(method: &str, options: &Object) -> Result<JsValue, AuthenticatorError> {
    let credentials = credentials_container()?;
    let function: js_sys::Function = js_get(&credentials, method)?
        .dyn_into()
        .map_err(|_| AuthenticatorError::NotAvailable(format!("credentials.{method} missing")))?;
    let promise: js_sys::Promise = function
        .call1(&credentials, options)
        .map_err(|e| dom_error(&e))?
        .unchecked_into();
    let credential = JsFuture::from(promise).await.map_err(|e| dom_error(&e))?;
    if credential.is_null() || credential.is_undefined() {
        return Err(AuthenticatorError::Cancelled);
    }
    Ok(credential)
}

fn credentials_container() -> Result<JsValue, AuthenticatorError> {
    let window = web_sys::window()
        .ok_or_else(|| AuthenticatorError::NotAvailable("no window".into()))?;
    let credentials = window.navigator().credentials();
    if credentials.is_undefined() {
        return Err(AuthenticatorError::NotAvailable(
            "navigator.credentials is undefined".into(),
        ));
    }
    Ok(credentials.into())
}

/// Map a rejected WebAuthn promise (a `DOMException`) onto the error taxonomy.
fn dom_error(error: &JsValue) -> AuthenticatorError {
    let name = Reflect::get(error, &"name".into())
        .ok()
        .and_then(|name| name.as_string())
        .unwrap_or_default();
    let message = Reflect::get(error, &"message".into())
        .ok()
        .and_then(|message| message.as_string())
        .unwrap_or_else(|| format!("{error:?}"));

    match name.as_str() {
        "AbortError" => AuthenticatorError::Cancelled,
        "NotAllowedError" | "SecurityError" => AuthenticatorError::NotAllowed(message),
        "NotSupportedError" => AuthenticatorError::NotAvailable(message),
        _ => AuthenticatorError::Device(message),
    }
}

fn call_method(target: &JsValue, method: &str) -> Result<JsValue, AuthenticatorError> {
    let function: js_sys::Function = js_get(target, method)?
        .dyn_into()
        .map_err(|_| AuthenticatorError::NotAvailable(format!("{method} not supported")))?;
    function.call0(target).map_err(|e| dom_error(&e))
}

fn js_get(target: &JsValue, key: &str) -> Result<JsValue, AuthenticatorError> {
    Reflect::get(target, &JsValue::from_str(key))
        .map_err(|e| invalid(&format!("failed to get '{key}': {e:?}")))
}

fn js_set(target: &Object, key: &str, value: &JsValue) -> Result<(), AuthenticatorError> {
    Reflect::set(target, &JsValue::from_str(key), value)
        .map_err(|e| AuthenticatorError::Device(format!("failed to set '{key}': {e:?}")))?;
    Ok(())
}

/// Convert a JS `ArrayBuffer` (or typed-array view) to `Vec<u8>`.
fn array_buffer_to_vec(value: &JsValue) -> Vec<u8> {
    let array = Uint8Array::new(value);
    let mut bytes = vec![0u8; array.length() as usize];
    array.copy_to(&mut bytes);
    bytes
}

fn invalid(reason: &str) -> AuthenticatorError {
    AuthenticatorError::InvalidResponse(reason.to_owned())
}

#[cfg(all(test, feature = "web-integration-tests"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn it_maps_dom_exceptions() {
        let error = Object::new();
        Reflect::set(&error, &"name".into(), &"AbortError".into()).unwrap();
        assert_eq!(dom_error(&error), AuthenticatorError::Cancelled);

        Reflect::set(&error, &"name".into(), &"NotAllowedError".into()).unwrap();
        Reflect::set(&error, &"message".into(), &"denied".into()).unwrap();
        assert_eq!(
            dom_error(&error),
            AuthenticatorError::NotAllowed("denied".into())
        );
    }
}

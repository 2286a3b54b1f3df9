//! COSE_Key (RFC 9053) decoding for EC2 / ES256 credentials.

use crate::error::CredentialError;
use ciborium::Value;
use p256::{EncodedPoint, FieldBytes, PublicKey, elliptic_curve::sec1::FromEncodedPoint};

const LABEL_KTY: i128 = 1;
const LABEL_ALG: i128 = 3;
const LABEL_CRV: i128 = -1;
const LABEL_X: i128 = -2;
const LABEL_Y: i128 = -3;

const KTY_EC2: i128 = 2;
const ALG_ES256: i128 = -7;
const CRV_P256: i128 = 1;

/// Decode a CBOR-encoded COSE_Key holding a P-256 public key.
pub(super) fn decode(bytes: &[u8]) -> Result<PublicKey, CredentialError> {
    let value: Value = ciborium::from_reader(bytes)
        .map_err(|e| CredentialError::InvalidKeyFormat(format!("invalid COSE key CBOR: {e}")))?;
    let Value::Map(entries) = value else {
        return Err(invalid("COSE key is not a CBOR map"));
    };

    let label = |wanted: i128| {
        entries.iter().find_map(|(key, value)| match key {
            Value::Integer(key) if i128::from(*key) == wanted => Some(value),
            _ => None,
        })
    };
    let integer = |wanted: i128| match label(wanted) {
        Some(Value::Integer(value)) => Some(i128::from(*value)),
        _ => None,
    };
    let coordinate = |wanted: i128| match label(wanted) {
        Some(Value::Bytes(bytes)) => <[u8; 32]>::try_from(bytes.as_slice())
            .ok()
            .map(FieldBytes::from),
        _ => None,
    };

    if integer(LABEL_KTY) != Some(KTY_EC2) {
        return Err(invalid("COSE key type is not EC2"));
    }
    // `alg` is optional in a COSE_Key, but when present it must be ES256.
    if let Some(alg) = integer(LABEL_ALG) {
        if alg != ALG_ES256 {
            return Err(CredentialError::InvalidKeyFormat(format!(
                "expected ES256 (alg -7), got alg {alg}"
            )));
        }
    }
    if integer(LABEL_CRV) != Some(CRV_P256) {
        return Err(invalid("COSE key curve is not P-256"));
    }

    let x = coordinate(LABEL_X).ok_or_else(|| invalid("COSE key is missing the x coordinate"))?;
    let y = coordinate(LABEL_Y).ok_or_else(|| invalid("COSE key is missing the y coordinate"))?;

    let point = EncodedPoint::from_affine_coordinates(&x, &y, false);
    Option::from(PublicKey::from_encoded_point(&point))
        .ok_or_else(|| invalid("COSE key point is not on P-256"))
}

fn invalid(reason: &str) -> CredentialError {
    CredentialError::InvalidKeyFormat(reason.to_owned())
}

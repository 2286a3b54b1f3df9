//! Decoding of authenticator-chosen wire formats into raw curve values.
//!
//! Authenticators hand back ECDSA signatures as ASN.1 DER and public keys in
//! one of several standard encodings. The account contract wants neither: it
//! takes the signature as two 256-bit scalars and the key as the two
//! coordinates of the uncompressed point. Everything here is pure.

mod cose;

use crate::error::CredentialError;
use alloy_primitives::U256;
use p256::{
    EncodedPoint, FieldBytes, PublicKey,
    ecdsa::VerifyingKey,
    elliptic_curve::sec1::ToEncodedPoint,
    pkcs8::{
        DecodePublicKey,
        der::{self, Decode, Reader, SliceReader, asn1::IntRef},
    },
};
use serde::{Deserialize, Serialize};

/// The `(r, s)` pair of an ECDSA P-256 signature as unsigned integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EcdsaScalars {
    /// The `r` component.
    pub r: U256,
    /// The `s` component.
    pub s: U256,
}

impl EcdsaScalars {
    /// Minimal big-endian bytes of `r` (no leading zero bytes).
    #[must_use]
    pub fn r_bytes(&self) -> Vec<u8> {
        self.r.to_be_bytes_trimmed_vec()
    }

    /// Minimal big-endian bytes of `s` (no leading zero bytes).
    #[must_use]
    pub fn s_bytes(&self) -> Vec<u8> {
        self.s.to_be_bytes_trimmed_vec()
    }
}

/// Affine coordinates of an uncompressed P-256 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKeyCoordinates {
    /// The x coordinate.
    pub x: U256,
    /// The y coordinate.
    pub y: U256,
}

impl PublicKeyCoordinates {
    /// Rebuild the P-256 verifying key from the coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidKeyFormat`] if the coordinates are
    /// not a point on P-256.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey, CredentialError> {
        let x: FieldBytes = self.x.to_be_bytes::<32>().into();
        let y: FieldBytes = self.y.to_be_bytes::<32>().into();
        let point = EncodedPoint::from_affine_coordinates(&x, &y, false);
        VerifyingKey::from_encoded_point(&point)
            .map_err(|_| CredentialError::InvalidKeyFormat("point is not on P-256".into()))
    }

    /// The uncompressed SEC1 encoding (`04 || x || y`, 65 bytes).
    #[must_use]
    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(65);
        bytes.push(0x04);
        bytes.extend_from_slice(&self.x.to_be_bytes::<32>());
        bytes.extend_from_slice(&self.y.to_be_bytes::<32>());
        bytes
    }
}

impl From<&PublicKey> for PublicKeyCoordinates {
    fn from(key: &PublicKey) -> Self {
        let point = key.to_encoded_point(false);
        // An uncompressed, non-identity point always carries both coordinates.
        let x = point.x().map(|x| U256::from_be_slice(x)).unwrap_or_default();
        let y = point.y().map(|y| U256::from_be_slice(y)).unwrap_or_default();
        Self { x, y }
    }
}

impl From<&VerifyingKey> for PublicKeyCoordinates {
    fn from(key: &VerifyingKey) -> Self {
        Self::from(&PublicKey::from(key))
    }
}

/// Public-key encodings an authenticator may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublicKeyEncoding {
    /// X.509 `SubjectPublicKeyInfo`, DER encoded. This is what
    /// `AuthenticatorAttestationResponse.getPublicKey()` returns.
    Spki,
    /// A COSE_Key CBOR map, as embedded in attested credential data.
    Cose,
    /// A bare SEC1 point (compressed or uncompressed).
    Sec1,
}

impl PublicKeyEncoding {
    /// Identify the encoding of `bytes` from its leading byte and length.
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        match (bytes.first()?, bytes.len()) {
            (0x30, _) => Some(Self::Spki),
            (0x04, 65) | (0x02 | 0x03, 33) => Some(Self::Sec1),
            // CBOR major type 5 (map)
            (0xa0..=0xbf, _) => Some(Self::Cose),
            _ => None,
        }
    }
}

/// Decode a DER-encoded ECDSA signature into its canonical `(r, s)` scalars.
///
/// # Errors
///
/// Returns [`CredentialError::InvalidKeyFormat`] if `der` is not a DER
/// `SEQUENCE` of two `INTEGER`s sized for P-256.
pub fn decode_signature(der: &[u8]) -> Result<EcdsaScalars, CredentialError> {
    let malformed =
        |e: der::Error| CredentialError::InvalidKeyFormat(format!("malformed DER signature: {e}"));

    let mut reader = SliceReader::new(der).map_err(malformed)?;
    let (r, s) = reader
        .sequence(|sequence| Ok((IntRef::decode(sequence)?, IntRef::decode(sequence)?)))
        .map_err(malformed)?;
    let (r, s) = reader.finish((r, s)).map_err(malformed)?;

    Ok(EcdsaScalars {
        r: scalar_from_der_integer(r.as_bytes())?,
        s: scalar_from_der_integer(s.as_bytes())?,
    })
}

/// Decode a public-key blob into the coordinates of its uncompressed point.
///
/// The encoding is detected with [`PublicKeyEncoding::detect`].
///
/// # Errors
///
/// Returns [`CredentialError::InvalidKeyFormat`] if the encoding is not
/// recognised, the key is not on P-256, or coordinates are missing.
pub fn decode_public_key(encoded: &[u8]) -> Result<PublicKeyCoordinates, CredentialError> {
    let encoding = PublicKeyEncoding::detect(encoded).ok_or_else(|| {
        CredentialError::InvalidKeyFormat("unrecognised public key encoding".into())
    })?;
    decode_public_key_as(encoded, encoding)
}

/// Decode a public-key blob whose encoding is already known.
///
/// # Errors
///
/// Returns [`CredentialError::InvalidKeyFormat`] if `encoded` is not a valid
/// P-256 key in the given encoding.
pub fn decode_public_key_as(
    encoded: &[u8],
    encoding: PublicKeyEncoding,
) -> Result<PublicKeyCoordinates, CredentialError> {
    let key = match encoding {
        PublicKeyEncoding::Spki => PublicKey::from_public_key_der(encoded).map_err(|e| {
            CredentialError::InvalidKeyFormat(format!("SPKI is not a P-256 key: {e}"))
        })?,
        PublicKeyEncoding::Sec1 => PublicKey::from_sec1_bytes(encoded)
            .map_err(|_| CredentialError::InvalidKeyFormat("invalid SEC1 point".into()))?,
        PublicKeyEncoding::Cose => cose::decode(encoded)?,
    };
    Ok(PublicKeyCoordinates::from(&key))
}

/// Drop the `0x00` byte DER puts in front of an INTEGER whose high bit is
/// set. The byte is only a sign marker, so it is removed exactly when byte 0
/// is zero and byte 1 has its high bit set.
#[must_use]
pub fn strip_sign_padding(integer: &[u8]) -> &[u8] {
    match integer {
        [0x00, next, ..] if next & 0x80 != 0 => &integer[1..],
        _ => integer,
    }
}

fn scalar_from_der_integer(integer: &[u8]) -> Result<U256, CredentialError> {
    if integer.first().is_some_and(|byte| byte & 0x80 != 0) {
        return Err(CredentialError::InvalidKeyFormat(
            "negative scalar in DER signature".into(),
        ));
    }
    U256::try_from_be_slice(strip_sign_padding(integer))
        .ok_or_else(|| CredentialError::InvalidKeyFormat("scalar wider than 256 bits".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::{
        ecdsa::{Signature, SigningKey, signature::Signer as _},
        pkcs8::EncodePublicKey,
    };
    use proptest::prelude::*;

    /// Minimal DER INTEGER contents for an unsigned big-endian value.
    fn der_integer(value: &[u8]) -> Vec<u8> {
        let first = value.iter().position(|b| *b != 0).unwrap_or(value.len() - 1);
        let mut out = Vec::new();
        if value[first] & 0x80 != 0 {
            out.push(0x00);
        }
        out.extend_from_slice(&value[first..]);
        out
    }

    fn der_signature(r: &[u8], s: &[u8]) -> Vec<u8> {
        let r = der_integer(r);
        let s = der_integer(s);
        let mut body = vec![0x02, r.len() as u8];
        body.extend_from_slice(&r);
        body.extend_from_slice(&[0x02, s.len() as u8]);
        body.extend_from_slice(&s);
        let mut der = vec![0x30, body.len() as u8];
        der.extend_from_slice(&body);
        der
    }

    #[test]
    fn it_strips_padding_only_before_a_high_bit() {
        assert_eq!(strip_sign_padding(&[0x00, 0x80, 0x01]), &[0x80u8, 0x01][..]);
        assert_eq!(strip_sign_padding(&[0x00, 0x7f, 0x01]), &[0x00u8, 0x7f, 0x01][..]);
        assert_eq!(strip_sign_padding(&[0x01, 0x80]), &[0x01u8, 0x80][..]);
        assert_eq!(strip_sign_padding(&[0x00]), &[0x00u8][..]);
        assert!(strip_sign_padding(&[]).is_empty());
    }

    #[test]
    fn it_decodes_a_padded_r_and_unpadded_s() {
        let mut r = [0x11u8; 32];
        r[0] = 0xf0;
        let mut s = [0x22u8; 32];
        s[0] = 0x05;
        let der = der_signature(&r, &s);
        // r needed a sign byte, s did not
        assert_eq!(der[3], 33);

        let scalars = decode_signature(&der).unwrap();
        assert_eq!(scalars.r, U256::from_be_bytes(r));
        assert_eq!(scalars.s, U256::from_be_bytes(s));
        assert_eq!(scalars.r_bytes(), r.to_vec());
        assert_eq!(scalars.s_bytes(), s.to_vec());
    }

    #[test]
    fn it_matches_signatures_produced_by_p256() {
        let sk = SigningKey::from_bytes(&[42u8; 32].into()).unwrap();
        let signature: Signature = sk.sign(b"payload");
        let der = signature.to_der();

        let scalars = decode_signature(der.as_bytes()).unwrap();
        assert_eq!(scalars.r, U256::from_be_slice(&signature.r().to_bytes()));
        assert_eq!(scalars.s, U256::from_be_slice(&signature.s().to_bytes()));
    }

    #[test]
    fn it_reads_the_raw_integer_bytes_including_the_sign_byte() {
        let mut r = [0x33u8; 32];
        r[0] = 0x80;
        let der = der_signature(&r, &[0x01]);
        // 0x30 len 0x02 0x21 0x00 0x80 ...
        assert_eq!(&der[2..6], &[0x02, 0x21, 0x00, 0x80]);

        let scalars = decode_signature(&der).unwrap();
        assert_eq!(scalars.r_bytes(), r.to_vec());
        assert_eq!(scalars.s, U256::from(1u8));
    }

    #[test]
    fn it_rejects_negative_and_oversized_integers() {
        // r = -1
        assert!(matches!(
            decode_signature(&[0x30, 0x06, 0x02, 0x01, 0xff, 0x02, 0x01, 0x01]),
            Err(CredentialError::InvalidKeyFormat(_))
        ));

        let mut wide = vec![0x01];
        wide.extend_from_slice(&[0x22; 32]);
        assert!(matches!(
            decode_signature(&der_signature(&wide, &[0x01])),
            Err(CredentialError::InvalidKeyFormat(_))
        ));

        // trailing bytes after the SEQUENCE
        let mut trailing = der_signature(&[0x01], &[0x01]);
        trailing.push(0x00);
        assert!(matches!(
            decode_signature(&trailing),
            Err(CredentialError::InvalidKeyFormat(_))
        ));
    }

    #[test]
    fn it_rejects_malformed_der() {
        assert!(matches!(
            decode_signature(&[0x30, 0x02, 0x02, 0x00]),
            Err(CredentialError::InvalidKeyFormat(_))
        ));
        assert!(matches!(
            decode_signature(b"not der at all"),
            Err(CredentialError::InvalidKeyFormat(_))
        ));
    }

    #[test]
    fn it_decodes_spki_and_sec1_to_the_same_coordinates() {
        let sk = SigningKey::from_bytes(&[7u8; 32].into()).unwrap();
        let vk = sk.verifying_key();
        let spki = vk.to_public_key_der().unwrap();
        let uncompressed = vk.to_encoded_point(false);
        let compressed = vk.to_encoded_point(true);

        let from_spki = decode_public_key(spki.as_bytes()).unwrap();
        let from_sec1 = decode_public_key(uncompressed.as_bytes()).unwrap();
        let from_compressed = decode_public_key(compressed.as_bytes()).unwrap();

        assert_eq!(from_spki, from_sec1);
        assert_eq!(from_spki, from_compressed);
        assert_eq!(from_spki.x, U256::from_be_slice(uncompressed.x().unwrap()));
        assert_eq!(from_spki.y, U256::from_be_slice(uncompressed.y().unwrap()));
        assert_eq!(from_spki.to_sec1_bytes(), uncompressed.as_bytes());
        assert_eq!(from_spki.to_verifying_key().unwrap(), *vk);
    }

    #[test]
    fn it_rejects_points_off_the_curve() {
        let off_curve = PublicKeyCoordinates {
            x: U256::from(1u8),
            y: U256::from(1u8),
        };
        assert!(off_curve.to_verifying_key().is_err());
        assert!(decode_public_key(&off_curve.to_sec1_bytes()).is_err());
    }

    #[test]
    fn it_rejects_unknown_encodings() {
        assert_eq!(PublicKeyEncoding::detect(&[]), None);
        assert_eq!(PublicKeyEncoding::detect(&[0x04, 0x01]), None);
        assert!(matches!(
            decode_public_key(&[0x99; 10]),
            Err(CredentialError::InvalidKeyFormat(_))
        ));
    }

    fn scalar() -> impl Strategy<Value = [u8; 32]> {
        // Below the group order (which starts with 0xffffffff) and non-zero.
        (0u8..0xff, prop::array::uniform31(any::<u8>())).prop_map(|(head, tail)| {
            let mut bytes = [0u8; 32];
            bytes[0] = head;
            bytes[1..].copy_from_slice(&tail);
            bytes[31] |= 1;
            bytes
        })
    }

    proptest! {
        #[test]
        fn decoded_scalars_are_minimal_and_repad_to_the_original(r in scalar(), s in scalar()) {
            let scalars = decode_signature(&der_signature(&r, &s)).unwrap();

            for (bytes, original) in [(scalars.r_bytes(), r), (scalars.s_bytes(), s)] {
                prop_assert_ne!(bytes.first(), Some(&0u8));
                let mut padded = [0u8; 32];
                padded[32 - bytes.len()..].copy_from_slice(&bytes);
                prop_assert_eq!(padded, original);
            }
        }
    }
}

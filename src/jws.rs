//! Compact JWS (RFC 7515) signing and verification.
//!
//! Sidetree signed data objects are compact JWSs in `header.payload.signature`
//! form, signed with the protocol's [SIGNATURE_ALGORITHM][sa] (`ES256K`).
//!
//! [sa]: https://identity.foundation/sidetree/spec/v1.0.0/#sig-algorithm

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::jwk::{Algorithm, JWK};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors from k256
    #[error(transparent)]
    CryptoErr(#[from] k256::ecdsa::Error),
    #[error(transparent)]
    JWK(#[from] crate::jwk::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    /// Algorithm in JWS header does not match JWK
    #[error("Algorithm in JWS header does not match JWK")]
    AlgorithmMismatch,
    /// Invalid JWS
    #[error("Invalid JWS")]
    InvalidJWS,
    /// Unsupported algorithm
    #[error("Unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("Invalid signature")]
    InvalidSignature,
}

// RFC 7515 - JSON Web Signature (JWS)

/// Protected header of a compact JWS.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Header {
    #[serde(rename = "alg")]
    pub algorithm: Algorithm,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "kid")]
    pub key_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "typ")]
    pub type_: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    #[serde(flatten)]
    pub additional_parameters: BTreeMap<String, serde_json::Value>,
}

fn base64_encode_json<T: Serialize>(object: &T) -> Result<String, Error> {
    let json = serde_json::to_string(&object)?;
    Ok(base64::encode_config(json, base64::URL_SAFE_NO_PAD))
}

/// Sign raw bytes, returning the raw signature.
pub fn sign_bytes(algorithm: Algorithm, data: &[u8], key: &JWK) -> Result<Vec<u8>, Error> {
    match algorithm {
        Algorithm::ES256K => {
            use k256::ecdsa::{signature::Signer, Signature};
            let secret_key = k256::SecretKey::try_from(key)?;
            let signing_key = k256::ecdsa::SigningKey::from(secret_key);
            let sig: Signature = signing_key.try_sign(data)?;
            Ok(sig.to_bytes().to_vec())
        }
        _ => Err(Error::UnsupportedAlgorithm),
    }
}

pub fn sign_bytes_b64(algorithm: Algorithm, data: &[u8], key: &JWK) -> Result<String, Error> {
    let signature = sign_bytes(algorithm, data, key)?;
    Ok(base64::encode_config(signature, base64::URL_SAFE_NO_PAD))
}

/// Verify a raw signature over raw bytes.
pub fn verify_bytes(
    algorithm: Algorithm,
    data: &[u8],
    key: &JWK,
    signature: &[u8],
) -> Result<(), Error> {
    if let Some(key_algorithm) = key.algorithm {
        if key_algorithm != algorithm {
            return Err(Error::AlgorithmMismatch);
        }
    }
    match algorithm {
        Algorithm::ES256K => {
            use k256::ecdsa::signature::Verifier;
            let public_key = k256::PublicKey::try_from(key)?;
            let verifying_key = k256::ecdsa::VerifyingKey::from(public_key);
            let sig = k256::ecdsa::Signature::try_from(signature)?;
            verifying_key
                .verify(data, &sig)
                .map_err(|_| Error::InvalidSignature)
        }
        _ => Err(Error::UnsupportedAlgorithm),
    }
}

/// Sign a payload into a compact JWS.
pub fn encode_sign(algorithm: Algorithm, payload: &str, key: &JWK) -> Result<String, Error> {
    let header = Header {
        algorithm,
        key_id: key.key_id.clone(),
        ..Default::default()
    };
    let header_b64 = base64_encode_json(&header)?;
    let payload_b64 = base64::encode_config(payload, base64::URL_SAFE_NO_PAD);
    let signing_input = header_b64 + "." + &payload_b64;
    let sig_b64 = sign_bytes_b64(header.algorithm, signing_input.as_bytes(), key)?;
    let jws = [signing_input, sig_b64].join(".");
    Ok(jws)
}

/// Split a compact JWS into its three base64url segments.
pub fn split_jws(jws: &str) -> Result<(&str, &str, &str), Error> {
    let mut parts = jws.splitn(3, '.');
    Ok(
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c), None) => (a, b, c),
            _ => return Err(Error::InvalidJWS),
        },
    )
}

#[derive(Clone, PartialEq, Eq)]
pub struct DecodedJWS {
    pub header: Header,
    pub signing_input: Vec<u8>,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Decode JWS parts (JOSE header, payload, and signature) into useful values.
pub fn decode_jws_parts(
    header_b64: &str,
    payload_b64: &str,
    signature_b64: &str,
) -> Result<DecodedJWS, Error> {
    let signature = base64::decode_config(signature_b64, base64::URL_SAFE_NO_PAD)?;
    let header_json = base64::decode_config(header_b64, base64::URL_SAFE_NO_PAD)?;
    let header: Header = serde_json::from_slice(&header_json)?;
    let payload = base64::decode_config(payload_b64, base64::URL_SAFE_NO_PAD)?;
    let signing_input = [header_b64.as_bytes(), b".", payload_b64.as_bytes()].concat();
    Ok(DecodedJWS {
        header,
        signing_input,
        payload,
        signature,
    })
}

/// Decode a compact JWS and verify its signature with the given key.
///
/// Returns the header and the decoded payload.
pub fn decode_verify(jws: &str, key: &JWK) -> Result<(Header, Vec<u8>), Error> {
    let (header_b64, payload_b64, signature_b64) = split_jws(jws)?;
    let DecodedJWS {
        header,
        signing_input,
        payload,
        signature,
    } = decode_jws_parts(header_b64, payload_b64, signature_b64)?;
    verify_bytes(header.algorithm, &signing_input, key, &signature)?;
    Ok((header, payload))
}

/// Decode a compact JWS without verifying the signature.
pub fn decode_unverified(jws: &str) -> Result<(Header, Vec<u8>), Error> {
    let (header_b64, payload_b64, signature_b64) = split_jws(jws)?;
    let DecodedJWS {
        header, payload, ..
    } = decode_jws_parts(header_b64, payload_b64, signature_b64)?;
    Ok((header, payload))
}

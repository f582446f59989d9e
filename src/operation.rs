//! Sidetree DID operations: data model, parsing, and partial verification.
//!
//! ### References
//! - <https://identity.foundation/sidetree/spec/v1.0.0/#did-operations>
//! - <https://identity.foundation/sidetree/spec/v1.0.0/#sidetree-operations>
//!
//! Parsing is strict: the property set of every object is checked exactly,
//! and each structural rule has its own [ErrorCode]. An operation that fails
//! here is dropped at ingestion and never reaches the operation store.
//! Whether an operation's revealed key matches the *current* commitment is
//! not decided here; that depends on prior state and belongs to the
//! [processor](crate::processor).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::did::DIDSuffix;
use crate::error::{ErrorCode, SidetreeError};
use crate::document::DIDStatePatch;
use crate::jwk::{PublicKeyJwk, JWK};
use crate::jws;
use crate::protocol::Sidetree;

/// The kind of a Sidetree operation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum OperationType {
    Create,
    Update,
    Recover,
    Deactivate,
}

/// Sidetree DID operation
///
/// ### References
/// - <https://identity.foundation/sidetree/spec/v1.0.0/#did-operations>
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type")]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Create(CreateOperation),
    Update(UpdateOperation),
    Recover(RecoverOperation),
    Deactivate(DeactivateOperation),
}

/// [Create Operation Suffix Data Object][data]
///
/// The DID Suffix is the encoded multihash of this object's canonical form.
///
/// [data]: https://identity.foundation/sidetree/spec/v1.0.0/#create-suffix-data-object
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct SuffixData {
    /// Delta Hash
    ///
    /// [Hash](Sidetree::hash) of the canonicalized [Create Operation Delta Object](Delta).
    pub delta_hash: String,

    /// [Recovery commitment](https://identity.foundation/sidetree/spec/v1.0.0/#recovery-commitment)
    ///
    /// Generated in step 2 of the [Create](https://identity.foundation/sidetree/spec/v1.0.0/#create) process.
    pub recovery_commitment: String,
}

/// Create/Update/Recover Delta Object
///
/// ### References
/// - [Sidetree §11.1 Create - Create Operation Delta Object][codo]
/// - [Sidetree §11.2 Update - Update Operation Delta Object][uodo]
/// - [Sidetree §11.3 Recover - Recover Operation Delta Object][rodo]
///
/// [codo]: https://identity.foundation/sidetree/spec/v1.0.0/#create-delta-object
/// [uodo]: https://identity.foundation/sidetree/spec/v1.0.0/#update-delta-object
/// [rodo]: https://identity.foundation/sidetree/spec/v1.0.0/#recover-delta-object
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct Delta {
    /// DID state patches to apply.
    pub patches: Vec<DIDStatePatch>,

    /// Update commitment generated as part of a Sidetree Create or Update operation.
    pub update_commitment: String,
}

/// Sidetree DID Create operation
///
/// ### References
/// - [Sidetree §11.1 Create](https://identity.foundation/sidetree/spec/v1.0.0/#create)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct CreateOperation {
    pub suffix_data: SuffixData,
    pub delta: Delta,
}

/// Sidetree DID Update operation
///
/// ### References
/// - [Sidetree §11.2 Update](https://identity.foundation/sidetree/spec/v1.0.0/#update)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct UpdateOperation {
    pub did_suffix: DIDSuffix,
    /// Compact JWS (RFC 7515) of [UpdateClaims]
    ///
    /// <https://identity.foundation/sidetree/spec/v1.0.0/#update-signed-data-object>
    pub signed_data: String,
    pub delta: Delta,
}

/// Sidetree DID Recover operation
///
/// ### References
/// - [Sidetree §11.3 Recover](https://identity.foundation/sidetree/spec/v1.0.0/#recover)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct RecoverOperation {
    pub did_suffix: DIDSuffix,
    /// Compact JWS (RFC 7515) of [RecoveryClaims]
    ///
    /// <https://identity.foundation/sidetree/spec/v1.0.0/#recover-signed-data-object>
    pub signed_data: String,
    pub delta: Delta,
}

/// Sidetree DID Deactivate operation
///
/// ### References
/// - [Sidetree §11.4 Deactivate](https://identity.foundation/sidetree/spec/v1.0.0/#deactivate)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct DeactivateOperation {
    pub did_suffix: DIDSuffix,
    /// Compact JWS (RFC 7515) of [DeactivateClaims]
    ///
    /// <https://identity.foundation/sidetree/spec/v1.0.0/#deactivate-signed-data-object>
    pub signed_data: String,
}

/// Payload object for JWS in [UpdateOperation]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct UpdateClaims {
    /// Key matching previous Update Commitment
    pub update_key: PublicKeyJwk,

    /// [Hash](Sidetree::hash) of the canonicalized [Update Operation Delta Object](Delta).
    pub delta_hash: String,
}

/// Payload object for JWS in [RecoverOperation]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct RecoveryClaims {
    /// [Recovery commitment](https://identity.foundation/sidetree/spec/v1.0.0/#recovery-commitment)
    ///
    /// Generated in step 9 of the [Recover](https://identity.foundation/sidetree/spec/v1.0.0/#recover) process.
    pub recovery_commitment: String,

    /// Key matching previous Recovery Commitment
    pub recovery_key: PublicKeyJwk,

    /// [Hash](Sidetree::hash) of the canonicalized [Recover Operation Delta Object](Delta).
    pub delta_hash: String,
}

/// Payload object for JWS in [DeactivateOperation]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct DeactivateClaims {
    pub did_suffix: DIDSuffix,
    /// Key matching previous Recovery Commitment
    pub recovery_key: PublicKeyJwk,
}

/// An operation as anchored on the ledger.
///
/// The triple `(transaction_time, transaction_number, operation_index)` is
/// the operation's **anchor key**. It orders operations totally and is the
/// sole tiebreaker between otherwise indistinguishable operations.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AnchoredOperation {
    pub operation_type: OperationType,
    pub did_suffix: DIDSuffix,
    /// The raw operation, exactly as anchored. Immutable once stored.
    pub operation_bytes: Vec<u8>,
    /// Logical time of the transaction that anchored this operation.
    pub transaction_time: u64,
    /// Transaction number within the ledger.
    pub transaction_number: u64,
    /// Index of the operation within its batch.
    pub operation_index: u32,
}

impl AnchoredOperation {
    /// The anchor key: the canonical total order over anchored operations.
    pub fn anchor_key(&self) -> (u64, u64, u32) {
        (
            self.transaction_time,
            self.transaction_number,
            self.operation_index,
        )
    }
}

impl Operation {
    pub fn operation_type(&self) -> OperationType {
        match self {
            Self::Create(_) => OperationType::Create,
            Self::Update(_) => OperationType::Update,
            Self::Recover(_) => OperationType::Recover,
            Self::Deactivate(_) => OperationType::Deactivate,
        }
    }

    /// The DID suffix this operation addresses. Derived from suffix data for
    /// Create, declared for the other kinds.
    pub fn did_suffix<S: Sidetree>(&self) -> Result<DIDSuffix, serde_json::Error> {
        match self {
            Self::Create(op) => S::serialize_suffix_data(&op.suffix_data),
            Self::Update(op) => Ok(op.did_suffix.clone()),
            Self::Recover(op) => Ok(op.did_suffix.clone()),
            Self::Deactivate(op) => Ok(op.did_suffix.clone()),
        }
    }

    /// Pair this operation with its anchoring coordinates, producing the
    /// record an [OperationStore](crate::store::OperationStore) holds.
    pub fn anchored<S: Sidetree>(
        &self,
        transaction_time: u64,
        transaction_number: u64,
        operation_index: u32,
    ) -> Result<AnchoredOperation, serde_json::Error> {
        let did_suffix = self.did_suffix::<S>()?;
        let operation_bytes = S::json_canonicalization_scheme(self)?.into_bytes();
        Ok(AnchoredOperation {
            operation_type: self.operation_type(),
            did_suffix,
            operation_bytes,
            transaction_time,
            transaction_number,
            operation_index,
        })
    }
}

/// Partially verified DID Create operation
///
/// Converted from [CreateOperation].
#[derive(Debug, Clone)]
pub struct PartiallyVerifiedCreateOperation {
    pub did_suffix: DIDSuffix,
    pub recovery_commitment: String,
    pub update_commitment: String,
    pub patches: Vec<DIDStatePatch>,
}

/// Partially verified DID Update operation
///
/// Converted from [UpdateOperation].
#[derive(Debug, Clone)]
pub struct PartiallyVerifiedUpdateOperation {
    pub did_suffix: DIDSuffix,
    pub signed_update_key: PublicKeyJwk,
    /// Commitment this operation reveals against: the
    /// [commitment](Sidetree::commitment_scheme) of the signed update key.
    pub reveal_commitment: String,
    pub update_commitment: String,
    pub patches: Vec<DIDStatePatch>,
}

/// Partially verified DID Recovery operation
///
/// Converted from [RecoverOperation].
#[derive(Debug, Clone)]
pub struct PartiallyVerifiedRecoverOperation {
    pub did_suffix: DIDSuffix,
    pub signed_recovery_key: PublicKeyJwk,
    /// Commitment this operation reveals against: the
    /// [commitment](Sidetree::commitment_scheme) of the signed recovery key.
    pub reveal_commitment: String,
    pub new_recovery_commitment: String,
    pub update_commitment: String,
    pub patches: Vec<DIDStatePatch>,
}

/// Partially verified DID Deactivate operation
///
/// Converted from [DeactivateOperation].
#[derive(Debug, Clone)]
pub struct PartiallyVerifiedDeactivateOperation {
    pub did_suffix: DIDSuffix,
    pub signed_recovery_key: PublicKeyJwk,
    /// Commitment this operation reveals against.
    pub reveal_commitment: String,
}

/// Partially verified Sidetree DID operation
///
/// Converted from [Operation].
///
/// Operation verification is described in [Sidetree §10.2.1 Operation Verification][ov].
///
/// [ov]: https://identity.foundation/sidetree/spec/v1.0.0/#operation-verification
#[derive(Debug, Clone)]
pub enum PartiallyVerifiedOperation {
    Create(PartiallyVerifiedCreateOperation),
    Update(PartiallyVerifiedUpdateOperation),
    Recover(PartiallyVerifiedRecoverOperation),
    Deactivate(PartiallyVerifiedDeactivateOperation),
}

impl PartiallyVerifiedOperation {
    pub fn did_suffix(&self) -> &DIDSuffix {
        match self {
            Self::Create(op) => &op.did_suffix,
            Self::Update(op) => &op.did_suffix,
            Self::Recover(op) => &op.did_suffix,
            Self::Deactivate(op) => &op.did_suffix,
        }
    }

    /// The commitment whose preimage this operation reveals, if any.
    pub fn reveal_commitment(&self) -> Option<&str> {
        match self {
            Self::Create(_) => None,
            Self::Update(op) => Some(&op.reveal_commitment),
            Self::Recover(op) => Some(&op.reveal_commitment),
            Self::Deactivate(op) => Some(&op.reveal_commitment),
        }
    }
}

/// A Sidetree operation
///
/// See also the enum [Operation] which implements this trait.
pub trait SidetreeOperation {
    /// The result of [partially verifying][Self::partial_verify] the operation.
    type PartiallyVerifiedForm;

    /// Partially verify the operation.
    ///
    /// This verifies the internal consistency (including signatures and
    /// hashes) of the operation, and returns the integrity-verified data.
    /// Public key commitment values are not checked; that is, the signature
    /// is verified, but whether the revealed public key hashes to the current
    /// commitment is not, since that depends on what the previous operation
    /// was.
    ///
    /// Hashing and signature verification make this comparatively expensive;
    /// callers on an async executor may want to run it on a blocking worker.
    fn partial_verify<S: Sidetree>(self) -> Result<Self::PartiallyVerifiedForm, SidetreeError>;
}

impl SidetreeOperation for Operation {
    type PartiallyVerifiedForm = PartiallyVerifiedOperation;

    fn partial_verify<S: Sidetree>(self) -> Result<PartiallyVerifiedOperation, SidetreeError> {
        Ok(match self {
            Operation::Create(op) => PartiallyVerifiedOperation::Create(op.partial_verify::<S>()?),
            Operation::Update(op) => PartiallyVerifiedOperation::Update(op.partial_verify::<S>()?),
            Operation::Recover(op) => {
                PartiallyVerifiedOperation::Recover(op.partial_verify::<S>()?)
            }
            Operation::Deactivate(op) => {
                PartiallyVerifiedOperation::Deactivate(op.partial_verify::<S>()?)
            }
        })
    }
}

fn canonical_delta_hash<S: Sidetree>(
    delta: &Delta,
    mismatch_code: ErrorCode,
) -> Result<String, SidetreeError> {
    let delta_string = S::json_canonicalization_scheme(delta)
        .map_err(|e| SidetreeError::with_message(mismatch_code, e.to_string()))?;
    Ok(S::hash(delta_string.as_bytes()))
}

impl SidetreeOperation for CreateOperation {
    type PartiallyVerifiedForm = PartiallyVerifiedCreateOperation;

    fn partial_verify<S: Sidetree>(self) -> Result<PartiallyVerifiedCreateOperation, SidetreeError> {
        S::validate_encoded_multihash(&self.suffix_data.delta_hash)?;
        S::validate_encoded_multihash(&self.suffix_data.recovery_commitment)?;
        S::validate_encoded_multihash(&self.delta.update_commitment)?;
        let delta_hash =
            canonical_delta_hash::<S>(&self.delta, ErrorCode::CreateOperationDeltaHashMismatch)?;
        if delta_hash != self.suffix_data.delta_hash {
            return Err(SidetreeError::new(ErrorCode::CreateOperationDeltaHashMismatch));
        }
        let did_suffix = S::serialize_suffix_data(&self.suffix_data).map_err(|e| {
            SidetreeError::with_message(
                ErrorCode::CreateOperationSuffixDataMissingOrUnknownProperty,
                e.to_string(),
            )
        })?;
        Ok(PartiallyVerifiedCreateOperation {
            did_suffix,
            recovery_commitment: self.suffix_data.recovery_commitment,
            update_commitment: self.delta.update_commitment,
            patches: self.delta.patches,
        })
    }
}

impl SidetreeOperation for UpdateOperation {
    type PartiallyVerifiedForm = PartiallyVerifiedUpdateOperation;

    /// Partially verify an [UpdateOperation]
    ///
    /// The operation's [signed data](UpdateOperation::signed_data) is
    /// verified against the revealed [public key](UpdateClaims::update_key)
    /// that it must contain, and the operation's
    /// [delta object](UpdateOperation::delta) is verified against the
    /// [delta hash](UpdateClaims::delta_hash) in the signed data payload.
    ///
    /// The correspondence of the revealed key's hash to the previous update
    /// commitment is not checked here, since it is not known from this
    /// function.
    fn partial_verify<S: Sidetree>(self) -> Result<PartiallyVerifiedUpdateOperation, SidetreeError> {
        let (header, claims) = jws_decode_verify_inner::<UpdateClaims>(
            &self.signed_data,
            ErrorCode::UpdateOperationSignedDataMissingOrUnknownProperty,
            |claims| &claims.update_key,
        )?;
        if header.algorithm != S::SIGNATURE_ALGORITHM {
            return Err(SidetreeError::new(ErrorCode::JwsUnexpectedSignatureAlgorithm));
        }
        S::validate_encoded_multihash(&claims.delta_hash)?;
        S::validate_encoded_multihash(&self.delta.update_commitment)?;
        let delta_hash =
            canonical_delta_hash::<S>(&self.delta, ErrorCode::UpdateOperationDeltaHashMismatch)?;
        if delta_hash != claims.delta_hash {
            return Err(SidetreeError::new(ErrorCode::UpdateOperationDeltaHashMismatch));
        }
        let reveal_commitment = S::commitment_scheme(&claims.update_key)
            .map_err(|e| SidetreeError::with_message(ErrorCode::JwkInvalid, e.to_string()))?;
        Ok(PartiallyVerifiedUpdateOperation {
            did_suffix: self.did_suffix,
            signed_update_key: claims.update_key,
            reveal_commitment,
            update_commitment: self.delta.update_commitment,
            patches: self.delta.patches,
        })
    }
}

impl SidetreeOperation for RecoverOperation {
    type PartiallyVerifiedForm = PartiallyVerifiedRecoverOperation;

    /// Partially verify a [RecoverOperation]
    fn partial_verify<S: Sidetree>(
        self,
    ) -> Result<PartiallyVerifiedRecoverOperation, SidetreeError> {
        let (header, claims) = jws_decode_verify_inner::<RecoveryClaims>(
            &self.signed_data,
            ErrorCode::RecoverOperationSignedDataMissingOrUnknownProperty,
            |claims| &claims.recovery_key,
        )?;
        if header.algorithm != S::SIGNATURE_ALGORITHM {
            return Err(SidetreeError::new(ErrorCode::JwsUnexpectedSignatureAlgorithm));
        }
        S::validate_encoded_multihash(&claims.delta_hash)?;
        S::validate_encoded_multihash(&claims.recovery_commitment)?;
        S::validate_encoded_multihash(&self.delta.update_commitment)?;
        let delta_hash =
            canonical_delta_hash::<S>(&self.delta, ErrorCode::RecoverOperationDeltaHashMismatch)?;
        if delta_hash != claims.delta_hash {
            return Err(SidetreeError::new(ErrorCode::RecoverOperationDeltaHashMismatch));
        }
        let reveal_commitment = S::commitment_scheme(&claims.recovery_key)
            .map_err(|e| SidetreeError::with_message(ErrorCode::JwkInvalid, e.to_string()))?;
        Ok(PartiallyVerifiedRecoverOperation {
            did_suffix: self.did_suffix,
            signed_recovery_key: claims.recovery_key,
            reveal_commitment,
            new_recovery_commitment: claims.recovery_commitment,
            update_commitment: self.delta.update_commitment,
            patches: self.delta.patches,
        })
    }
}

impl SidetreeOperation for DeactivateOperation {
    type PartiallyVerifiedForm = PartiallyVerifiedDeactivateOperation;

    /// Partially verify a [DeactivateOperation]
    fn partial_verify<S: Sidetree>(
        self,
    ) -> Result<PartiallyVerifiedDeactivateOperation, SidetreeError> {
        let (header, claims) = jws_decode_verify_inner::<DeactivateClaims>(
            &self.signed_data,
            ErrorCode::DeactivateOperationSignedDataMissingOrUnknownProperty,
            |claims| &claims.recovery_key,
        )?;
        if header.algorithm != S::SIGNATURE_ALGORITHM {
            return Err(SidetreeError::new(ErrorCode::JwsUnexpectedSignatureAlgorithm));
        }
        if claims.did_suffix != self.did_suffix {
            return Err(SidetreeError::with_message(
                ErrorCode::DeactivateOperationSignedDidSuffixMismatch,
                format!(
                    "expected '{}', but signed data contains '{}'",
                    self.did_suffix, claims.did_suffix
                ),
            ));
        }
        let reveal_commitment = S::commitment_scheme(&claims.recovery_key)
            .map_err(|e| SidetreeError::with_message(ErrorCode::JwkInvalid, e.to_string()))?;
        Ok(PartiallyVerifiedDeactivateOperation {
            did_suffix: self.did_suffix,
            signed_recovery_key: claims.recovery_key,
            reveal_commitment,
        })
    }
}

/// Decode and verify a compact JWS whose public key is inside the payload.
///
/// Similar to [jws::decode_verify], but for when the payload (claims) must be
/// parsed to determine the public key. Before verification, the deserialized
/// claims object is passed to the provided `get_key` function; the key it
/// returns is used to verify the signature.
///
/// `payload_error_code` is raised when the payload is not a valid claims
/// object for the expected operation kind.
pub fn jws_decode_verify_inner<Claims: DeserializeOwned>(
    jws: &str,
    payload_error_code: ErrorCode,
    get_key: impl FnOnce(&Claims) -> &PublicKeyJwk,
) -> Result<(jws::Header, Claims), SidetreeError> {
    let (header_b64, payload_b64, signature_b64) = jws::split_jws(jws)
        .map_err(|_| SidetreeError::new(ErrorCode::JwsCompactJwsMalformed))?;
    let jws::DecodedJWS {
        header,
        signing_input,
        payload,
        signature,
    } = jws::decode_jws_parts(header_b64, payload_b64, signature_b64)
        .map_err(|e| SidetreeError::with_message(ErrorCode::JwsCompactJwsMalformed, e.to_string()))?;
    let claims: Claims = serde_json::from_slice(&payload)
        .map_err(|e| SidetreeError::with_message(payload_error_code, e.to_string()))?;
    let pk = get_key(&claims);
    let key = JWK::try_from(pk.clone())
        .map_err(|e| SidetreeError::with_message(ErrorCode::JwkInvalid, e.to_string()))?;
    jws::verify_bytes(header.algorithm, &signing_input, &key, &signature).map_err(|e| match e {
        jws::Error::UnsupportedAlgorithm | jws::Error::AlgorithmMismatch => {
            SidetreeError::new(ErrorCode::JwsUnexpectedSignatureAlgorithm)
        }
        other => SidetreeError::with_message(ErrorCode::JwsSignatureInvalid, other.to_string()),
    })?;
    Ok((header, claims))
}

fn ensure_exact_properties(
    object: &serde_json::Map<String, Value>,
    allowed: &[&str],
    code: ErrorCode,
) -> Result<(), SidetreeError> {
    for key in object.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(SidetreeError::with_message(
                code,
                format!("unexpected property '{key}'"),
            ));
        }
    }
    for key in allowed {
        if !object.contains_key(*key) {
            return Err(SidetreeError::with_message(
                code,
                format!("missing property '{key}'"),
            ));
        }
    }
    Ok(())
}

fn take_delta(
    object: &serde_json::Map<String, Value>,
) -> Result<Delta, SidetreeError> {
    // Presence was checked by ensure_exact_properties.
    serde_json::from_value(object["delta"].clone())
        .map_err(|e| SidetreeError::with_message(ErrorCode::DeltaMissingOrUnknownProperty, e.to_string()))
}

fn take_string(
    object: &serde_json::Map<String, Value>,
    key: &str,
    code: ErrorCode,
) -> Result<String, SidetreeError> {
    object[key]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| SidetreeError::with_message(code, format!("property '{key}' must be a string")))
}

/// Parse an anchored operation's raw bytes and partially verify the result.
///
/// This is the single entry point the ingestion and resolution paths share.
/// Every structural rule raises a distinct [ErrorCode].
pub fn parse_operation<S: Sidetree>(
    operation_bytes: &[u8],
) -> Result<PartiallyVerifiedOperation, SidetreeError> {
    if operation_bytes.len() > S::MAX_OPERATION_SIZE {
        return Err(SidetreeError::with_message(
            ErrorCode::OperationExceedsMaximumSize,
            format!(
                "operation is {} bytes, maximum is {}",
                operation_bytes.len(),
                S::MAX_OPERATION_SIZE
            ),
        ));
    }
    let value: Value = serde_json::from_slice(operation_bytes)
        .map_err(|e| SidetreeError::with_message(ErrorCode::OperationNotJson, e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| SidetreeError::new(ErrorCode::OperationNotJson))?;

    let operation = match object.get("type").and_then(Value::as_str) {
        Some("create") => {
            ensure_exact_properties(
                object,
                &["type", "suffixData", "delta"],
                ErrorCode::CreateOperationMissingOrUnknownProperty,
            )?;
            let suffix_data: SuffixData = serde_json::from_value(object["suffixData"].clone())
                .map_err(|e| {
                    SidetreeError::with_message(
                        ErrorCode::CreateOperationSuffixDataMissingOrUnknownProperty,
                        e.to_string(),
                    )
                })?;
            let delta = take_delta(object)?;
            Operation::Create(CreateOperation { suffix_data, delta })
        }
        Some("update") => {
            ensure_exact_properties(
                object,
                &["type", "didSuffix", "signedData", "delta"],
                ErrorCode::UpdateOperationMissingOrUnknownProperty,
            )?;
            let did_suffix = take_string(
                object,
                "didSuffix",
                ErrorCode::UpdateOperationMissingOrUnknownProperty,
            )?;
            let signed_data = take_string(
                object,
                "signedData",
                ErrorCode::UpdateOperationMissingOrUnknownProperty,
            )?;
            let delta = take_delta(object)?;
            Operation::Update(UpdateOperation {
                did_suffix: DIDSuffix(did_suffix),
                signed_data,
                delta,
            })
        }
        Some("recover") => {
            ensure_exact_properties(
                object,
                &["type", "didSuffix", "signedData", "delta"],
                ErrorCode::RecoverOperationMissingOrUnknownProperty,
            )?;
            let did_suffix = take_string(
                object,
                "didSuffix",
                ErrorCode::RecoverOperationMissingOrUnknownProperty,
            )?;
            let signed_data = take_string(
                object,
                "signedData",
                ErrorCode::RecoverOperationMissingOrUnknownProperty,
            )?;
            let delta = take_delta(object)?;
            Operation::Recover(RecoverOperation {
                did_suffix: DIDSuffix(did_suffix),
                signed_data,
                delta,
            })
        }
        Some("deactivate") => {
            ensure_exact_properties(
                object,
                &["type", "didSuffix", "signedData"],
                ErrorCode::DeactivateOperationMissingOrUnknownProperty,
            )?;
            let did_suffix = take_string(
                object,
                "didSuffix",
                ErrorCode::DeactivateOperationMissingOrUnknownProperty,
            )?;
            let signed_data = take_string(
                object,
                "signedData",
                ErrorCode::DeactivateOperationMissingOrUnknownProperty,
            )?;
            Operation::Deactivate(DeactivateOperation {
                did_suffix: DIDSuffix(did_suffix),
                signed_data,
            })
        }
        _ => return Err(SidetreeError::new(ErrorCode::OperationTypeMissingOrUnknown)),
    };
    operation.partial_verify::<S>()
}

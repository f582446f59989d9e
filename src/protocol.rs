//! Protocol parameters: hashing, canonicalization, encoding, commitments,
//! and operation construction.
//!
//! The [Sidetree] trait captures the subset of [Sidetree §5. Default
//! Parameters][default-params] a resolution engine needs. Implementations
//! pick the hash protocol, signature algorithm, and method name; defaults
//! implement the v1 parameter set (SHA2-256 multihash, `ES256K`).
//!
//! [default-params]: https://identity.foundation/sidetree/spec/v1.0.0/#default-parameters

use anyhow::{anyhow, ensure, Context, Result as AResult};
use serde::Serialize;

use crate::did::DIDSuffix;
use crate::error::{ErrorCode, SidetreeError};
use crate::jwk::{Algorithm, PublicKeyJwk, JWK};
use crate::jws;
use crate::operation::{
    CreateOperation, DeactivateClaims, DeactivateOperation, Delta, Operation, RecoverOperation,
    RecoveryClaims, SuffixData, UpdateClaims, UpdateOperation,
};
use crate::document::DIDStatePatch;

pub const MULTIHASH_SHA2_256_PREFIX: &[u8] = &[0x12];
pub const MULTIHASH_SHA2_256_SIZE: &[u8] = &[0x20];

/// Parameters and primitive schemes for a Sidetree-based DID method.
pub trait Sidetree {
    /// [`HASH_PROTOCOL`](https://identity.foundation/sidetree/spec/v1.0.0/#hash-protocol)
    ///
    /// Default implementation calls [hash_protocol_algorithm] and returns the
    /// concatenation of the multihash prefix and hash.
    ///
    /// This function must correspond with [hash_algorithm]. To ensure that
    /// correspondence, implementers may want to override
    /// [hash_protocol_algorithm] instead of this function.
    ///
    /// [hash_algorithm]: Self::hash_algorithm
    /// [hash_protocol_algorithm]: Self::hash_protocol_algorithm
    fn hash_protocol(data: &[u8]) -> Vec<u8> {
        let (prefix, hash) = Self::hash_protocol_algorithm(data);
        [prefix, hash].concat()
    }

    /// [`HASH_ALGORITHM`](https://identity.foundation/sidetree/spec/v1.0.0/#hash-algorithm)
    ///
    /// Default implementation calls [hash_protocol_algorithm] and returns the
    /// hash, discarding the prefix.
    ///
    /// [hash_protocol_algorithm]: Self::hash_protocol_algorithm
    fn hash_algorithm(data: &[u8]) -> Vec<u8> {
        let (_prefix, hash) = Self::hash_protocol_algorithm(data);
        hash
    }

    /// Combination of [hash_protocol] and [hash_algorithm]
    ///
    /// Returns multihash prefix and hash.
    ///
    /// Default implementation: SHA-256 (`sha2-256`)
    ///
    /// [hash_protocol]: Self::hash_protocol
    /// [hash_algorithm]: Self::hash_algorithm
    fn hash_protocol_algorithm(data: &[u8]) -> (Vec<u8>, Vec<u8>) {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(data);
        let hash = hasher.finalize().to_vec();
        (
            [MULTIHASH_SHA2_256_PREFIX, MULTIHASH_SHA2_256_SIZE].concat(),
            hash,
        )
    }

    /// [`DATA_ENCODING_SCHEME`](https://identity.foundation/sidetree/spec/v1.0.0/#data-encoding-scheme)
    fn data_encoding_scheme(data: &[u8]) -> String {
        base64::encode_config(data, base64::URL_SAFE_NO_PAD)
    }

    /// [`JSON_CANONICALIZATION_SCHEME`](https://identity.foundation/sidetree/spec/v1.0.0/#json-canonicalization-scheme)
    fn json_canonicalization_scheme<T: Serialize + ?Sized>(
        value: &T,
    ) -> Result<String, serde_json::Error> {
        serde_jcs::to_string(value)
    }

    /// Hash and encode data
    ///
    /// [Sidetree §6.1 Hashing Process](https://identity.foundation/sidetree/spec/#hashing-process)
    fn hash(data: &[u8]) -> String {
        let hash = Self::hash_protocol(data);
        Self::data_encoding_scheme(&hash)
    }

    /// Canonicalize a value, hash it, and encode the multihash.
    ///
    /// Commitments and reveals all flow as these encoded strings, so they can
    /// be equality-compared without further decoding.
    fn canonicalize_then_hash_then_encode<T: Serialize + ?Sized>(
        value: &T,
    ) -> Result<String, serde_json::Error> {
        let canonical = Self::json_canonicalization_scheme(value)?;
        Ok(Self::hash(canonical.as_bytes()))
    }

    /// [Public Key Commitment Scheme (Sidetree §6.2.1)][pkcs]
    ///
    /// The commitment to a public key is the encoded multihash of its
    /// canonicalized JWK; the key itself is the reveal.
    ///
    /// [pkcs]: https://identity.foundation/sidetree/spec/v1.0.0/#public-key-commitment-scheme
    fn commitment_scheme(pkjwk: &PublicKeyJwk) -> Result<String, serde_json::Error> {
        Self::canonicalize_then_hash_then_encode(pkjwk)
    }

    /// Generate a new keypair ([KEY_ALGORITHM][ka])
    ///
    /// [ka]: https://identity.foundation/sidetree/spec/v1.0.0/#key-algorithm
    fn generate_key() -> AResult<JWK>;

    /// Ensure that a keypair is valid for this Sidetree DID Method
    ///
    /// Check that the key uses this method's [KEY_ALGORITHM][ka].
    ///
    /// [ka]: https://identity.foundation/sidetree/spec/v1.0.0/#key-algorithm
    fn validate_key(key: &JWK) -> AResult<()>;

    /// [`SIGNATURE_ALGORITHM`](https://identity.foundation/sidetree/spec/v1.0.0/#sig-algorithm) (JWS alg)
    const SIGNATURE_ALGORITHM: Algorithm;

    /// Method name for Sidetree-based DID
    ///
    /// Mentioned in [Sidetree §9. DID URI Composition](https://identity.foundation/sidetree/spec/v1.0.0/#did-uri-composition)
    const METHOD: &'static str;

    /// Network instance
    ///
    /// Additional segment after the method-id (METHOD), as a prefix for the
    /// method-specific-id (DID Suffix), identifying a network instance.
    /// e.g. "testnet"
    const NETWORK: Option<&'static str> = None;

    /// [`MAX_OPERATION_SIZE`](https://identity.foundation/sidetree/spec/v1.0.0/#default-parameters) in bytes
    const MAX_OPERATION_SIZE: usize = 2500;

    /// [`MAX_OPERATION_HASH_LENGTH`](https://identity.foundation/sidetree/spec/v1.0.0/#max-operation-hash-length)
    const MAX_OPERATION_HASH_LENGTH: usize = 100;

    /// Check that an encoded string is a multihash this protocol version
    /// could have produced.
    fn validate_encoded_multihash(encoded: &str) -> Result<(), SidetreeError> {
        if encoded.len() > Self::MAX_OPERATION_HASH_LENGTH {
            return Err(SidetreeError::with_message(
                ErrorCode::MultihashStringNotAMultihash,
                format!("encoded hash exceeds {} characters", Self::MAX_OPERATION_HASH_LENGTH),
            ));
        }
        let bytes = base64::decode_config(encoded, base64::URL_SAFE_NO_PAD)
            .map_err(|_| SidetreeError::new(ErrorCode::MultihashStringNotAMultihash))?;
        if bytes.len() != 34 {
            return Err(SidetreeError::new(ErrorCode::MultihashStringNotAMultihash));
        }
        if &bytes[0..1] != MULTIHASH_SHA2_256_PREFIX || &bytes[1..2] != MULTIHASH_SHA2_256_SIZE {
            return Err(SidetreeError::new(
                ErrorCode::MultihashNotLatestSupportedHashAlgorithm,
            ));
        }
        Ok(())
    }

    /// Check that a DID Suffix looks valid
    fn validate_did_suffix(suffix: &DIDSuffix) -> Result<(), SidetreeError> {
        let bytes = base64::decode_config(&suffix.0, base64::URL_SAFE_NO_PAD)
            .map_err(|_| SidetreeError::new(ErrorCode::DidSuffixIncorrectEncoding))?;
        if bytes.len() != 34 {
            return Err(SidetreeError::with_message(
                ErrorCode::DidSuffixIncorrectLength,
                format!("unexpected length for DID Suffix: {}", bytes.len()),
            ));
        }
        if &bytes[0..1] != MULTIHASH_SHA2_256_PREFIX || &bytes[1..2] != MULTIHASH_SHA2_256_SIZE {
            return Err(SidetreeError::new(
                ErrorCode::MultihashNotLatestSupportedHashAlgorithm,
            ));
        }
        Ok(())
    }

    /// Serialize and hash [Suffix Data][SuffixData], producing the
    /// [`DIDSuffix`] that canonically identifies the DID.
    ///
    /// Reference: <https://identity.foundation/sidetree/spec/v1.0.0/#did-uri-composition>
    fn serialize_suffix_data(suffix_data: &SuffixData) -> Result<DIDSuffix, serde_json::Error> {
        Ok(DIDSuffix(Self::canonicalize_then_hash_then_encode(
            suffix_data,
        )?))
    }

    /// Create a Sidetree-based DID using existing keys
    ///
    /// This function creates a Sidetree-based DID using existing public keys
    /// for the update key and recovery key and respective [commitments][].
    ///
    /// Sidetree specifies in ([§11.1 Create][create]) that creating a
    /// Sidetree DID involves generating an update keypair and recovery
    /// keypair. That is implemented in [Self::create].
    ///
    /// **Note**: The Sidetree specification ([§6.2.1 Public Key Commitment
    /// Scheme][pkcs]) recommends not reusing public keys across different
    /// commitment invocations, and requires not using public key JWK payloads
    /// across commitment invocations.
    ///
    /// [commitments]: https://identity.foundation/sidetree/spec/v1.0.0/#commitment
    /// [create]: https://identity.foundation/sidetree/spec/v1.0.0/#create
    /// [pkcs]: https://identity.foundation/sidetree/spec/v1.0.0/#public-key-commitment-scheme
    fn create_existing(
        update_pk: &PublicKeyJwk,
        recovery_pk: &PublicKeyJwk,
        patches: Vec<DIDStatePatch>,
    ) -> AResult<Operation> {
        ensure!(
            update_pk != recovery_pk,
            "Update and recovery public key JWK payload must be different."
        );

        let update_commitment =
            Self::commitment_scheme(update_pk).context("Generate update commitment")?;

        let create_operation_delta_object = Delta {
            patches,
            update_commitment,
        };
        let delta_string = Self::json_canonicalization_scheme(&create_operation_delta_object)
            .context("Canonicalize Create Operation Delta Object")?;
        let delta_hash = Self::hash(delta_string.as_bytes());

        let recovery_commitment =
            Self::commitment_scheme(recovery_pk).context("Generate recovery commitment")?;

        let create_operation_suffix_data_object = SuffixData {
            delta_hash,
            recovery_commitment,
        };

        let create_operation = CreateOperation {
            suffix_data: create_operation_suffix_data_object,
            delta: create_operation_delta_object,
        };
        Ok(Operation::Create(create_operation))
    }

    /// Create a Sidetree-based DID
    ///
    /// Generate keypairs and construct a Create Operation according to
    /// [Sidetree §11.1 Create][create]. Returns the create operation along
    /// with the update keypair and the recovery keypair.
    ///
    /// [create]: https://identity.foundation/sidetree/spec/v1.0.0/#create
    fn create(patches: Vec<DIDStatePatch>) -> AResult<(Operation, JWK, JWK)> {
        let update_keypair = Self::generate_key().context("Generate Update Key Pair")?;
        let recovery_keypair = Self::generate_key().context("Generate Recovery Key Pair")?;
        let update_pk =
            PublicKeyJwk::try_from(update_keypair.to_public()).context("Update public key")?;
        let recovery_pk =
            PublicKeyJwk::try_from(recovery_keypair.to_public()).context("Recovery public key")?;
        let create_op = Self::create_existing(&update_pk, &recovery_pk, patches)?;
        Ok((create_op, update_keypair, recovery_keypair))
    }

    /// Update a Sidetree-based DID
    ///
    /// Construct a DID Update Operation according to [Sidetree §11.2
    /// Update][update]. Returns the update operation.
    ///
    /// Unlike [Self::create] and [Self::recover], this does not generate
    /// keys, since the specification does not call for that here. Instead,
    /// the caller must generate a new update keypair, and pass its public key
    /// in the `new_update_pk` argument.
    ///
    /// [update]: https://identity.foundation/sidetree/spec/v1.0.0/#update
    fn update(
        did_suffix: DIDSuffix,
        update_key: &JWK,
        new_update_pk: &PublicKeyJwk,
        patches: Vec<DIDStatePatch>,
    ) -> AResult<UpdateOperation> {
        let update_pk = PublicKeyJwk::try_from(update_key.to_public())
            .context("Convert update key to PublicKeyJwk for Update operation")?;
        ensure!(
            new_update_pk != &update_pk,
            "New update public key must be different."
        );

        let new_update_commitment =
            Self::commitment_scheme(new_update_pk).context("Generate new update commitment")?;

        let update_operation_delta_object = Delta {
            patches,
            update_commitment: new_update_commitment,
        };

        let delta_string = Self::json_canonicalization_scheme(&update_operation_delta_object)
            .context("Canonicalize Update Operation Delta Object")?;
        let delta_hash = Self::hash(delta_string.as_bytes());

        let claims = UpdateClaims {
            update_key: update_pk,
            delta_hash,
        };
        let payload = Self::json_canonicalization_scheme(&claims)
            .context("Canonicalize Update Operation Signed Data Object")?;
        let signed_data = jws::encode_sign(Self::SIGNATURE_ALGORITHM, &payload, update_key)
            .context("Sign Update Operation")?;
        Ok(UpdateOperation {
            did_suffix,
            delta: update_operation_delta_object,
            signed_data,
        })
    }

    /// Recover a Sidetree-based DID using existing keys
    ///
    /// Like [Self::recover] but does not generate or handle the new update
    /// key pair and recovery key pair; instead, their public keys must be
    /// provided by the caller in the `new_update_pk` and `new_recovery_pk`
    /// arguments.
    ///
    /// Returns the constructed DID Recover operation.
    fn recover_existing(
        did_suffix: DIDSuffix,
        recovery_key: &JWK,
        new_update_pk: &PublicKeyJwk,
        new_recovery_pk: &PublicKeyJwk,
        patches: Vec<DIDStatePatch>,
    ) -> AResult<Operation> {
        let recovery_pk = PublicKeyJwk::try_from(recovery_key.to_public())
            .context("Convert recovery key to PublicKeyJwk for Recover operation")?;
        ensure!(
            new_recovery_pk != &recovery_pk,
            "New recovery public key must be different."
        );

        let new_update_commitment =
            Self::commitment_scheme(new_update_pk).context("Generate new update commitment")?;
        let new_recovery_commitment = Self::commitment_scheme(new_recovery_pk)
            .context("Generate new recovery commitment")?;

        let recover_operation_delta_object = Delta {
            patches,
            update_commitment: new_update_commitment,
        };

        let delta_string = Self::json_canonicalization_scheme(&recover_operation_delta_object)
            .context("Canonicalize Recover Operation Delta Object")?;
        let delta_hash = Self::hash(delta_string.as_bytes());

        let claims = RecoveryClaims {
            recovery_commitment: new_recovery_commitment,
            recovery_key: recovery_pk,
            delta_hash,
        };
        let payload = Self::json_canonicalization_scheme(&claims)
            .context("Canonicalize Recover Operation Signed Data Object")?;
        let signed_data = jws::encode_sign(Self::SIGNATURE_ALGORITHM, &payload, recovery_key)
            .context("Sign Recover Operation")?;
        let recover_op = RecoverOperation {
            did_suffix,
            delta: recover_operation_delta_object,
            signed_data,
        };
        Ok(Operation::Recover(recover_op))
    }

    /// Recover a Sidetree-based DID
    ///
    /// Generate keypairs and construct a Recover Operation according to
    /// [Sidetree §11.3 Recover][recover]. Returns the recover operation along
    /// with the new update keypair and the new recovery keypair.
    ///
    /// [recover]: https://identity.foundation/sidetree/spec/v1.0.0/#recover
    fn recover(
        did_suffix: DIDSuffix,
        recovery_key: &JWK,
        patches: Vec<DIDStatePatch>,
    ) -> AResult<(Operation, JWK, JWK)> {
        let new_update_keypair = Self::generate_key().context("Generate New Update Key Pair")?;
        let new_update_pk = PublicKeyJwk::try_from(new_update_keypair.to_public())
            .context("Convert new update public key")?;

        let new_recovery_keypair =
            Self::generate_key().context("Generate New Recovery Key Pair")?;
        let new_recovery_pk = PublicKeyJwk::try_from(new_recovery_keypair.to_public())
            .context("Convert new recovery public key")?;

        let recover_op = Self::recover_existing(
            did_suffix,
            recovery_key,
            &new_update_pk,
            &new_recovery_pk,
            patches,
        )
        .context("Construct Recover Operation")?;
        Ok((recover_op, new_update_keypair, new_recovery_keypair))
    }

    /// Deactivate a Sidetree-based DID
    ///
    /// Construct a Deactivate Operation according to [Sidetree §11.4
    /// Deactivate][deactivate]. Returns the deactivate operation.
    ///
    /// [deactivate]: https://identity.foundation/sidetree/spec/v1.0.0/#deactivate
    fn deactivate(did_suffix: DIDSuffix, recovery_key: JWK) -> AResult<DeactivateOperation> {
        let recovery_pk = PublicKeyJwk::try_from(recovery_key.to_public())
            .context("Convert recovery key to PublicKeyJwk for Deactivate operation")?;
        let claims = DeactivateClaims {
            did_suffix: did_suffix.clone(),
            recovery_key: recovery_pk,
        };
        let payload = Self::json_canonicalization_scheme(&claims)
            .context("Canonicalize Deactivate Operation Signed Data Object")?;
        let signed_data = jws::encode_sign(Self::SIGNATURE_ALGORITHM, &payload, &recovery_key)
            .context("Sign Deactivate Operation")?;
        Ok(DeactivateOperation {
            did_suffix,
            signed_data,
        })
    }
}

/// The v1 protocol parameter set: SHA2-256 multihashes, secp256k1 keys,
/// `ES256K` signatures, method name `sidetree`.
pub struct Core;

impl Sidetree for Core {
    fn generate_key() -> AResult<JWK> {
        JWK::generate_secp256k1().map_err(|e| anyhow!("Generate secp256k1 key: {e}"))
    }
    fn validate_key(key: &JWK) -> AResult<()> {
        if !crate::jwk::is_secp256k1(key) {
            return Err(anyhow!("Key must be secp256k1"));
        }
        Ok(())
    }
    const SIGNATURE_ALGORITHM: Algorithm = Algorithm::ES256K;
    const METHOD: &'static str = "sidetree";
}

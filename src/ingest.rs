//! Transaction ingestion: from an anchored ledger transaction to stored
//! operations.
//!
//! For each ledger transaction the processor fetches the referenced map file
//! from the CAS, validates it, fetches the chunk file it points at, pairs
//! update skeletons with their deltas, and stores every structurally valid
//! assembled operation. Operations that fail structural validation are
//! dropped here and never reach the store; unreachable collaborators surface
//! as errors.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::anchor::{AnchoredData, TransactionModel};
use crate::cas::{ContentAddressableStore, FetchResultCode};
use crate::chunk_file::ChunkFile;
use crate::error::{ErrorCode, SidetreeError};
use crate::map_file::MapFile;
use crate::operation::{parse_operation, AnchoredOperation, OperationType};
use crate::protocol::Sidetree;
use crate::store::OperationStore;

/// Maximum accepted compressed map file size.
pub const MAX_MAP_FILE_SIZE_BYTES: usize = 1_000_000;

/// Maximum accepted compressed chunk file size.
pub const MAX_CHUNK_FILE_SIZE_BYTES: usize = 10_000_000;

/// Ingests anchored transactions for one protocol parameter set.
pub struct TransactionProcessor<S: Sidetree> {
    cas: Arc<dyn ContentAddressableStore>,
    store: Arc<dyn OperationStore>,
    _marker: PhantomData<S>,
}

impl<S: Sidetree> TransactionProcessor<S> {
    pub fn new(cas: Arc<dyn ContentAddressableStore>, store: Arc<dyn OperationStore>) -> Self {
        Self {
            cas,
            store,
            _marker: PhantomData,
        }
    }

    /// Process one ledger transaction, returning how many operations were
    /// stored.
    ///
    /// Individual operations failing structural validation are dropped with
    /// a warning; batch-level violations (bad anchor string, malformed
    /// files, unreachable CAS) fail the whole transaction.
    pub async fn process_transaction(
        &self,
        transaction: &TransactionModel,
    ) -> Result<usize, SidetreeError> {
        let anchored_data = AnchoredData::parse(&transaction.anchor_string)?;
        let map_file_bytes = self
            .fetch(&anchored_data.map_file_uri, MAX_MAP_FILE_SIZE_BYTES)
            .await?;
        let map_file = MapFile::parse(&map_file_bytes)?;
        let updates = map_file.updates();
        if updates.is_empty() {
            return Ok(0);
        }

        let chunk_file_bytes = self
            .fetch(map_file.chunk_file_uri(), MAX_CHUNK_FILE_SIZE_BYTES)
            .await?;
        let chunk_file = ChunkFile::parse(&chunk_file_bytes)?;
        if chunk_file.deltas().len() != updates.len() {
            return Err(SidetreeError::with_message(
                ErrorCode::ChunkFileDeltaCountIncorrect,
                format!(
                    "{} deltas for {} update operations",
                    chunk_file.deltas().len(),
                    updates.len()
                ),
            ));
        }

        let mut accepted = Vec::with_capacity(updates.len());
        for (index, (reference, delta)) in updates.iter().zip(chunk_file.deltas()).enumerate() {
            let assembled = serde_json::json!({
                "type": "update",
                "didSuffix": reference.did_suffix.0,
                "signedData": reference.signed_data,
                "delta": delta,
            });
            let operation_bytes = match S::json_canonicalization_scheme(&assembled) {
                Ok(canonical) => canonical.into_bytes(),
                Err(e) => {
                    warn!(
                        did_suffix = %reference.did_suffix,
                        error = %e,
                        "dropping update operation that cannot be canonicalized"
                    );
                    continue;
                }
            };
            match parse_operation::<S>(&operation_bytes) {
                Ok(_) => accepted.push(AnchoredOperation {
                    operation_type: OperationType::Update,
                    did_suffix: reference.did_suffix.clone(),
                    operation_bytes,
                    transaction_time: transaction.transaction_time,
                    transaction_number: transaction.transaction_number,
                    operation_index: index as u32,
                }),
                Err(e) => {
                    warn!(
                        did_suffix = %reference.did_suffix,
                        code = %e.code(),
                        "dropping update operation that failed structural validation"
                    );
                }
            }
        }

        let stored = accepted.len();
        self.store.put(accepted).await?;
        debug!(
            transaction_number = transaction.transaction_number,
            stored, "processed anchored transaction"
        );
        Ok(stored)
    }

    async fn fetch(&self, address: &str, max_size_bytes: usize) -> Result<Vec<u8>, SidetreeError> {
        let result = self.cas.read(address, max_size_bytes).await;
        match result.code {
            FetchResultCode::Success => result.content.ok_or_else(|| {
                SidetreeError::with_message(ErrorCode::CasFileNotFound, address.to_string())
            }),
            FetchResultCode::NotFound => Err(SidetreeError::with_message(
                ErrorCode::CasFileNotFound,
                address.to_string(),
            )),
            FetchResultCode::InvalidHash => Err(SidetreeError::with_message(
                ErrorCode::CasFileHashInvalid,
                address.to_string(),
            )),
            FetchResultCode::MaxSizeExceeded => Err(SidetreeError::with_message(
                ErrorCode::CasFileTooLarge,
                address.to_string(),
            )),
            FetchResultCode::CasNotReachable => Err(SidetreeError::with_message(
                ErrorCode::CasNotReachable,
                address.to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cas::InMemoryCas;
    use crate::document::{DIDStatePatch, PublicKeyEntry};
    use crate::jwk::{PublicKeyJwk, JWK};
    use crate::map_file::UpdateReference;
    use crate::operation::UpdateOperation;
    use crate::protocol::Core;
    use crate::store::InMemoryOperationStore;

    fn key_patch(id: &str) -> DIDStatePatch {
        let jwk = JWK::generate_secp256k1().unwrap();
        let mut entry = PublicKeyEntry::try_from(jwk).unwrap();
        entry.id = id.to_string();
        DIDStatePatch::AddPublicKeys {
            public_keys: vec![entry],
        }
    }

    fn signed_update() -> UpdateOperation {
        let (create_op, update_key, _) = Core::create(vec![key_patch("k1")]).unwrap();
        let did_suffix = create_op.did_suffix::<Core>().unwrap();
        let new_update_key = JWK::generate_secp256k1().unwrap();
        let new_update_pk = PublicKeyJwk::try_from(new_update_key.to_public()).unwrap();
        Core::update(did_suffix, &update_key, &new_update_pk, vec![key_patch("k2")]).unwrap()
    }

    async fn anchor_batch(
        cas: &InMemoryCas,
        updates: &[UpdateOperation],
    ) -> TransactionModel {
        let deltas: Vec<serde_json::Value> = updates
            .iter()
            .map(|op| serde_json::to_value(&op.delta).unwrap())
            .collect();
        let chunk_uri = cas
            .write(&ChunkFile::build(deltas).unwrap())
            .await
            .unwrap();
        let references: Vec<UpdateReference> = updates
            .iter()
            .map(|op| UpdateReference {
                did_suffix: op.did_suffix.clone(),
                signed_data: op.signed_data.clone(),
            })
            .collect();
        let map_uri = cas
            .write(&MapFile::build(&chunk_uri, references).unwrap())
            .await
            .unwrap();
        TransactionModel {
            anchor_string: AnchoredData {
                number_of_operations: updates.len() as u32,
                map_file_uri: map_uri,
            }
            .serialize(),
            transaction_time: 7,
            transaction_number: 7,
        }
    }

    #[tokio::test]
    async fn stores_valid_update_operations() {
        let cas = Arc::new(InMemoryCas::new());
        let store = Arc::new(InMemoryOperationStore::new());
        let update = signed_update();
        let transaction = anchor_batch(&cas, std::slice::from_ref(&update)).await;

        let processor = TransactionProcessor::<Core>::new(cas, store.clone());
        let stored = processor.process_transaction(&transaction).await.unwrap();
        assert_eq!(stored, 1);

        let operations = store.get(&update.did_suffix).await.unwrap();
        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].operation_type, OperationType::Update);
        assert_eq!(operations[0].transaction_time, 7);
        // The stored bytes are a structurally valid update operation.
        parse_operation::<Core>(&operations[0].operation_bytes).unwrap();
    }

    #[tokio::test]
    async fn drops_operations_with_broken_signed_data() {
        let cas = Arc::new(InMemoryCas::new());
        let store = Arc::new(InMemoryOperationStore::new());
        let mut update = signed_update();
        update.signed_data = "not.a.jws".to_string();
        let transaction = anchor_batch(&cas, std::slice::from_ref(&update)).await;

        let processor = TransactionProcessor::<Core>::new(cas, store.clone());
        let stored = processor.process_transaction(&transaction).await.unwrap();
        assert_eq!(stored, 0);
        assert!(store.get(&update.did_suffix).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_map_file_is_a_fatal_error() {
        let cas = Arc::new(InMemoryCas::new());
        let store = Arc::new(InMemoryOperationStore::new());
        let transaction = TransactionModel {
            anchor_string: format!("1.{}", Core::hash(b"missing")),
            transaction_time: 1,
            transaction_number: 1,
        };
        let processor = TransactionProcessor::<Core>::new(cas, store);
        let err = processor.process_transaction(&transaction).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CasFileNotFound);
    }

    #[tokio::test]
    async fn delta_count_mismatch_fails_the_transaction() {
        let cas = Arc::new(InMemoryCas::new());
        let store = Arc::new(InMemoryOperationStore::new());
        let update = signed_update();

        // Chunk file with no deltas for one update reference.
        let chunk_uri = cas.write(&ChunkFile::build(vec![]).unwrap()).await.unwrap();
        let map_uri = cas
            .write(
                &MapFile::build(
                    &chunk_uri,
                    vec![UpdateReference {
                        did_suffix: update.did_suffix.clone(),
                        signed_data: update.signed_data.clone(),
                    }],
                )
                .unwrap(),
            )
            .await
            .unwrap();
        let transaction = TransactionModel {
            anchor_string: format!("1.{map_uri}"),
            transaction_time: 1,
            transaction_number: 1,
        };

        let processor = TransactionProcessor::<Core>::new(cas, store);
        let err = processor.process_transaction(&transaction).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ChunkFileDeltaCountIncorrect);
    }
}

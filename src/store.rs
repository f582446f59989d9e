//! Operation store contract and in-memory implementation.
//!
//! The store is a persisted multimap from DID suffix to the set of anchored
//! operations observed for it. `put` is idempotent by anchor key, and `get`'s
//! iteration order is unspecified; the resolver imposes its own order. There
//! is no delete on the normal path, only pruning of consumed updates after
//! checkpointing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use crate::did::DIDSuffix;
use crate::error::SidetreeError;
use crate::operation::AnchoredOperation;

/// Persisted multimap `DIDSuffix -> Set<AnchoredOperation>`.
///
/// Implementations must guarantee that a completed `put` is visible to any
/// subsequent `get`.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Store a batch of anchored operations. Idempotent: an operation whose
    /// anchor key is already present for its DID is ignored.
    async fn put(&self, operations: Vec<AnchoredOperation>) -> Result<(), SidetreeError>;

    /// All operations observed for a DID, in unspecified order.
    async fn get(&self, did_suffix: &DIDSuffix) -> Result<Vec<AnchoredOperation>, SidetreeError>;

    /// Prune update operations anchored strictly before `transaction_time`.
    ///
    /// Permitted for checkpointing only; creates, recovers, and deactivates
    /// are never pruned.
    async fn delete_updates_earlier_than(
        &self,
        did_suffix: &DIDSuffix,
        transaction_time: u64,
    ) -> Result<(), SidetreeError>;
}

/// In-memory [OperationStore].
///
/// The reference implementation of the contract; a node would back this with
/// its database of choice.
#[derive(Default)]
pub struct InMemoryOperationStore {
    // Keyed by anchor key within each DID, which makes `put` idempotency a
    // plain map insert.
    operations: RwLock<HashMap<DIDSuffix, BTreeMap<(u64, u64, u32), AnchoredOperation>>>,
}

impl InMemoryOperationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OperationStore for InMemoryOperationStore {
    async fn put(&self, operations: Vec<AnchoredOperation>) -> Result<(), SidetreeError> {
        let mut map = self.operations.write().await;
        for operation in operations {
            map.entry(operation.did_suffix.clone())
                .or_default()
                .entry(operation.anchor_key())
                .or_insert(operation);
        }
        Ok(())
    }

    async fn get(&self, did_suffix: &DIDSuffix) -> Result<Vec<AnchoredOperation>, SidetreeError> {
        Ok(self
            .operations
            .read()
            .await
            .get(did_suffix)
            .map(|ops| ops.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_updates_earlier_than(
        &self,
        did_suffix: &DIDSuffix,
        transaction_time: u64,
    ) -> Result<(), SidetreeError> {
        if let Some(ops) = self.operations.write().await.get_mut(did_suffix) {
            ops.retain(|_, op| {
                op.transaction_time >= transaction_time
                    || op.operation_type != crate::operation::OperationType::Update
            });
        }
        Ok(())
    }
}

//! Resolver: per-DID state reconstruction.
//!
//! Given everything the store has observed for a DID suffix, the resolver
//! replays operations in the only order the commitment chains admit:
//!
//! 1. the earliest valid Create establishes the state,
//! 2. recovers/deactivates are consumed by following the recovery commitment
//!    chain,
//! 3. updates are consumed by following the update commitment chain.
//!
//! Candidates are bucketed by the commitment they reveal against and tried
//! in anchor-key order, so the result is deterministic for any insertion
//! order, and an adversary anchoring many operations with the same revealed
//! key only ever gets the earliest valid one applied.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::did::DIDSuffix;
use crate::error::SidetreeError;
use crate::operation::{AnchoredOperation, OperationType};
use crate::processor::{DidState, OperationProcessor};
use crate::store::OperationStore;
use crate::version::VersionManager;

pub struct Resolver {
    store: Arc<dyn OperationStore>,
    versions: Arc<dyn VersionManager>,
}

impl Resolver {
    pub fn new(store: Arc<dyn OperationStore>, versions: Arc<dyn VersionManager>) -> Self {
        Self { store, versions }
    }

    /// Compute the current authoritative state of a DID.
    ///
    /// Returns `Ok(None)` when the DID is not found, including when every
    /// stored operation for it is invalid. Individual bad operations are
    /// skipped, never errors: only store I/O can fail here.
    pub async fn resolve(&self, did_suffix: &DIDSuffix) -> Result<Option<DidState>, SidetreeError> {
        let operations = self.store.get(did_suffix).await?;
        debug!(
            did_suffix = %did_suffix,
            operations = operations.len(),
            "resolving DID"
        );

        let mut creates = Vec::new();
        let mut updates = Vec::new();
        let mut recovers_and_deactivates = Vec::new();
        for operation in operations {
            match operation.operation_type {
                OperationType::Create => creates.push(operation),
                OperationType::Update => updates.push(operation),
                OperationType::Recover | OperationType::Deactivate => {
                    recovers_and_deactivates.push(operation)
                }
            }
        }

        let Some(mut state) = self.apply_first_valid_create(creates) else {
            return Ok(None);
        };

        // Recovery chain: recovers and deactivates compete for the same
        // commitments.
        let buckets = self.bucket_by_reveal_commitment(recovers_and_deactivates);
        state = self.apply_commitment_chain(state, buckets, |state| {
            state.next_recovery_commitment.clone()
        });

        // Update chain. Only one update per commitment can succeed, since
        // success shifts the commitment forward; same-reveal losers are
        // skipped by the earliest-anchor-key rule.
        let buckets = self.bucket_by_reveal_commitment(updates);
        state = self.apply_commitment_chain(state, buckets, |state| {
            state.next_update_commitment.clone()
        });

        Ok(Some(state))
    }

    /// The earliest create (by anchor key) that the processor accepts wins;
    /// every other candidate is skipped forever.
    fn apply_first_valid_create(&self, mut creates: Vec<AnchoredOperation>) -> Option<DidState> {
        creates.sort_by_key(AnchoredOperation::anchor_key);
        for create in &creates {
            let processor = self.versions.operation_processor(create.transaction_time);
            if let Some(state) = processor.apply(create, None) {
                return Some(state);
            }
        }
        None
    }

    /// Group candidate operations by the commitment each reveals against,
    /// each bucket sorted by anchor key.
    fn bucket_by_reveal_commitment(
        &self,
        operations: Vec<AnchoredOperation>,
    ) -> HashMap<String, Vec<AnchoredOperation>> {
        let mut buckets: HashMap<String, Vec<AnchoredOperation>> = HashMap::new();
        for operation in operations {
            let processor = self.versions.operation_processor(operation.transaction_time);
            // Operations whose reveal cannot even be computed can never
            // apply; leave them out of every bucket.
            if let Some(commitment) = processor.reveal_commitment(&operation) {
                buckets.entry(commitment).or_default().push(operation);
            }
        }
        for bucket in buckets.values_mut() {
            bucket.sort_by_key(AnchoredOperation::anchor_key);
        }
        buckets
    }

    /// Walk one commitment chain: while the current commitment has a
    /// non-empty bucket, try its entries in anchor-key order; the first that
    /// applies advances the state, failures are dropped individually.
    fn apply_commitment_chain(
        &self,
        mut state: DidState,
        mut buckets: HashMap<String, Vec<AnchoredOperation>>,
        current_commitment: impl Fn(&DidState) -> Option<String>,
    ) -> DidState {
        while !state.is_deactivated {
            let Some(commitment) = current_commitment(&state) else {
                break;
            };
            let Some(bucket) = buckets.get_mut(&commitment) else {
                break;
            };
            let mut applied = false;
            while !bucket.is_empty() {
                let candidate = bucket.remove(0);
                let processor = self.versions.operation_processor(candidate.transaction_time);
                if let Some(next) = processor.apply(&candidate, Some(&state)) {
                    state = next;
                    applied = true;
                    break;
                }
            }
            if buckets
                .get(&commitment)
                .is_some_and(|bucket| bucket.is_empty())
            {
                buckets.remove(&commitment);
            }
            if !applied {
                break;
            }
        }
        state
    }
}

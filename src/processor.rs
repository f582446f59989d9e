//! Operation processor: the per-operation state transition.
//!
//! [`apply`](OperationProcessor::apply) is a total function over
//! `(prior state, anchored operation)`. It never fails: any internal error
//! (malformed bytes, bad key material, signature mismatch, commitment
//! mismatch, invalid patches) means the operation is rejected and the prior
//! state stands. Rejected operations stay in the store; they are simply
//! skipped at resolution time, so adversarial submissions cannot delete
//! legitimate ones.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::document::DocumentState;
use crate::operation::{
    parse_operation, AnchoredOperation, PartiallyVerifiedCreateOperation,
    PartiallyVerifiedDeactivateOperation, PartiallyVerifiedOperation,
    PartiallyVerifiedRecoverOperation, PartiallyVerifiedUpdateOperation,
};
use crate::protocol::Sidetree;

/// The authoritative state of a DID at a point in the operation chain.
///
/// Rebuilt on each resolve from the store's current contents; never
/// persisted incrementally.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DidState {
    pub document: DocumentState,
    /// Commitment the next recover or deactivate must reveal against.
    /// `None` once deactivated.
    pub next_recovery_commitment: Option<String>,
    /// Commitment the next update must reveal against. `None` once
    /// deactivated.
    pub next_update_commitment: Option<String>,
    /// Transaction number of the last operation applied successfully.
    pub last_operation_transaction_number: u64,
    pub is_deactivated: bool,
}

/// Per-protocol-version operation processor.
///
/// Object-safe so the [version manager](crate::version::VersionManager) can
/// hand out the processor for any historical epoch.
pub trait OperationProcessor: Send + Sync {
    /// Apply one anchored operation onto the prior state.
    ///
    /// Returns `None` to mean "reject: state unchanged". A `Create` is only
    /// applicable when `prior` is `None`; every other kind requires an
    /// existing, non-deactivated state.
    fn apply(&self, operation: &AnchoredOperation, prior: Option<&DidState>) -> Option<DidState>;

    /// The commitment the operation's revealed key hashes to, if the
    /// operation parses and carries a reveal (Update, Recover, Deactivate).
    ///
    /// The resolver uses this to bucket candidate operations by the
    /// commitment they could satisfy.
    fn reveal_commitment(&self, operation: &AnchoredOperation) -> Option<String>;
}

/// [OperationProcessor] for one [Sidetree] parameter set.
pub struct VersionedOperationProcessor<S: Sidetree> {
    _marker: PhantomData<S>,
}

impl<S: Sidetree> VersionedOperationProcessor<S> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<S: Sidetree> Default for VersionedOperationProcessor<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Sidetree> VersionedOperationProcessor<S> {
    fn apply_create(
        &self,
        op: PartiallyVerifiedCreateOperation,
        anchored: &AnchoredOperation,
    ) -> Option<DidState> {
        // Of the create candidates stored under this suffix, only the one
        // whose suffix data actually hashes to it can apply.
        if op.did_suffix != anchored.did_suffix {
            return None;
        }
        // Patches that fail to compose yield an empty initial document; the
        // commitments are established regardless.
        let document = DocumentState::default()
            .with_patches(&op.patches)
            .unwrap_or_default();
        Some(DidState {
            document,
            next_recovery_commitment: Some(op.recovery_commitment),
            next_update_commitment: Some(op.update_commitment),
            last_operation_transaction_number: anchored.transaction_number,
            is_deactivated: false,
        })
    }

    fn apply_update(
        &self,
        op: PartiallyVerifiedUpdateOperation,
        anchored: &AnchoredOperation,
        prior: &DidState,
    ) -> Option<DidState> {
        if op.did_suffix != anchored.did_suffix {
            return None;
        }
        let current_commitment = prior.next_update_commitment.as_ref()?;
        if &op.reveal_commitment != current_commitment {
            return None;
        }
        // A structurally valid update whose patches fail to compose keeps
        // the document but still advances the update commitment; otherwise a
        // malformed delta could lock update progress forever.
        let document = prior
            .document
            .with_patches(&op.patches)
            .unwrap_or_else(|_| prior.document.clone());
        Some(DidState {
            document,
            next_recovery_commitment: prior.next_recovery_commitment.clone(),
            next_update_commitment: Some(op.update_commitment),
            last_operation_transaction_number: anchored.transaction_number,
            is_deactivated: false,
        })
    }

    fn apply_recover(
        &self,
        op: PartiallyVerifiedRecoverOperation,
        anchored: &AnchoredOperation,
        prior: &DidState,
    ) -> Option<DidState> {
        if op.did_suffix != anchored.did_suffix {
            return None;
        }
        let current_commitment = prior.next_recovery_commitment.as_ref()?;
        if &op.reveal_commitment != current_commitment {
            return None;
        }
        // Recovery starts over from an empty document; patches begin with a
        // `replace` by convention.
        let document = DocumentState::default()
            .with_patches(&op.patches)
            .unwrap_or_default();
        Some(DidState {
            document,
            next_recovery_commitment: Some(op.new_recovery_commitment),
            next_update_commitment: Some(op.update_commitment),
            last_operation_transaction_number: anchored.transaction_number,
            is_deactivated: false,
        })
    }

    fn apply_deactivate(
        &self,
        op: PartiallyVerifiedDeactivateOperation,
        anchored: &AnchoredOperation,
        prior: &DidState,
    ) -> Option<DidState> {
        if op.did_suffix != anchored.did_suffix {
            return None;
        }
        let current_commitment = prior.next_recovery_commitment.as_ref()?;
        if &op.reveal_commitment != current_commitment {
            return None;
        }
        Some(DidState {
            document: DocumentState::default(),
            next_recovery_commitment: None,
            next_update_commitment: None,
            last_operation_transaction_number: anchored.transaction_number,
            is_deactivated: true,
        })
    }
}

impl<S: Sidetree + Send + Sync> OperationProcessor for VersionedOperationProcessor<S> {
    fn apply(&self, operation: &AnchoredOperation, prior: Option<&DidState>) -> Option<DidState> {
        if prior.is_some_and(|state| state.is_deactivated) {
            return None;
        }
        // An operation anchored before the one that established the current
        // commitment cannot legitimately reveal it; rejecting keeps
        // `last_operation_transaction_number` non-decreasing.
        if prior.is_some_and(|state| {
            operation.transaction_number < state.last_operation_transaction_number
        }) {
            return None;
        }
        let parsed = parse_operation::<S>(&operation.operation_bytes).ok()?;
        match (parsed, prior) {
            (PartiallyVerifiedOperation::Create(op), None) => self.apply_create(op, operation),
            // The first valid create wins; later creates never overwrite.
            (PartiallyVerifiedOperation::Create(_), Some(_)) => None,
            (_, None) => None,
            (PartiallyVerifiedOperation::Update(op), Some(state)) => {
                self.apply_update(op, operation, state)
            }
            (PartiallyVerifiedOperation::Recover(op), Some(state)) => {
                self.apply_recover(op, operation, state)
            }
            (PartiallyVerifiedOperation::Deactivate(op), Some(state)) => {
                self.apply_deactivate(op, operation, state)
            }
        }
    }

    fn reveal_commitment(&self, operation: &AnchoredOperation) -> Option<String> {
        let parsed = parse_operation::<S>(&operation.operation_bytes).ok()?;
        parsed.reveal_commitment().map(str::to_string)
    }
}

//! End-to-end resolution scenarios over the in-memory store.
//!
//! These exercise the whole chain: operation construction, anchoring,
//! storage, and per-DID state reconstruction through the commitment chains.

use std::sync::Arc;

use lazy_static::lazy_static;
use sidetree_core::document::{
    DIDStatePatch, DocumentState, PublicKeyEntry, ServiceEndpointEntry,
};
use sidetree_core::jwk::{PublicKeyJwk, JWK};
use sidetree_core::operation::{AnchoredOperation, Operation, OperationType};
use sidetree_core::processor::{DidState, VersionedOperationProcessor};
use sidetree_core::protocol::{Core, Sidetree};
use sidetree_core::store::{InMemoryOperationStore, OperationStore};
use sidetree_core::version::VersionTable;
use sidetree_core::{DIDSuffix, Resolver};

fn key_patch(id: &str) -> DIDStatePatch {
    DIDStatePatch::AddPublicKeys {
        public_keys: vec![key_entry(id)],
    }
}

fn key_entry(id: &str) -> PublicKeyEntry {
    let jwk = JWK::generate_secp256k1().unwrap();
    let mut entry = PublicKeyEntry::try_from(jwk).unwrap();
    entry.id = id.to_string();
    entry
}

fn service_entry(id: &str) -> ServiceEndpointEntry {
    ServiceEndpointEntry {
        id: id.to_string(),
        r#type: "IdentityHub".to_string(),
        service_endpoint: serde_json::json!("https://hub.example.com/"),
    }
}

fn service_patch(id: &str) -> DIDStatePatch {
    DIDStatePatch::AddServiceEndpoints {
        service_endpoints: vec![service_entry(id)],
    }
}

/// Anchor an operation at `(time, time, index)`.
fn anchored(operation: &Operation, time: u64, index: u32) -> AnchoredOperation {
    operation.anchored::<Core>(time, time, index).unwrap()
}

fn new_resolver(store: Arc<InMemoryOperationStore>) -> Resolver {
    let versions = VersionTable::single(Arc::new(VersionedOperationProcessor::<Core>::new()));
    Resolver::new(store, Arc::new(versions))
}

async fn resolve(store: &Arc<InMemoryOperationStore>, suffix: &DIDSuffix) -> Option<DidState> {
    new_resolver(store.clone()).resolve(suffix).await.unwrap()
}

fn new_public_key() -> (JWK, PublicKeyJwk) {
    let key = JWK::generate_secp256k1().unwrap();
    let pk = PublicKeyJwk::try_from(key.to_public()).unwrap();
    (key, pk)
}

#[tokio::test]
async fn create_only() {
    let (create_op, _, _) =
        Core::create(vec![key_patch("signingKey"), service_patch("dummyHubUri1")]).unwrap();
    let suffix = create_op.did_suffix::<Core>().unwrap();

    let store = Arc::new(InMemoryOperationStore::new());
    store.put(vec![anchored(&create_op, 1, 1)]).await.unwrap();

    let state = resolve(&store, &suffix).await.unwrap();
    assert_eq!(state.document.public_keys.len(), 1);
    assert_eq!(state.document.public_keys[0].id, "signingKey");
    assert_eq!(state.document.service_endpoints.len(), 1);
    assert_eq!(state.document.service_endpoints[0].id, "dummyHubUri1");
    assert!(!state.is_deactivated);
    assert_eq!(state.last_operation_transaction_number, 1);
}

/// Full lifecycle: create, two updates, recover, two more updates.
///
/// Returns the history so the determinism test can replay permutations.
fn full_lifecycle_history() -> (DIDSuffix, Vec<AnchoredOperation>) {
    let (create_op, update_key_1, recovery_key_1) =
        Core::create(vec![key_patch("signingKey"), service_patch("dummyHubUri1")]).unwrap();
    let suffix = create_op.did_suffix::<Core>().unwrap();

    // Two updates before recovery, each rotating the update key.
    let (update_key_2, update_pk_2) = new_public_key();
    let update_1 = Core::update(
        suffix.clone(),
        &update_key_1,
        &update_pk_2,
        vec![key_patch("additionalKey")],
    )
    .unwrap();

    let (_update_key_3, update_pk_3) = new_public_key();
    let update_2 = Core::update(
        suffix.clone(),
        &update_key_2,
        &update_pk_3,
        vec![service_patch("dummyHubUri2")],
    )
    .unwrap();

    // Recovery replaces the document and both commitment chains.
    let (update_key_4, update_pk_4) = new_public_key();
    let (_recovery_key_2, recovery_pk_2) = new_public_key();
    let recover_op = Core::recover_existing(
        suffix.clone(),
        &recovery_key_1,
        &update_pk_4,
        &recovery_pk_2,
        vec![DIDStatePatch::Replace {
            document: DocumentState {
                public_keys: vec![key_entry("newSigningKey")],
                service_endpoints: vec![service_entry("newDummyHubUri1")],
            },
        }],
    )
    .unwrap();

    // Two updates on the post-recovery chain.
    let (update_key_5, update_pk_5) = new_public_key();
    let update_3 = Core::update(
        suffix.clone(),
        &update_key_4,
        &update_pk_5,
        vec![key_patch("newKey2")],
    )
    .unwrap();

    let (_update_key_6, update_pk_6) = new_public_key();
    let update_4 = Core::update(
        suffix.clone(),
        &update_key_5,
        &update_pk_6,
        vec![
            DIDStatePatch::RemoveServiceEndpoints {
                ids: vec!["newDummyHubUri1".to_string()],
            },
            DIDStatePatch::AddServiceEndpoints {
                service_endpoints: vec![service_entry("newDummyHubUri2")],
            },
        ],
    )
    .unwrap();

    let history = vec![
        anchored(&create_op, 1, 1),
        anchored(&Operation::Update(update_1), 2, 1),
        anchored(&Operation::Update(update_2), 3, 1),
        anchored(&recover_op, 4, 1),
        anchored(&Operation::Update(update_3), 5, 1),
        anchored(&Operation::Update(update_4), 6, 1),
    ];
    (suffix, history)
}

lazy_static! {
    static ref LIFECYCLE: (DIDSuffix, Vec<AnchoredOperation>) = full_lifecycle_history();
}

#[tokio::test]
async fn create_updates_recover_updates() {
    let (suffix, history) = LIFECYCLE.clone();

    // Before the recover, both updates have taken effect.
    let store = Arc::new(InMemoryOperationStore::new());
    store.put(history[0..3].to_vec()).await.unwrap();
    let state = resolve(&store, &suffix).await.unwrap();
    assert_eq!(state.document.public_keys.len(), 2);
    assert_eq!(state.document.service_endpoints.len(), 2);

    // After the full replay only the post-recovery chain is visible.
    store.put(history[3..].to_vec()).await.unwrap();
    let state = resolve(&store, &suffix).await.unwrap();
    let mut key_ids: Vec<&str> = state
        .document
        .public_keys
        .iter()
        .map(|key| key.id.as_str())
        .collect();
    key_ids.sort_unstable();
    assert_eq!(key_ids, vec!["newKey2", "newSigningKey"]);
    assert_eq!(state.document.service_endpoints.len(), 1);
    assert_eq!(state.document.service_endpoints[0].id, "newDummyHubUri2");
    assert_eq!(state.last_operation_transaction_number, 6);
}

#[tokio::test]
async fn resolution_is_deterministic_over_insertion_order() {
    let (suffix, history) = LIFECYCLE.clone();

    let store = Arc::new(InMemoryOperationStore::new());
    store.put(history.clone()).await.unwrap();
    let expected = resolve(&store, &suffix).await.unwrap();

    let mut reversed = history.clone();
    reversed.reverse();
    let mut interleaved = history.clone();
    interleaved.swap(0, 3);
    interleaved.swap(1, 5);

    for permutation in [reversed, interleaved] {
        let store = Arc::new(InMemoryOperationStore::new());
        for operation in permutation {
            store.put(vec![operation]).await.unwrap();
        }
        let state = resolve(&store, &suffix).await.unwrap();
        assert_eq!(state, expected);
    }
}

#[tokio::test]
async fn same_reveal_recovers_earliest_wins() {
    let (create_op, _, recovery_key_1) = Core::create(vec![key_patch("k1")]).unwrap();
    let suffix = create_op.did_suffix::<Core>().unwrap();

    // Three recover operations all revealing the original recovery key,
    // anchored at times 4, 2, and 3; inserted out of order.
    let mut recovery_commitments = std::collections::HashMap::new();
    let mut anchored_recovers = Vec::new();
    for time in [4, 2, 3] {
        let (_update_key, update_pk) = new_public_key();
        let (_recovery_key, recovery_pk) = new_public_key();
        let recover_op = Core::recover_existing(
            suffix.clone(),
            &recovery_key_1,
            &update_pk,
            &recovery_pk,
            vec![key_patch(&format!("keyFromTime{time}"))],
        )
        .unwrap();
        recovery_commitments.insert(time, Core::commitment_scheme(&recovery_pk).unwrap());
        anchored_recovers.push(anchored(&recover_op, time, 1));
    }

    let store = Arc::new(InMemoryOperationStore::new());
    store.put(vec![anchored(&create_op, 1, 1)]).await.unwrap();
    store.put(anchored_recovers).await.unwrap();

    let state = resolve(&store, &suffix).await.unwrap();
    assert_eq!(state.last_operation_transaction_number, 2);
    assert_eq!(
        state.next_recovery_commitment.as_deref(),
        Some(recovery_commitments[&2].as_str())
    );
    assert_eq!(state.document.public_keys.len(), 1);
    assert_eq!(state.document.public_keys[0].id, "keyFromTime2");
}

#[tokio::test]
async fn same_reveal_updates_earliest_wins() {
    let (create_op, update_key_1, _) = Core::create(vec![key_patch("k1")]).unwrap();
    let suffix = create_op.did_suffix::<Core>().unwrap();

    let mut update_commitments = std::collections::HashMap::new();
    let mut anchored_updates = Vec::new();
    for time in [4, 2, 3] {
        let (_update_key, update_pk) = new_public_key();
        let update_op = Core::update(
            suffix.clone(),
            &update_key_1,
            &update_pk,
            vec![key_patch(&format!("keyFromTime{time}"))],
        )
        .unwrap();
        update_commitments.insert(time, Core::commitment_scheme(&update_pk).unwrap());
        anchored_updates.push(anchored(&Operation::Update(update_op), time, 1));
    }

    let store = Arc::new(InMemoryOperationStore::new());
    store.put(vec![anchored(&create_op, 1, 1)]).await.unwrap();
    store.put(anchored_updates).await.unwrap();

    let state = resolve(&store, &suffix).await.unwrap();
    assert_eq!(state.last_operation_transaction_number, 2);
    assert_eq!(
        state.next_update_commitment.as_deref(),
        Some(update_commitments[&2].as_str())
    );
    // Only the earliest update's patch took effect.
    let mut key_ids: Vec<&str> = state
        .document
        .public_keys
        .iter()
        .map(|key| key.id.as_str())
        .collect();
    key_ids.sort_unstable();
    assert_eq!(key_ids, vec!["k1", "keyFromTime2"]);
}

#[tokio::test]
async fn internal_errors_resolve_to_none_not_panics() {
    let store = Arc::new(InMemoryOperationStore::new());
    let suffix = DIDSuffix(Core::hash(b"some did"));

    // Garbage bytes.
    store
        .put(vec![AnchoredOperation {
            operation_type: OperationType::Create,
            did_suffix: suffix.clone(),
            operation_bytes: b"\x00 not json".to_vec(),
            transaction_time: 1,
            transaction_number: 1,
            operation_index: 1,
        }])
        .await
        .unwrap();
    assert!(resolve(&store, &suffix).await.is_none());

    // A well-formed create stored under a suffix it does not hash to.
    let (foreign_create, _, _) = Core::create(vec![key_patch("k1")]).unwrap();
    let mut mismatched = anchored(&foreign_create, 2, 1);
    mismatched.did_suffix = suffix.clone();
    store.put(vec![mismatched]).await.unwrap();
    assert!(resolve(&store, &suffix).await.is_none());
}

#[tokio::test]
async fn earliest_valid_create_wins_over_earlier_invalid_one() {
    let (create_op, _, _) = Core::create(vec![key_patch("k1")]).unwrap();
    let suffix = create_op.did_suffix::<Core>().unwrap();

    // An adversarial create under the same suffix, anchored earlier, whose
    // suffix data does not hash to it.
    let (foreign_create, _, _) = Core::create(vec![key_patch("evil")]).unwrap();
    let mut foreign = anchored(&foreign_create, 1, 1);
    foreign.did_suffix = suffix.clone();

    let store = Arc::new(InMemoryOperationStore::new());
    store
        .put(vec![foreign, anchored(&create_op, 2, 1)])
        .await
        .unwrap();

    let state = resolve(&store, &suffix).await.unwrap();
    assert_eq!(state.last_operation_transaction_number, 2);
    assert_eq!(state.document.public_keys[0].id, "k1");
}

#[tokio::test]
async fn deactivate_beats_later_recover_with_same_reveal() {
    let (create_op, _, recovery_key) = Core::create(vec![key_patch("k1")]).unwrap();
    let suffix = create_op.did_suffix::<Core>().unwrap();

    let deactivate_op = Core::deactivate(suffix.clone(), recovery_key.clone()).unwrap();
    let (recover_op, _, _) =
        Core::recover(suffix.clone(), &recovery_key, vec![key_patch("phoenix")]).unwrap();

    let store = Arc::new(InMemoryOperationStore::new());
    store
        .put(vec![
            anchored(&create_op, 1, 1),
            anchored(&recover_op, 3, 1),
            anchored(&Operation::Deactivate(deactivate_op), 2, 1),
        ])
        .await
        .unwrap();

    let state = resolve(&store, &suffix).await.unwrap();
    assert!(state.is_deactivated);
    assert!(state.document.public_keys.is_empty());
    assert!(state.next_recovery_commitment.is_none());
    assert!(state.next_update_commitment.is_none());
    assert_eq!(state.last_operation_transaction_number, 2);
}

#[tokio::test]
async fn updates_after_deactivation_are_skipped() {
    let (create_op, update_key, recovery_key) = Core::create(vec![key_patch("k1")]).unwrap();
    let suffix = create_op.did_suffix::<Core>().unwrap();

    let deactivate_op = Core::deactivate(suffix.clone(), recovery_key).unwrap();
    let (_new_update_key, new_update_pk) = new_public_key();
    let update_op = Core::update(
        suffix.clone(),
        &update_key,
        &new_update_pk,
        vec![key_patch("late")],
    )
    .unwrap();

    let store = Arc::new(InMemoryOperationStore::new());
    store
        .put(vec![
            anchored(&create_op, 1, 1),
            anchored(&Operation::Deactivate(deactivate_op), 2, 1),
            anchored(&Operation::Update(update_op), 3, 1),
        ])
        .await
        .unwrap();

    let state = resolve(&store, &suffix).await.unwrap();
    assert!(state.is_deactivated);
    assert_eq!(state.last_operation_transaction_number, 2);
}

#[tokio::test]
async fn anchor_key_breaks_ties_within_one_transaction() {
    let (create_op, update_key, _) = Core::create(vec![key_patch("k1")]).unwrap();
    let suffix = create_op.did_suffix::<Core>().unwrap();

    // Two updates with the same reveal in the same transaction; only the
    // lower operation index applies.
    let (_k_a, pk_a) = new_public_key();
    let update_a = Core::update(suffix.clone(), &update_key, &pk_a, vec![key_patch("a")]).unwrap();
    let (_k_b, pk_b) = new_public_key();
    let update_b = Core::update(suffix.clone(), &update_key, &pk_b, vec![key_patch("b")]).unwrap();

    let store = Arc::new(InMemoryOperationStore::new());
    store
        .put(vec![
            anchored(&create_op, 1, 1),
            Operation::Update(update_b).anchored::<Core>(2, 2, 5).unwrap(),
            Operation::Update(update_a).anchored::<Core>(2, 2, 2).unwrap(),
        ])
        .await
        .unwrap();

    let state = resolve(&store, &suffix).await.unwrap();
    let mut key_ids: Vec<&str> = state
        .document
        .public_keys
        .iter()
        .map(|key| key.id.as_str())
        .collect();
    key_ids.sort_unstable();
    assert_eq!(key_ids, vec!["a", "k1"]);
}

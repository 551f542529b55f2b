//! Deletion protocol tests: remote delete gating, 404 handling, and
//! finalizer clearing.

mod common;

use common::Harness;
use fabsync::kinds::server::{ServerKind, ServerSpec};
use fabsync::model::{Key, ProvisionState, RECLAIM_ANNOTATION};
use fabsync::store::ObjectStore;
use fabsync::testing;

fn spec_on_nyc1() -> ServerSpec {
    ServerSpec {
        site: "nyc1".into(),
        ..Default::default()
    }
}

/// Create the desired object, twin, and remote entity, then request
/// deletion. Returns the desired key.
async fn provisioned(h: &Harness<ServerKind>, annotations: &[(&str, &str)]) -> Key {
    h.api
        .with_state(|state| state.sites.push(testing::site(3, "nyc1")));
    let key = h.seed_desired("web-1", annotations, spec_on_nyc1()).await;
    h.settle_cr(&key).await;
    let twin_key = h.twin_key(&key).await;
    h.meta.reconcile(&twin_key).await.unwrap();
    assert!(h.twin(&key).await.unwrap().spec.remote_id > 0);
    key
}

#[tokio::test]
async fn delete_removes_remote_twin_and_finalizer() {
    let h = Harness::new(ServerKind);
    let key = provisioned(&h, &[]).await;
    let twin_key = h.twin_key(&key).await;

    h.desired.delete(&key).await.unwrap();
    h.cr.reconcile(&key).await.unwrap();

    assert_eq!(h.api.calls.deletes(), 1);
    h.api.with_state(|state| assert!(state.servers.is_empty()));
    assert!(h.twins.get(&twin_key).await.unwrap().is_none());
    // Finalizer cleared, so the store let go of the object.
    assert!(h.desired.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn reclaim_retain_never_calls_remote_delete() {
    let h = Harness::new(ServerKind);
    let key = provisioned(&h, &[(RECLAIM_ANNOTATION, "retain")]).await;

    h.desired.delete(&key).await.unwrap();
    h.cr.reconcile(&key).await.unwrap();

    assert_eq!(h.api.calls.deletes(), 0);
    // The remote entity is deliberately orphaned.
    h.api
        .with_state(|state| assert_eq!(state.servers.len(), 1));
    assert!(h.desired.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn remote_404_on_delete_counts_as_success() {
    let h = Harness::new(ServerKind);
    let key = provisioned(&h, &[]).await;
    let twin_key = h.twin_key(&key).await;
    h.api.set_delete_status(Some(404));

    h.desired.delete(&key).await.unwrap();
    h.cr.reconcile(&key).await.unwrap();

    assert_eq!(h.api.calls.deletes(), 1);
    assert!(h.twins.get(&twin_key).await.unwrap().is_none());
    assert!(h.desired.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn remote_failure_keeps_finalizer_for_retry() {
    let h = Harness::new(ServerKind);
    let key = provisioned(&h, &[]).await;
    let twin_key = h.twin_key(&key).await;
    h.api.set_delete_status(Some(500));

    h.desired.delete(&key).await.unwrap();
    h.cr.reconcile(&key).await.unwrap();

    // Protocol aborted: everything stays, status says why.
    let desired = h.desired.get(&key).await.unwrap().unwrap();
    assert_eq!(desired.status.state, ProvisionState::Failure);
    assert!(desired.meta.has_cleanup_finalizer());
    assert!(h.twins.get(&twin_key).await.unwrap().is_some());

    // The next reconcile retries and completes the protocol.
    h.api.set_delete_status(None);
    h.cr.reconcile(&key).await.unwrap();
    assert!(h.desired.get(&key).await.unwrap().is_none());
    assert!(h.twins.get(&twin_key).await.unwrap().is_none());
}

#[tokio::test]
async fn twin_with_unknown_remote_id_skips_the_remote_call() {
    let h = Harness::new(ServerKind);
    h.api
        .with_state(|state| state.sites.push(testing::site(3, "nyc1")));
    let key = h.seed_desired("web-1", &[], spec_on_nyc1()).await;
    h.settle_cr(&key).await;
    assert_eq!(h.twin(&key).await.unwrap().spec.remote_id, 0);

    h.desired.delete(&key).await.unwrap();
    h.cr.reconcile(&key).await.unwrap();

    assert_eq!(h.api.calls.deletes(), 0);
    assert!(h.desired.get(&key).await.unwrap().is_none());
}

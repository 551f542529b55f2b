//! End-to-end reconcile tests: desired object → twin → fake remote.

mod common;

use common::Harness;
use fabsync::kinds::server::{ServerKind, ServerSpec};
use fabsync::model::{IMPORT_ANNOTATION, ObjectStatus, ProvisionState};
use fabsync::store::ObjectStore;
use fabsync::testing::{self, FakeControlPlane};
use fabsync_api::types::{AddressRef, IdName};

fn seed_site(api: &FakeControlPlane) {
    api.with_state(|state| state.sites.push(testing::site(3, "nyc1")));
}

fn spec_on_nyc1() -> ServerSpec {
    ServerSpec {
        site: "nyc1".into(),
        description: "frontend".into(),
        main_ip: "192.0.2.10".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn unresolvable_site_reports_failure_and_creates_no_twin() {
    let h = Harness::new(ServerKind);
    let key = h
        .seed_desired(
            "web-1",
            &[],
            ServerSpec {
                site: "nyc1".into(),
                ..Default::default()
            },
        )
        .await;

    h.settle_cr(&key).await;

    assert_eq!(
        h.status(&key).await,
        ObjectStatus::failure("invalid site 'nyc1'")
    );
    assert!(h.twin(&key).await.is_none());
    assert_eq!(h.api.calls.writes(), 0);
}

#[tokio::test]
async fn create_then_converge_issues_no_further_writes() {
    let h = Harness::new(ServerKind);
    seed_site(&h.api);
    let key = h.seed_desired("web-1", &[], spec_on_nyc1()).await;

    h.settle_cr(&key).await;
    let twin_key = h.twin_key(&key).await;
    assert_eq!(h.twin(&key).await.unwrap().spec.remote_id, 0);

    // First pass creates the remote entity and persists the ID.
    h.meta.reconcile(&twin_key).await.unwrap();
    let remote_id = h.twin(&key).await.unwrap().spec.remote_id;
    assert!(remote_id > 0);
    assert_eq!(h.api.calls.creates(), 1);

    // Converged: repeat passes issue zero remote writes.
    h.meta.reconcile(&twin_key).await.unwrap();
    h.meta.reconcile(&twin_key).await.unwrap();
    assert_eq!(h.api.calls.creates(), 1);
    assert_eq!(h.api.calls.updates(), 0);
    assert_eq!(h.api.calls.deletes(), 0);

    assert_eq!(h.status(&key).await.state, ProvisionState::Ok);

    // Remotely assigned values flow back onto the blank desired fields.
    let desired = h.desired.get(&key).await.unwrap().unwrap();
    assert_eq!(desired.spec.main_ip, "192.0.2.10");
    assert!(!desired.spec.mgmt_ip.is_empty());
    assert_ne!(desired.spec.asn, 0);
}

#[tokio::test]
async fn generation_bump_regenerates_twin_and_keeps_remote_id() {
    let h = Harness::new(ServerKind);
    seed_site(&h.api);
    let key = h.seed_desired("web-1", &[], spec_on_nyc1()).await;
    h.settle_cr(&key).await;
    let twin_key = h.twin_key(&key).await;
    h.meta.reconcile(&twin_key).await.unwrap();
    let remote_id = h.twin(&key).await.unwrap().spec.remote_id;

    // Author edits the spec; the runtime bumps the generation.
    let mut desired = h.desired.get(&key).await.unwrap().unwrap();
    desired.spec.description = "frontend v2".into();
    desired.meta.generation += 1;
    let generation = desired.meta.generation;
    h.desired.update(desired).await.unwrap();

    h.cr.reconcile(&key).await.unwrap();
    let twin = h.twin(&key).await.unwrap();
    assert_eq!(twin.spec.source_generation, generation);
    assert_eq!(twin.spec.remote_id, remote_id);
    assert_eq!(twin.spec.payload.description, "frontend v2");
}

#[tokio::test]
async fn field_drift_issues_exactly_one_update() {
    let h = Harness::new(ServerKind);
    seed_site(&h.api);
    let key = h.seed_desired("web-1", &[], spec_on_nyc1()).await;
    h.settle_cr(&key).await;
    let twin_key = h.twin_key(&key).await;
    h.meta.reconcile(&twin_key).await.unwrap();
    h.meta.reconcile(&twin_key).await.unwrap();
    assert_eq!(h.api.calls.updates(), 0);

    let mut desired = h.desired.get(&key).await.unwrap().unwrap();
    desired.spec.description = "frontend v2".into();
    desired.meta.generation += 1;
    h.desired.update(desired).await.unwrap();
    h.cr.reconcile(&key).await.unwrap();

    h.meta.reconcile(&twin_key).await.unwrap();
    assert_eq!(h.api.calls.updates(), 1);
    let remote_id = h.twin(&key).await.unwrap().spec.remote_id;
    h.api.with_state(|state| {
        let remote = state.servers.iter().find(|s| s.id == remote_id).unwrap();
        assert_eq!(remote.description, "frontend v2");
    });
    assert_eq!(h.status(&key).await.state, ProvisionState::Ok);

    // Back in sync: the next pass writes nothing.
    h.meta.reconcile(&twin_key).await.unwrap();
    assert_eq!(h.api.calls.updates(), 1);
}

#[tokio::test]
async fn import_adopts_existing_remote_entity_without_create() {
    let h = Harness::new(ServerKind);
    seed_site(&h.api);
    h.api.with_state(|state| {
        state.servers.push(fabsync_api::types::RemoteServer {
            id: 42,
            name: "web-1".into(),
            site: IdName::new(3, "nyc1"),
            main_ip: AddressRef {
                address: "203.0.113.5".into(),
            },
            asn: 65099,
            ..Default::default()
        });
    });

    let key = h
        .seed_desired(
            "web-1",
            &[(IMPORT_ANNOTATION, "true")],
            ServerSpec {
                site: "nyc1".into(),
                ..Default::default()
            },
        )
        .await;
    h.settle_cr(&key).await;
    let twin_key = h.twin_key(&key).await;
    assert!(h.twin(&key).await.unwrap().spec.imported);

    h.meta.reconcile(&twin_key).await.unwrap();

    assert_eq!(h.twin(&key).await.unwrap().spec.remote_id, 42);
    assert_eq!(h.api.calls.creates(), 0);
    assert_eq!(h.status(&key).await.state, ProvisionState::Ok);

    // Blank desired fields are backfilled from the imported entity.
    let desired = h.desired.get(&key).await.unwrap().unwrap();
    assert_eq!(desired.spec.main_ip, "203.0.113.5");
    assert_eq!(desired.spec.asn, 65099);
}

#[tokio::test]
async fn failed_import_lookup_falls_through_to_create() {
    let h = Harness::new(ServerKind);
    seed_site(&h.api);
    let key = h
        .seed_desired("web-1", &[(IMPORT_ANNOTATION, "true")], spec_on_nyc1())
        .await;
    h.settle_cr(&key).await;
    let twin_key = h.twin_key(&key).await;

    h.meta.reconcile(&twin_key).await.unwrap();

    assert_eq!(h.api.calls.creates(), 1);
    assert!(h.twin(&key).await.unwrap().spec.remote_id > 0);
}

#[tokio::test]
async fn remote_entity_deleted_out_of_band_is_recreated() {
    let h = Harness::new(ServerKind);
    seed_site(&h.api);
    let key = h.seed_desired("web-1", &[], spec_on_nyc1()).await;
    h.settle_cr(&key).await;
    let twin_key = h.twin_key(&key).await;
    h.meta.reconcile(&twin_key).await.unwrap();
    let first_id = h.twin(&key).await.unwrap().spec.remote_id;

    // Someone deletes the server behind the engine's back.
    h.api.with_state(|state| state.servers.clear());

    h.meta.reconcile(&twin_key).await.unwrap();
    let second_id = h.twin(&key).await.unwrap().spec.remote_id;
    assert_eq!(h.api.calls.creates(), 2);
    assert_ne!(first_id, second_id);
}

//! Daemon loop: load manifests, sync the store, drive both engine phases.
//!
//! Kinds reconcile in dependency order (templates and VPCs before
//! clusters) so freshly created referents are resolvable within the same
//! pass cycle. Per-resource failures are logged and isolated; one broken
//! object never stalls the rest.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::interval;
use tracing::{error, info};

use fabsync_api::ControlPlane;

use crate::cache::ResolutionCache;
use crate::engine::{CrEngine, MetaEngine};
use crate::kinds::{ClusterKind, ResourceKind, ServerKind, TemplateKind, VpcKind};
use crate::manifest::{self, Manifest, ManifestMeta};
use crate::model::{DesiredObject, Key, LAST_APPLIED_ANNOTATION, ObjectMeta, TwinObject};
use crate::store::{MemoryStore, ObjectStore, StoreError, StoredObject};

/// Everything one kind needs: its stores and both engine phases.
struct KindRuntime<K: ResourceKind> {
    desired: Arc<MemoryStore<DesiredObject<K::Spec>>>,
    twins: Arc<MemoryStore<TwinObject<K::Payload>>>,
    cr: CrEngine<K>,
    meta: MetaEngine<K>,
}

impl<K: ResourceKind + Copy> KindRuntime<K> {
    fn new(
        kind: K,
        cache: Arc<ResolutionCache>,
        api: Arc<dyn ControlPlane>,
        requeue: Duration,
    ) -> Self {
        let desired = Arc::new(MemoryStore::new());
        let twins = Arc::new(MemoryStore::new());
        Self {
            cr: CrEngine::new(
                kind,
                desired.clone(),
                twins.clone(),
                cache.clone(),
                api.clone(),
                requeue,
            ),
            meta: MetaEngine::new(kind, desired.clone(), twins.clone(), cache, api, requeue),
            desired,
            twins,
        }
    }

    /// Upsert a manifest: create the desired object or refresh its spec,
    /// bumping the generation when the authored spec changed. The spec as
    /// last applied is kept on an annotation so engine-owned backfill of
    /// blank fields is not mistaken for an authored edit.
    async fn apply(&self, meta: &ManifestMeta, spec: &K::Spec) -> Result<Key, StoreError> {
        let key = Key::new(namespace_or_default(&meta.namespace), meta.name.clone());
        let rendered = serde_json::to_string(spec).unwrap_or_default();
        match self.desired.get(&key).await? {
            None => {
                let mut object_meta = ObjectMeta::new(key.namespace.clone(), key.name.clone());
                object_meta.annotations.extend(meta.annotations.clone());
                object_meta
                    .annotations
                    .insert(LAST_APPLIED_ANNOTATION.to_string(), rendered);
                info!(kind = K::KIND, %key, "desired object added");
                self.desired
                    .create(DesiredObject {
                        meta: object_meta,
                        spec: spec.clone(),
                        status: Default::default(),
                    })
                    .await?;
            }
            Some(mut existing) => {
                let mut changed = false;
                if existing.meta.annotations.get(LAST_APPLIED_ANNOTATION) != Some(&rendered) {
                    existing.spec = spec.clone();
                    existing.meta.generation += 1;
                    existing
                        .meta
                        .annotations
                        .insert(LAST_APPLIED_ANNOTATION.to_string(), rendered);
                    changed = true;
                }
                // Annotations present in the manifest win; absent ones keep
                // whatever the engine defaulted.
                for (k, v) in &meta.annotations {
                    if existing.meta.annotations.get(k) != Some(v) {
                        existing.meta.annotations.insert(k.clone(), v.clone());
                        changed = true;
                    }
                }
                if changed {
                    info!(
                        kind = K::KIND,
                        %key,
                        generation = existing.meta.generation,
                        "desired object refreshed"
                    );
                    self.desired.update(existing).await?;
                }
            }
        }
        Ok(key)
    }

    /// Mark desired objects whose manifest disappeared for deletion.
    async fn sweep(&self, seen: &HashSet<Key>) -> Result<(), StoreError> {
        for desired in self.desired.list().await? {
            let key = desired.key();
            if !seen.contains(&key) && !desired.meta.is_deleting() {
                info!(kind = K::KIND, %key, "manifest removed, deleting");
                self.desired.delete(&key).await?;
            }
        }
        Ok(())
    }

    /// One reconcile pass over every desired object, then every twin.
    async fn reconcile_all(&self) {
        match self.desired.list().await {
            Ok(objects) => {
                for obj in objects {
                    let key = obj.key();
                    if let Err(err) = self.cr.reconcile(&key).await {
                        error!(kind = K::KIND, %key, %err, "cr reconcile aborted");
                    }
                }
            }
            Err(err) => error!(kind = K::KIND, %err, "listing desired objects failed"),
        }
        match self.twins.list().await {
            Ok(twins) => {
                for twin in twins {
                    let key = twin.key();
                    if let Err(err) = self.meta.reconcile(&key).await {
                        error!(kind = K::KIND, %key, %err, "meta reconcile aborted");
                    }
                }
            }
            Err(err) => error!(kind = K::KIND, %err, "listing twins failed"),
        }
    }
}

fn namespace_or_default(namespace: &str) -> String {
    if namespace.is_empty() {
        "default".to_string()
    } else {
        namespace.to_string()
    }
}

/// Sync daemon: owns the per-kind runtimes and the manifest directory.
pub struct SyncDaemon {
    manifest_dir: PathBuf,
    poll_interval: Duration,
    servers: KindRuntime<ServerKind>,
    clusters: KindRuntime<ClusterKind>,
    templates: KindRuntime<TemplateKind>,
    vpcs: KindRuntime<VpcKind>,
}

impl SyncDaemon {
    pub fn new(
        api: Arc<dyn ControlPlane>,
        cache: Arc<ResolutionCache>,
        manifest_dir: PathBuf,
        poll_interval: Duration,
    ) -> Self {
        Self {
            servers: KindRuntime::new(ServerKind, cache.clone(), api.clone(), poll_interval),
            clusters: KindRuntime::new(ClusterKind, cache.clone(), api.clone(), poll_interval),
            templates: KindRuntime::new(TemplateKind, cache.clone(), api.clone(), poll_interval),
            vpcs: KindRuntime::new(VpcKind, cache, api, poll_interval),
            manifest_dir,
            poll_interval,
        }
    }

    /// Run forever on the fixed poll interval.
    pub async fn run(&self) -> Result<()> {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            dir = %self.manifest_dir.display(),
            "sync loop started"
        );
        let mut ticker = interval(self.poll_interval);
        loop {
            ticker.tick().await;
            if let Err(err) = self.tick().await {
                error!(%err, "sync pass failed");
            }
        }
    }

    /// One full pass: manifests → store sync → both engine phases, in
    /// dependency order.
    pub async fn tick(&self) -> Result<()> {
        let manifests = manifest::load_dir(&self.manifest_dir).context("loading manifests")?;
        self.sync_manifests(&manifests).await?;
        self.templates.reconcile_all().await;
        self.vpcs.reconcile_all().await;
        self.servers.reconcile_all().await;
        self.clusters.reconcile_all().await;
        Ok(())
    }

    async fn sync_manifests(&self, manifests: &[Manifest]) -> Result<()> {
        let mut servers = HashSet::new();
        let mut clusters = HashSet::new();
        let mut templates = HashSet::new();
        let mut vpcs = HashSet::new();
        for manifest in manifests {
            match manifest {
                Manifest::InventoryServer { metadata, spec } => {
                    servers.insert(self.servers.apply(metadata, spec).await?);
                }
                Manifest::ServerCluster { metadata, spec } => {
                    clusters.insert(self.clusters.apply(metadata, spec).await?);
                }
                Manifest::ClusterTemplate { metadata, spec } => {
                    templates.insert(self.templates.apply(metadata, spec).await?);
                }
                Manifest::Vpc { metadata, spec } => {
                    vpcs.insert(self.vpcs.apply(metadata, spec).await?);
                }
            }
        }
        self.servers.sweep(&servers).await?;
        self.clusters.sweep(&clusters).await?;
        self.templates.sweep(&templates).await?;
        self.vpcs.sweep(&vpcs).await?;
        Ok(())
    }
}

//! Shared harness for engine integration tests.

use std::sync::Arc;
use std::time::Duration;

use fabsync::cache::ResolutionCache;
use fabsync::engine::{CrEngine, MetaEngine};
use fabsync::kinds::ResourceKind;
use fabsync::model::{DesiredObject, Key, ObjectMeta, ObjectStatus, TwinObject};
use fabsync::store::{MemoryStore, ObjectStore};
use fabsync::testing::FakeControlPlane;
use fabsync_api::ControlPlane;

pub const REQUEUE: Duration = Duration::from_secs(15);

/// Fake control plane, stores, and both engine phases for one kind.
pub struct Harness<K: ResourceKind> {
    pub api: Arc<FakeControlPlane>,
    pub desired: Arc<MemoryStore<DesiredObject<K::Spec>>>,
    pub twins: Arc<MemoryStore<TwinObject<K::Payload>>>,
    pub cr: CrEngine<K>,
    pub meta: MetaEngine<K>,
}

impl<K: ResourceKind + Copy> Harness<K> {
    pub fn new(kind: K) -> Self {
        let api = Arc::new(FakeControlPlane::new());
        let control: Arc<dyn ControlPlane> = api.clone();
        let cache = Arc::new(ResolutionCache::new(control.clone()));
        let desired = Arc::new(MemoryStore::new());
        let twins = Arc::new(MemoryStore::new());
        Self {
            cr: CrEngine::new(
                kind,
                desired.clone(),
                twins.clone(),
                cache.clone(),
                control.clone(),
                REQUEUE,
            ),
            meta: MetaEngine::new(
                kind,
                desired.clone(),
                twins.clone(),
                cache.clone(),
                control,
                REQUEUE,
            ),
            api,
            desired,
            twins,
        }
    }

    /// Seed a desired object with the given spec and annotations.
    pub async fn seed_desired(
        &self,
        name: &str,
        annotations: &[(&str, &str)],
        spec: K::Spec,
    ) -> Key {
        let mut meta = ObjectMeta::new("default", name);
        for (k, v) in annotations {
            meta.annotations.insert((*k).to_string(), (*v).to_string());
        }
        let key = meta.key();
        self.desired
            .create(DesiredObject {
                meta,
                spec,
                status: Default::default(),
            })
            .await
            .unwrap();
        key
    }

    /// Drive the CR phase through defaults, finalizer, and the twin
    /// decision (three passes).
    pub async fn settle_cr(&self, key: &Key) {
        for _ in 0..3 {
            self.cr.reconcile(key).await.unwrap();
        }
    }

    /// Fetch the twin paired with a desired object.
    pub async fn twin(&self, key: &Key) -> Option<TwinObject<K::Payload>> {
        let desired = self.desired.get(key).await.unwrap()?;
        self.twins.get(&desired.meta.twin_key()).await.unwrap()
    }

    /// Key of the twin paired with a desired object.
    pub async fn twin_key(&self, key: &Key) -> Key {
        self.desired
            .get(key)
            .await
            .unwrap()
            .expect("desired object exists")
            .meta
            .twin_key()
    }

    /// Current status of a desired object.
    pub async fn status(&self, key: &Key) -> ObjectStatus {
        self.desired
            .get(key)
            .await
            .unwrap()
            .expect("desired object exists")
            .status
    }
}

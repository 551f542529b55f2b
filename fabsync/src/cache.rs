//! Name↔ID resolution cache.
//!
//! One snapshot per entity kind, each guarded by its own lock and refreshed
//! lazily by full replace, never an incremental merge. A lookup miss
//! triggers exactly one download and a single retry; a persistent miss is
//! reported as not-found. Stale hits are returned without re-validation: a
//! remote rename stays invisible until the old name misses and forces a
//! refresh.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use fabsync_api::error::Result as RemoteResult;
use fabsync_api::types::{
    RemoteCluster, RemotePort, RemoteProfile, RemoteServer, RemoteSite, RemoteTemplate,
    RemoteTenant, RemoteVpc,
};
use fabsync_api::{ControlPlane, RemoteError};

/// Downloads the full listing for one entity kind.
#[async_trait]
pub trait Lister<E>: Send + Sync {
    async fn list(&self) -> RemoteResult<Vec<E>>;
}

/// An entity the cache can index.
pub trait CacheEntity: Send + Sync + 'static {
    fn id(&self) -> i64;

    fn matches_name(&self, name: &str) -> bool;
}

/// Cached snapshot for a single kind.
pub struct KindCache<E> {
    kind: &'static str,
    entries: Mutex<Vec<Arc<E>>>,
    lister: Arc<dyn Lister<E>>,
}

impl<E: CacheEntity> KindCache<E> {
    pub fn new(kind: &'static str, lister: Arc<dyn Lister<E>>) -> Self {
        Self {
            kind,
            entries: Mutex::new(Vec::new()),
            lister,
        }
    }

    /// Look up by name, downloading once on a miss.
    pub async fn find_by_name(&self, name: &str) -> Option<Arc<E>> {
        let mut entries = self.entries.lock().await;
        if let Some(hit) = scan(&entries, |e| e.matches_name(name)) {
            return Some(hit);
        }
        self.refresh(&mut entries).await;
        scan(&entries, |e| e.matches_name(name))
    }

    /// Look up by ID, downloading once on a miss.
    pub async fn find_by_id(&self, id: i64) -> Option<Arc<E>> {
        let mut entries = self.entries.lock().await;
        if let Some(hit) = scan(&entries, |e| e.id() == id) {
            return Some(hit);
        }
        self.refresh(&mut entries).await;
        scan(&entries, |e| e.id() == id)
    }

    /// Current snapshot, without refreshing.
    pub async fn get_all(&self) -> Vec<Arc<E>> {
        self.entries.lock().await.clone()
    }

    /// Replace the snapshot from a fresh remote listing.
    pub async fn download(&self) -> Result<(), RemoteError> {
        let mut entries = self.entries.lock().await;
        let items = self.lister.list().await?;
        debug!(kind = self.kind, count = items.len(), "cache downloaded");
        *entries = items.into_iter().map(Arc::new).collect();
        Ok(())
    }

    /// Refresh under the already-held lock. A failed download leaves the
    /// old snapshot in place; the lookup then reports not-found and the
    /// caller retries on its next cycle.
    async fn refresh(&self, entries: &mut Vec<Arc<E>>) {
        match self.lister.list().await {
            Ok(items) => {
                debug!(kind = self.kind, count = items.len(), "cache refreshed");
                *entries = items.into_iter().map(Arc::new).collect();
            }
            Err(err) => warn!(kind = self.kind, %err, "cache refresh failed"),
        }
    }
}

fn scan<E>(entries: &[Arc<E>], pred: impl Fn(&E) -> bool) -> Option<Arc<E>> {
    entries.iter().find(|e| pred(e)).cloned()
}

impl CacheEntity for RemoteSite {
    fn id(&self) -> i64 {
        self.id
    }

    fn matches_name(&self, name: &str) -> bool {
        self.name == name
    }
}

impl CacheEntity for RemoteTenant {
    fn id(&self) -> i64 {
        self.id
    }

    fn matches_name(&self, name: &str) -> bool {
        self.name == name
    }
}

impl CacheEntity for RemoteProfile {
    fn id(&self) -> i64 {
        self.id
    }

    fn matches_name(&self, name: &str) -> bool {
        self.name == name
    }
}

impl CacheEntity for RemotePort {
    fn id(&self) -> i64 {
        self.id
    }

    /// Ports are addressed by their composite `port@switch` name.
    fn matches_name(&self, name: &str) -> bool {
        self.link_name() == name
    }
}

impl CacheEntity for RemoteServer {
    fn id(&self) -> i64 {
        self.id
    }

    fn matches_name(&self, name: &str) -> bool {
        self.name == name
    }
}

impl CacheEntity for RemoteCluster {
    fn id(&self) -> i64 {
        self.id
    }

    fn matches_name(&self, name: &str) -> bool {
        self.name == name
    }
}

impl CacheEntity for RemoteTemplate {
    fn id(&self) -> i64 {
        self.id
    }

    fn matches_name(&self, name: &str) -> bool {
        self.name == name
    }
}

impl CacheEntity for RemoteVpc {
    fn id(&self) -> i64 {
        self.id
    }

    fn matches_name(&self, name: &str) -> bool {
        self.name == name
    }
}

#[async_trait]
impl Lister<RemoteSite> for Arc<dyn ControlPlane> {
    async fn list(&self) -> RemoteResult<Vec<RemoteSite>> {
        self.list_sites().await
    }
}

#[async_trait]
impl Lister<RemoteTenant> for Arc<dyn ControlPlane> {
    async fn list(&self) -> RemoteResult<Vec<RemoteTenant>> {
        self.list_tenants().await
    }
}

#[async_trait]
impl Lister<RemoteProfile> for Arc<dyn ControlPlane> {
    async fn list(&self) -> RemoteResult<Vec<RemoteProfile>> {
        self.list_profiles().await
    }
}

#[async_trait]
impl Lister<RemotePort> for Arc<dyn ControlPlane> {
    async fn list(&self) -> RemoteResult<Vec<RemotePort>> {
        self.list_ports().await
    }
}

#[async_trait]
impl Lister<RemoteServer> for Arc<dyn ControlPlane> {
    async fn list(&self) -> RemoteResult<Vec<RemoteServer>> {
        self.list_servers().await
    }
}

#[async_trait]
impl Lister<RemoteCluster> for Arc<dyn ControlPlane> {
    async fn list(&self) -> RemoteResult<Vec<RemoteCluster>> {
        self.list_clusters().await
    }
}

#[async_trait]
impl Lister<RemoteTemplate> for Arc<dyn ControlPlane> {
    async fn list(&self) -> RemoteResult<Vec<RemoteTemplate>> {
        self.list_templates().await
    }
}

#[async_trait]
impl Lister<RemoteVpc> for Arc<dyn ControlPlane> {
    async fn list(&self) -> RemoteResult<Vec<RemoteVpc>> {
        self.list_vpcs().await
    }
}

/// Shared resolution cache covering every referenced kind. Constructed once
/// at startup and injected wherever lookups happen.
pub struct ResolutionCache {
    pub sites: KindCache<RemoteSite>,
    pub tenants: KindCache<RemoteTenant>,
    pub profiles: KindCache<RemoteProfile>,
    pub ports: KindCache<RemotePort>,
    pub servers: KindCache<RemoteServer>,
    pub clusters: KindCache<RemoteCluster>,
    pub templates: KindCache<RemoteTemplate>,
    pub vpcs: KindCache<RemoteVpc>,
}

impl ResolutionCache {
    pub fn new(api: Arc<dyn ControlPlane>) -> Self {
        Self {
            sites: KindCache::new("site", Arc::new(api.clone())),
            tenants: KindCache::new("tenant", Arc::new(api.clone())),
            profiles: KindCache::new("profile", Arc::new(api.clone())),
            ports: KindCache::new("port", Arc::new(api.clone())),
            servers: KindCache::new("server", Arc::new(api.clone())),
            clusters: KindCache::new("cluster", Arc::new(api.clone())),
            templates: KindCache::new("template", Arc::new(api.clone())),
            vpcs: KindCache::new("vpc", Arc::new(api)),
        }
    }
}

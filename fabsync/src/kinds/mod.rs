//! Per-kind adapters binding a desired resource to its twin payload and
//! remote entity.
//!
//! Each adapter owns the kind-specific pieces the generic engine cannot
//! know: reference resolution, wire translation, and the ordered field
//! comparison that decides whether a remote update is needed.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use fabsync_api::{ControlPlane, RemoteError};

use crate::cache::{CacheEntity, ResolutionCache};
use crate::model::{DesiredObject, TwinSpec};

pub mod cluster;
pub mod server;
pub mod template;
pub mod vpc;

pub use cluster::ClusterKind;
pub use server::ServerKind;
pub use template::TemplateKind;
pub use vpc::VpcKind;

/// A name reference that could not be resolved to a remote ID. Permanent
/// until the desired spec is corrected; surfaced verbatim in status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{name}'")]
pub struct ResolveError {
    pub kind: &'static str,
    pub name: String,
}

impl ResolveError {
    pub fn new(kind: &'static str, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// Behavior one resource kind plugs into the generic two-phase engine.
#[async_trait]
pub trait ResourceKind: Send + Sync + 'static {
    /// Kind label used in logs.
    const KIND: &'static str;

    type Spec: Clone + PartialEq + serde::Serialize + Send + Sync + 'static;
    type Payload: Clone + Send + Sync + 'static;
    type Remote: CacheEntity;

    /// Resolve every name reference through the cache into a twin payload.
    async fn resolve(
        &self,
        desired: &DesiredObject<Self::Spec>,
        cache: &ResolutionCache,
    ) -> Result<Self::Payload, ResolveError>;

    /// Remote lookup by name, served through the cache (import path).
    async fn find_by_name(
        &self,
        cache: &ResolutionCache,
        name: &str,
    ) -> Option<Arc<Self::Remote>>;

    /// Remote lookup by ID, served through the cache.
    async fn find_by_id(&self, cache: &ResolutionCache, id: i64) -> Option<Arc<Self::Remote>>;

    /// Create the remote entity, returning its assigned ID.
    async fn create(
        &self,
        api: &dyn ControlPlane,
        twin: &TwinSpec<Self::Payload>,
    ) -> Result<i64, RemoteError>;

    /// Push the full translated payload onto the existing remote entity.
    async fn update(
        &self,
        api: &dyn ControlPlane,
        id: i64,
        twin: &TwinSpec<Self::Payload>,
    ) -> Result<(), RemoteError>;

    async fn delete(&self, api: &dyn ControlPlane, id: i64) -> Result<(), RemoteError>;

    /// Re-download this kind's cache snapshot so the next diff sees a
    /// freshly issued write instead of the stale pre-write entity.
    async fn refresh(&self, cache: &ResolutionCache) -> Result<(), RemoteError>;

    /// Ordered, short-circuiting field comparison; true means converged.
    fn in_sync(&self, twin: &TwinSpec<Self::Payload>, remote: &Self::Remote) -> bool;

    /// Copy remote-assigned values into payload fields the user left
    /// blank. Returns true when anything changed.
    fn adopt(&self, _payload: &mut Self::Payload, _remote: &Self::Remote) -> bool {
        false
    }

    /// Push deducible values back onto a desired spec that left them
    /// blank. Returns true when anything changed.
    fn backfill(&self, _spec: &mut Self::Spec, _payload: &Self::Payload) -> bool {
        false
    }
}

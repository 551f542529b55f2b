//! Meta phase: drive the remote entity to match the resolved twin.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use fabsync_api::{ControlPlane, RemoteError};

use super::{Outcome, patch_status};
use crate::cache::{CacheEntity, ResolutionCache};
use crate::kinds::ResourceKind;
use crate::model::{DesiredObject, Key, ObjectStatus, TwinObject};
use crate::store::{ObjectStore, StoreError};

enum SyncError {
    Store(StoreError),
    Remote(RemoteError),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        SyncError::Store(err)
    }
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        SyncError::Remote(err)
    }
}

/// Meta-phase engine for one resource kind.
pub struct MetaEngine<K: ResourceKind> {
    kind: K,
    desired: Arc<dyn ObjectStore<DesiredObject<K::Spec>>>,
    twins: Arc<dyn ObjectStore<TwinObject<K::Payload>>>,
    cache: Arc<ResolutionCache>,
    api: Arc<dyn ControlPlane>,
    requeue_interval: Duration,
}

impl<K: ResourceKind> MetaEngine<K> {
    pub fn new(
        kind: K,
        desired: Arc<dyn ObjectStore<DesiredObject<K::Spec>>>,
        twins: Arc<dyn ObjectStore<TwinObject<K::Payload>>>,
        cache: Arc<ResolutionCache>,
        api: Arc<dyn ControlPlane>,
        requeue_interval: Duration,
    ) -> Self {
        Self {
            kind,
            desired,
            twins,
            cache,
            api,
            requeue_interval,
        }
    }

    /// Converge the remote entity onto one twin: discover or create it
    /// when the ID is unknown, otherwise diff and update. Concludes by
    /// backfilling blank desired fields and patching status; on a fully
    /// converged resource that status patch is the only effect.
    pub async fn reconcile(&self, key: &Key) -> Result<Outcome, StoreError> {
        let Some(mut twin) = self.twins.get(key).await? else {
            debug!(kind = K::KIND, %key, "twin gone");
            return Ok(Outcome::done());
        };
        if twin.meta.is_deleting() {
            return Ok(Outcome::done());
        }

        let desired_key = Key::new(twin.meta.namespace.clone(), twin.spec.source_name.clone());
        let Some(mut desired) = self.desired.get(&desired_key).await? else {
            debug!(kind = K::KIND, %key, "paired desired object gone");
            return Ok(Outcome::done());
        };
        // The CR phase owns deletion.
        if desired.meta.is_deleting() {
            return Ok(Outcome::done());
        }

        if twin.spec.remote_id == 0 {
            if twin.spec.imported {
                debug!(kind = K::KIND, %key, "import mode, looking up by name");
                if let Some(remote) = self
                    .kind
                    .find_by_name(&self.cache, &twin.spec.source_name)
                    .await
                {
                    twin.spec.remote_id = remote.id();
                    self.kind.adopt(&mut twin.spec.payload, &remote);
                    self.twins.update(twin.clone()).await?;
                    if self.kind.backfill(&mut desired.spec, &twin.spec.payload) {
                        self.desired.update(desired).await?;
                    }
                    info!(kind = K::KIND, %key, id = twin.spec.remote_id, "imported");
                    patch_status(self.desired.as_ref(), &desired_key, ObjectStatus::ok("Success"))
                        .await?;
                    // The next pass takes the known-ID branch.
                    return Ok(Outcome::requeue(self.requeue_interval));
                }
                debug!(kind = K::KIND, %key, "nothing to import, creating instead");
            }
            if let Err(err) = self.create_remote(&mut twin).await {
                return self.fail(err, key, &desired_key).await;
            }
        } else {
            match self.kind.find_by_id(&self.cache, twin.spec.remote_id).await {
                Some(remote) => {
                    if self.kind.adopt(&mut twin.spec.payload, &remote) {
                        self.twins.update(twin.clone()).await?;
                    }
                    if self.kind.in_sync(&twin.spec, &remote) {
                        debug!(kind = K::KIND, %key, "nothing changed");
                    } else {
                        info!(kind = K::KIND, %key, id = twin.spec.remote_id, "updating remote entity");
                        if let Err(err) = self
                            .kind
                            .update(self.api.as_ref(), twin.spec.remote_id, &twin.spec)
                            .await
                        {
                            return self.fail(err.into(), key, &desired_key).await;
                        }
                        info!(kind = K::KIND, %key, "remote entity updated");
                        if let Err(err) = self.kind.refresh(&self.cache).await {
                            debug!(kind = K::KIND, %err, "cache refresh after update failed");
                        }
                    }
                }
                None => {
                    debug!(
                        kind = K::KIND,
                        %key,
                        id = twin.spec.remote_id,
                        "remote entity missing, recreating"
                    );
                    if let Err(err) = self.create_remote(&mut twin).await {
                        return self.fail(err, key, &desired_key).await;
                    }
                }
            }
        }

        if self.kind.backfill(&mut desired.spec, &twin.spec.payload) {
            debug!(kind = K::KIND, %key, "backfilling desired fields");
            self.desired.update(desired).await?;
        }
        patch_status(self.desired.as_ref(), &desired_key, ObjectStatus::ok("Success")).await?;
        Ok(Outcome::requeue(self.requeue_interval))
    }

    /// Create the remote entity and persist the assigned ID on the twin.
    async fn create_remote(&self, twin: &mut TwinObject<K::Payload>) -> Result<(), SyncError> {
        let id = self.kind.create(self.api.as_ref(), &twin.spec).await?;
        twin.spec.remote_id = id;
        self.twins.update(twin.clone()).await?;
        info!(kind = K::KIND, name = %twin.spec.source_name, id, "remote entity created");
        Ok(())
    }

    /// Remote failures become a Failure status and a requeue; store
    /// failures abort the reconcile.
    async fn fail(
        &self,
        err: SyncError,
        key: &Key,
        desired_key: &Key,
    ) -> Result<Outcome, StoreError> {
        match err {
            SyncError::Store(err) => Err(err),
            SyncError::Remote(err) => {
                error!(kind = K::KIND, %key, %err, "remote call failed");
                patch_status(
                    self.desired.as_ref(),
                    desired_key,
                    ObjectStatus::failure(err.to_string()),
                )
                .await?;
                Ok(Outcome::requeue(self.requeue_interval))
            }
        }
    }
}

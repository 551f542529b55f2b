//! CR phase: desired object → resolved twin, plus the deletion protocol.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use fabsync_api::{ControlPlane, RemoteError};

use super::{Outcome, patch_status};
use crate::cache::ResolutionCache;
use crate::kinds::ResourceKind;
use crate::model::{CLEANUP_FINALIZER, DesiredObject, Key, ObjectMeta, ObjectStatus, TwinObject, TwinSpec};
use crate::store::{ObjectStore, StoreError};

/// Where a desired object stands relative to its twin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrState {
    /// Deletion marker present; run the deletion protocol.
    Deleting,
    /// Import/reclaim annotations missing or unrecognized; write defaults.
    AnnotationsUnset,
    /// No twin and no finalizer yet; attach the finalizer first.
    FinalizerMissing,
    /// No twin; resolve references and create one.
    TwinAbsent,
    /// Twin reflects an older generation or stale annotations.
    TwinStale,
    /// Twin matches the desired object; convergence is the meta phase's job.
    TwinCurrent,
}

/// Pure classification of one desired object against its twin.
pub fn classify<P>(meta: &ObjectMeta, twin: Option<&TwinSpec<P>>) -> CrState {
    if meta.is_deleting() {
        return CrState::Deleting;
    }
    if meta.annotations_need_defaults() {
        return CrState::AnnotationsUnset;
    }
    match twin {
        None if !meta.has_cleanup_finalizer() => CrState::FinalizerMissing,
        None => CrState::TwinAbsent,
        Some(twin) => {
            let stale = twin.source_generation != meta.generation
                || twin.imported != meta.imported()
                || twin.reclaim != meta.reclaim();
            if stale {
                CrState::TwinStale
            } else {
                CrState::TwinCurrent
            }
        }
    }
}

#[derive(Debug, Error)]
enum FinalizeError {
    #[error(transparent)]
    Remote(RemoteError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// CR-phase engine for one resource kind.
pub struct CrEngine<K: ResourceKind> {
    kind: K,
    desired: Arc<dyn ObjectStore<DesiredObject<K::Spec>>>,
    twins: Arc<dyn ObjectStore<TwinObject<K::Payload>>>,
    cache: Arc<ResolutionCache>,
    api: Arc<dyn ControlPlane>,
    requeue_interval: Duration,
}

impl<K: ResourceKind> CrEngine<K> {
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

    /// Reconcile one desired object. Store failures abort and are retried
    /// on the next trigger; everything else is reported through status.
    pub async fn reconcile(&self, key: &Key) -> Result<Outcome, StoreError> {
        let Some(mut desired) = self.desired.get(key).await? else {
            debug!(kind = K::KIND, %key, "desired object gone");
            return Ok(Outcome::done());
        };
        let twin = self.twins.get(&desired.meta.twin_key()).await?;

        match classify(&desired.meta, twin.as_ref().map(|t| &t.spec)) {
            CrState::Deleting => {
                info!(kind = K::KIND, %key, "deleting");
                match self.finalize(&desired, twin).await {
                    Ok(()) => {
                        info!(kind = K::KIND, %key, "deleted");
                        Ok(Outcome::done())
                    }
                    Err(FinalizeError::Store(err)) => Err(err),
                    Err(FinalizeError::Remote(err)) => {
                        error!(kind = K::KIND, %key, %err, "remote delete failed");
                        patch_status(
                            self.desired.as_ref(),
                            key,
                            ObjectStatus::failure(err.to_string()),
                        )
                        .await?;
                        Ok(Outcome::requeue(self.requeue_interval))
                    }
                }
            }
            CrState::AnnotationsUnset => {
                debug!(kind = K::KIND, %key, "setting default annotations");
                desired.meta.apply_default_annotations();
                self.desired.update(desired).await?;
                // The write re-triggers this key.
                Ok(Outcome::done())
            }
            CrState::FinalizerMissing => {
                debug!(kind = K::KIND, %key, "attaching finalizer");
                desired.meta.finalizers.push(CLEANUP_FINALIZER.to_string());
                self.desired.update(desired).await?;
                Ok(Outcome::done())
            }
            CrState::TwinAbsent => match self.kind.resolve(&desired, &self.cache).await {
                Ok(payload) => {
                    debug!(kind = K::KIND, %key, "creating twin");
                    self.twins
                        .create(TwinObject::for_desired(&desired.meta, payload))
                        .await?;
                    Ok(Outcome::requeue(self.requeue_interval))
                }
                Err(err) => {
                    warn!(kind = K::KIND, %key, %err, "reference resolution failed");
                    patch_status(
                        self.desired.as_ref(),
                        key,
                        ObjectStatus::failure(err.to_string()),
                    )
                    .await?;
                    Ok(Outcome::requeue(self.requeue_interval))
                }
            },
            CrState::TwinStale => {
                let Some(mut twin) = twin else {
                    return Ok(Outcome::requeue(self.requeue_interval));
                };
                match self.kind.resolve(&desired, &self.cache).await {
                    Ok(payload) => {
                        debug!(
                            kind = K::KIND,
                            %key,
                            generation = desired.meta.generation,
                            "regenerating twin"
                        );
                        // The remote ID survives regeneration.
                        twin.spec.imported = desired.meta.imported();
                        twin.spec.reclaim = desired.meta.reclaim();
                        twin.spec.source_name = desired.meta.name.clone();
                        twin.spec.source_generation = desired.meta.generation;
                        twin.spec.payload = payload;
                        self.twins.update(twin).await?;
                        Ok(Outcome::requeue(self.requeue_interval))
                    }
                    Err(err) => {
                        warn!(kind = K::KIND, %key, %err, "reference resolution failed");
                        patch_status(
                            self.desired.as_ref(),
                            key,
                            ObjectStatus::failure(err.to_string()),
                        )
                        .await?;
                        Ok(Outcome::requeue(self.requeue_interval))
                    }
                }
            }
            CrState::TwinCurrent => Ok(Outcome::requeue(self.requeue_interval)),
        }
    }

    /// Deletion protocol: remote delete unless reclaimed, drop the twin,
    /// then clear the finalizers so the store can remove the object. Each
    /// step is independently retryable; the finalizers clear only on the
    /// happy path.
    async fn finalize(
        &self,
        desired: &DesiredObject<K::Spec>,
        twin: Option<TwinObject<K::Payload>>,
    ) -> Result<(), FinalizeError> {
        if let Some(twin) = &twin {
            if twin.spec.remote_id > 0 && !twin.spec.reclaim {
                match self.kind.delete(self.api.as_ref(), twin.spec.remote_id).await {
                    Ok(()) => {
                        info!(kind = K::KIND, id = twin.spec.remote_id, "remote entity deleted")
                    }
                    // Already gone remotely counts as success.
                    Err(err) if err.is_not_found() => {
                        debug!(kind = K::KIND, id = twin.spec.remote_id, "remote entity already gone")
                    }
                    Err(err) => return Err(FinalizeError::Remote(err)),
                }
            } else if twin.spec.reclaim {
                info!(
                    kind = K::KIND,
                    id = twin.spec.remote_id,
                    "reclaim policy retains the remote entity"
                );
            }
        }

        if let Some(twin) = twin {
            self.twins.delete(&twin.meta.key()).await?;
        }

        let mut desired = desired.clone();
        desired.meta.finalizers.clear();
        self.desired.update(desired).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_meta() -> ObjectMeta {
        let mut meta = ObjectMeta::new("default", "web-1");
        meta.apply_default_annotations();
        meta.finalizers.push(CLEANUP_FINALIZER.to_string());
        meta
    }

    fn make_twin(meta: &ObjectMeta) -> TwinSpec<()> {
        TwinSpec {
            imported: meta.imported(),
            reclaim: meta.reclaim(),
            source_name: meta.name.clone(),
            source_generation: meta.generation,
            remote_id: 0,
            payload: (),
        }
    }

    #[test]
    fn deletion_marker_wins() {
        let mut meta = ObjectMeta::new("default", "web-1");
        meta.deletion_timestamp = Some(chrono::Utc::now());
        assert_eq!(classify::<()>(&meta, None), CrState::Deleting);
    }

    #[test]
    fn unset_annotations_come_before_twin_handling() {
        let meta = ObjectMeta::new("default", "web-1");
        assert_eq!(classify::<()>(&meta, None), CrState::AnnotationsUnset);
    }

    #[test]
    fn finalizer_is_attached_before_the_twin_exists() {
        let mut meta = ObjectMeta::new("default", "web-1");
        meta.apply_default_annotations();
        assert_eq!(classify::<()>(&meta, None), CrState::FinalizerMissing);

        meta.finalizers.push(CLEANUP_FINALIZER.to_string());
        assert_eq!(classify::<()>(&meta, None), CrState::TwinAbsent);
    }

    #[test]
    fn generation_bump_marks_the_twin_stale() {
        let mut meta = make_meta();
        let twin = make_twin(&meta);
        assert_eq!(classify(&meta, Some(&twin)), CrState::TwinCurrent);

        meta.generation += 1;
        assert_eq!(classify(&meta, Some(&twin)), CrState::TwinStale);
    }

    #[test]
    fn annotation_change_marks_the_twin_stale() {
        let mut meta = make_meta();
        let twin = make_twin(&meta);

        meta.annotations.insert(
            crate::model::RECLAIM_ANNOTATION.to_string(),
            "retain".to_string(),
        );
        assert_eq!(classify(&meta, Some(&twin)), CrState::TwinStale);
    }
}

//! Two-phase reconciliation engine.
//!
//! The CR phase ([`cr::CrEngine`]) converts a desired object into its
//! resolved twin; the meta phase ([`meta::MetaEngine`]) drives the remote
//! entity to match the twin. Both phases end by scheduling another pass
//! after a fixed interval so drift introduced remotely is eventually
//! caught. There is no backoff or jitter: every retry waits the same
//! interval.

pub mod cr;
pub mod meta;

pub use cr::{CrEngine, CrState, classify};
pub use meta::MetaEngine;

use std::time::Duration;

use crate::model::{DesiredObject, Key, ObjectStatus};
use crate::store::{ObjectStore, StoreError};

/// Result of one reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub requeue_after: Option<Duration>,
}

impl Outcome {
    /// Nothing further to do until another change arrives.
    pub fn done() -> Self {
        Self {
            requeue_after: None,
        }
    }

    /// Revisit after the given interval.
    pub fn requeue(after: Duration) -> Self {
        Self {
            requeue_after: Some(after),
        }
    }
}

/// Patch the observed status onto a desired object, if it still exists.
/// An unchanged status writes nothing.
pub(crate) async fn patch_status<S>(
    store: &dyn ObjectStore<DesiredObject<S>>,
    key: &Key,
    status: ObjectStatus,
) -> Result<(), StoreError>
where
    S: Clone + Send + Sync + 'static,
{
    let Some(mut desired) = store.get(key).await? else {
        return Ok(());
    };
    if desired.status == status {
        return Ok(());
    }
    desired.status = status;
    store.update(desired).await
}

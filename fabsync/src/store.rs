//! Object store capability and the in-memory implementation.
//!
//! The engine only ever talks to [`ObjectStore`]; the runtime injects an
//! implementation. Writes are optimistic: a conflicting update aborts the
//! current reconcile, which re-reads fresh state on its next trigger.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::model::{DesiredObject, Key, ObjectMeta, TwinObject};

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(Key),

    #[error("conflict: {0}")]
    Conflict(Key),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Anything the store can hold: an object carrying standard metadata.
pub trait StoredObject: Clone + Send + Sync + 'static {
    fn meta(&self) -> &ObjectMeta;

    fn meta_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> Key {
        self.meta().key()
    }
}

impl<S: Clone + Send + Sync + 'static> StoredObject for DesiredObject<S> {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

impl<P: Clone + Send + Sync + 'static> StoredObject for TwinObject<P> {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

/// Capability interface onto the runtime object store.
#[async_trait]
pub trait ObjectStore<R: StoredObject>: Send + Sync {
    async fn get(&self, key: &Key) -> Result<Option<R>>;

    async fn list(&self) -> Result<Vec<R>>;

    async fn create(&self, obj: R) -> Result<()>;

    async fn update(&self, obj: R) -> Result<()>;

    /// Request deletion. With finalizers present this only sets the
    /// deletion marker; the object is removed once its finalizer list
    /// empties.
    async fn delete(&self, key: &Key) -> Result<()>;
}

/// In-memory store with finalizer-gated removal.
pub struct MemoryStore<R> {
    objects: RwLock<HashMap<Key, R>>,
}

impl<R> MemoryStore<R> {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }
}

impl<R> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: StoredObject> ObjectStore<R> for MemoryStore<R> {
    async fn get(&self, key: &Key) -> Result<Option<R>> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn list(&self) -> Result<Vec<R>> {
        let mut items: Vec<R> = self.objects.read().await.values().cloned().collect();
        items.sort_by_key(|obj| obj.key());
        Ok(items)
    }

    async fn create(&self, obj: R) -> Result<()> {
        let mut objects = self.objects.write().await;
        let key = obj.key();
        if objects.contains_key(&key) {
            return Err(StoreError::Conflict(key));
        }
        objects.insert(key, obj);
        Ok(())
    }

    async fn update(&self, obj: R) -> Result<()> {
        let mut objects = self.objects.write().await;
        let key = obj.key();
        if !objects.contains_key(&key) {
            return Err(StoreError::NotFound(key));
        }
        if obj.meta().is_deleting() && obj.meta().finalizers.is_empty() {
            objects.remove(&key);
        } else {
            objects.insert(key, obj);
        }
        Ok(())
    }

    async fn delete(&self, key: &Key) -> Result<()> {
        let mut objects = self.objects.write().await;
        let Some(obj) = objects.get_mut(key) else {
            return Ok(());
        };
        if obj.meta().finalizers.is_empty() {
            objects.remove(key);
        } else if !obj.meta().is_deleting() {
            obj.meta_mut().deletion_timestamp = Some(Utc::now());
        }
        Ok(())
    }
}

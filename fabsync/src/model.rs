//! Resource model: desired objects, their resolved twins, and the
//! metadata both carry.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Annotation marking a resource whose remote counterpart already exists
/// and must be discovered by name instead of created.
pub const IMPORT_ANNOTATION: &str = "fabsync.io/import";

/// Annotation controlling whether the remote entity is deleted ("delete")
/// or left intact ("retain") when the resource is removed.
pub const RECLAIM_ANNOTATION: &str = "fabsync.io/reclaim-policy";

/// Finalizer gating removal until remote cleanup has finished.
pub const CLEANUP_FINALIZER: &str = "fabsync.io/cleanup";

/// Annotation holding the manifest spec as last applied, so engine-owned
/// backfill of blank fields is not mistaken for an authored edit.
pub const LAST_APPLIED_ANNOTATION: &str = "fabsync.io/last-applied";

/// Namespace + name pair identifying an object in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    pub namespace: String,
    pub name: String,
}

impl Key {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Standard object metadata shared by desired objects and twins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Immutable identity, assigned once at creation.
    pub uid: String,
    pub namespace: String,
    pub name: String,
    /// Bumped every time the spec changes.
    pub generation: i64,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub finalizers: Vec<String>,
    /// Set when deletion has been requested; the object stays in the store
    /// until its finalizer list empties.
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: Uuid::new_v4().to_string(),
            namespace: namespace.into(),
            name: name.into(),
            generation: 1,
            annotations: HashMap::new(),
            finalizers: Vec::new(),
            deletion_timestamp: None,
        }
    }

    pub fn key(&self) -> Key {
        Key::new(self.namespace.clone(), self.name.clone())
    }

    /// Key of the resolved twin paired with this object. Twins are named
    /// by uid so renames cannot orphan them.
    pub fn twin_key(&self) -> Key {
        Key::new(self.namespace.clone(), self.uid.clone())
    }

    pub fn imported(&self) -> bool {
        self.annotations
            .get(IMPORT_ANNOTATION)
            .is_some_and(|v| v == "true")
    }

    pub fn reclaim(&self) -> bool {
        self.annotations
            .get(RECLAIM_ANNOTATION)
            .is_some_and(|v| v == "retain")
    }

    /// True when either annotation is absent or carries an unrecognized
    /// value; the CR phase then writes the defaults and stops.
    pub fn annotations_need_defaults(&self) -> bool {
        let import_ok = matches!(
            self.annotations.get(IMPORT_ANNOTATION).map(String::as_str),
            Some("true") | Some("false")
        );
        let reclaim_ok = matches!(
            self.annotations.get(RECLAIM_ANNOTATION).map(String::as_str),
            Some("retain") | Some("delete")
        );
        !import_ok || !reclaim_ok
    }

    /// Normalize both annotations, preserving recognized values.
    pub fn apply_default_annotations(&mut self) {
        let import = if self.imported() { "true" } else { "false" };
        let reclaim = if self.reclaim() { "retain" } else { "delete" };
        self.annotations
            .insert(IMPORT_ANNOTATION.to_string(), import.to_string());
        self.annotations
            .insert(RECLAIM_ANNOTATION.to_string(), reclaim.to_string());
    }

    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_cleanup_finalizer(&self) -> bool {
        self.finalizers.iter().any(|f| f == CLEANUP_FINALIZER)
    }
}

/// Observed provisioning state reported back onto a desired object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisionState {
    #[default]
    Pending,
    #[serde(rename = "OK")]
    Ok,
    Failure,
}

/// Observed outcome of the last reconcile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStatus {
    #[serde(default)]
    pub state: ProvisionState,
    #[serde(default)]
    pub message: String,
}

impl ObjectStatus {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            state: ProvisionState::Ok,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            state: ProvisionState::Failure,
            message: message.into(),
        }
    }
}

/// A user-authored resource expressing target state by name references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesiredObject<S> {
    pub meta: ObjectMeta,
    pub spec: S,
    #[serde(default)]
    pub status: ObjectStatus,
}

/// Engine-owned resolved counterpart of one desired object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwinObject<P> {
    pub meta: ObjectMeta,
    pub spec: TwinSpec<P>,
}

/// Twin spec: resolved references plus the exact payload to synchronize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwinSpec<P> {
    pub imported: bool,
    pub reclaim: bool,
    /// Name of the desired object this twin was generated from.
    pub source_name: String,
    /// Desired-object generation captured at the last regeneration.
    pub source_generation: i64,
    /// Remote identifier; zero until the entity is created or discovered.
    pub remote_id: i64,
    pub payload: P,
}

impl<P> TwinObject<P> {
    /// Build the twin for a desired object, named by its uid.
    pub fn for_desired(desired: &ObjectMeta, payload: P) -> Self {
        Self {
            meta: ObjectMeta {
                uid: Uuid::new_v4().to_string(),
                namespace: desired.namespace.clone(),
                name: desired.uid.clone(),
                generation: 1,
                annotations: HashMap::new(),
                finalizers: Vec::new(),
                deletion_timestamp: None,
            },
            spec: TwinSpec {
                imported: desired.imported(),
                reclaim: desired.reclaim(),
                source_name: desired.name.clone(),
                source_generation: desired.generation,
                remote_id: 0,
                payload,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_annotations_need_defaults() {
        let meta = ObjectMeta::new("default", "web-1");
        assert!(meta.annotations_need_defaults());
        assert!(!meta.imported());
        assert!(!meta.reclaim());
    }

    #[test]
    fn defaults_preserve_recognized_values() {
        let mut meta = ObjectMeta::new("default", "web-1");
        meta.annotations
            .insert(IMPORT_ANNOTATION.to_string(), "true".to_string());
        assert!(meta.annotations_need_defaults());

        meta.apply_default_annotations();
        assert!(!meta.annotations_need_defaults());
        assert!(meta.imported());
        assert!(!meta.reclaim());
        assert_eq!(
            meta.annotations.get(RECLAIM_ANNOTATION).map(String::as_str),
            Some("delete")
        );
    }

    #[test]
    fn unrecognized_values_need_defaults() {
        let mut meta = ObjectMeta::new("default", "web-1");
        meta.apply_default_annotations();
        meta.annotations
            .insert(RECLAIM_ANNOTATION.to_string(), "keep".to_string());
        assert!(meta.annotations_need_defaults());
    }

    #[test]
    fn twin_is_named_by_uid() {
        let mut meta = ObjectMeta::new("prod", "web-1");
        meta.generation = 4;
        let twin = TwinObject::for_desired(&meta, ());
        assert_eq!(twin.meta.name, meta.uid);
        assert_eq!(twin.meta.key(), meta.twin_key());
        assert_eq!(twin.spec.source_name, "web-1");
        assert_eq!(twin.spec.source_generation, 4);
        assert_eq!(twin.spec.remote_id, 0);
    }
}

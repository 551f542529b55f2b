//! Manifest loading: declaratively authored resource definitions on disk.
//!
//! A manifest directory holds YAML (optionally multi-document) and JSON
//! files, each document tagged with its kind. Schema validation beyond
//! what serde enforces is out of scope; unresolvable references surface
//! later through reconcile status.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::kinds::cluster::ClusterSpec;
use crate::kinds::server::ServerSpec;
use crate::kinds::template::TemplateSpec;
use crate::kinds::vpc::VpcSpec;

/// Errors raised while loading a manifest directory.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Identifying header of a manifest document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ManifestMeta {
    pub name: String,
    pub namespace: String,
    pub annotations: HashMap<String, String>,
}

/// One declarative resource definition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind")]
pub enum Manifest {
    InventoryServer {
        metadata: ManifestMeta,
        spec: ServerSpec,
    },
    ServerCluster {
        metadata: ManifestMeta,
        spec: ClusterSpec,
    },
    ClusterTemplate {
        metadata: ManifestMeta,
        spec: TemplateSpec,
    },
    Vpc {
        metadata: ManifestMeta,
        spec: VpcSpec,
    },
}

impl Manifest {
    pub fn metadata(&self) -> &ManifestMeta {
        match self {
            Manifest::InventoryServer { metadata, .. }
            | Manifest::ServerCluster { metadata, .. }
            | Manifest::ClusterTemplate { metadata, .. }
            | Manifest::Vpc { metadata, .. } => metadata,
        }
    }
}

/// Load every `.yaml`/`.yml`/`.json` document in a directory, in file
/// name order.
pub fn load_dir(dir: &Path) -> Result<Vec<Manifest>, ManifestError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ManifestError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    paths.sort();

    let mut manifests = Vec::new();
    for path in paths {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !matches!(ext, "yaml" | "yml" | "json") {
            continue;
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;
        if ext == "json" {
            let manifest =
                serde_json::from_str(&text).map_err(|err| ManifestError::Parse {
                    path: path.clone(),
                    message: err.to_string(),
                })?;
            manifests.push(manifest);
        } else {
            for document in serde_yaml::Deserializer::from_str(&text) {
                let manifest =
                    Manifest::deserialize(document).map_err(|err| ManifestError::Parse {
                        path: path.clone(),
                        message: err.to_string(),
                    })?;
                manifests.push(manifest);
            }
        }
    }
    Ok(manifests)
}

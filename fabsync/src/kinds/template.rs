//! Cluster template kind.
//!
//! Templates carry no name references, so resolution never fails; the
//! interesting part is the typed VNet layout, which the diff compares
//! structurally.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use fabsync_api::types::{RemoteTemplate, TemplatePayload, VnetProfile};
use fabsync_api::{ControlPlane, RemoteError, TemplateApi};

use super::{ResolveError, ResourceKind};
use crate::cache::ResolutionCache;
use crate::model::{DesiredObject, TwinSpec};

/// Desired state of a cluster template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSpec {
    pub vnets: Vec<VnetProfile>,
}

/// Twin payload: the template exactly as it goes on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateAttrs {
    pub name: String,
    pub vnets: Vec<VnetProfile>,
}

/// Adapter for the cluster template kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateKind;

#[async_trait]
impl ResourceKind for TemplateKind {
    const KIND: &'static str = "cluster-template";

    type Spec = TemplateSpec;
    type Payload = TemplateAttrs;
    type Remote = RemoteTemplate;

    async fn resolve(
        &self,
        desired: &DesiredObject<TemplateSpec>,
        _cache: &ResolutionCache,
    ) -> Result<TemplateAttrs, ResolveError> {
        Ok(TemplateAttrs {
            name: desired.meta.name.clone(),
            vnets: desired.spec.vnets.clone(),
        })
    }

    async fn find_by_name(
        &self,
        cache: &ResolutionCache,
        name: &str,
    ) -> Option<Arc<RemoteTemplate>> {
        cache.templates.find_by_name(name).await
    }

    async fn find_by_id(&self, cache: &ResolutionCache, id: i64) -> Option<Arc<RemoteTemplate>> {
        cache.templates.find_by_id(id).await
    }

    async fn create(
        &self,
        api: &dyn ControlPlane,
        twin: &TwinSpec<TemplateAttrs>,
    ) -> Result<i64, RemoteError> {
        api.add_template(&TemplatePayload {
            name: twin.payload.name.clone(),
            vnets: twin.payload.vnets.clone(),
        })
        .await
    }

    async fn update(
        &self,
        api: &dyn ControlPlane,
        id: i64,
        twin: &TwinSpec<TemplateAttrs>,
    ) -> Result<(), RemoteError> {
        api.update_template(
            id,
            &TemplatePayload {
                name: twin.payload.name.clone(),
                vnets: twin.payload.vnets.clone(),
            },
        )
        .await
    }

    async fn delete(&self, api: &dyn ControlPlane, id: i64) -> Result<(), RemoteError> {
        api.delete_template(id).await
    }

    async fn refresh(&self, cache: &ResolutionCache) -> Result<(), RemoteError> {
        cache.templates.download().await
    }

    fn in_sync(&self, twin: &TwinSpec<TemplateAttrs>, remote: &RemoteTemplate) -> bool {
        let attrs = &twin.payload;
        if remote.name != attrs.name {
            debug!(remote = %remote.name, local = %attrs.name, "name changed");
            return false;
        }
        if remote.vnets != attrs.vnets {
            debug!("vnet layout changed");
            return false;
        }
        true
    }
}

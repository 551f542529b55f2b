//! Server cluster kind.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use fabsync_api::types::{ClusterPayload, ClusterUpdate, IdName, RemoteCluster};
use fabsync_api::{ClusterApi, ControlPlane, RemoteError};

use super::{ResolveError, ResourceKind};
use crate::cache::ResolutionCache;
use crate::model::{DesiredObject, TwinSpec};

/// Desired state of a server cluster, referencing everything by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterSpec {
    /// Site name; required.
    pub site: String,
    /// Administering tenant; optional.
    pub admin: String,
    /// VPC name; optional.
    pub vpc: String,
    /// Cluster template name; optional.
    pub template: String,
    pub tags: Vec<String>,
    pub servers: Vec<ClusterMember>,
}

/// One member server of a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterMember {
    pub name: String,
    /// Whether the server may also serve other clusters.
    pub shared: bool,
}

/// Resolved twin payload with every reference as an id/name pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterAttrs {
    pub name: String,
    pub admin: IdName,
    pub site: IdName,
    pub vpc: IdName,
    pub template: IdName,
    pub tags: Vec<String>,
    pub servers: Vec<IdName>,
}

/// Adapter for the server cluster kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterKind;

#[async_trait]
impl ResourceKind for ClusterKind {
    const KIND: &'static str = "server-cluster";

    type Spec = ClusterSpec;
    type Payload = ClusterAttrs;
    type Remote = RemoteCluster;

    async fn resolve(
        &self,
        desired: &DesiredObject<ClusterSpec>,
        cache: &ResolutionCache,
    ) -> Result<ClusterAttrs, ResolveError> {
        let spec = &desired.spec;

        let site = cache
            .sites
            .find_by_name(&spec.site)
            .await
            .ok_or_else(|| ResolveError::new("site", &spec.site))?;

        let mut admin = IdName::default();
        if !spec.admin.is_empty() {
            let found = cache
                .tenants
                .find_by_name(&spec.admin)
                .await
                .ok_or_else(|| ResolveError::new("tenant", &spec.admin))?;
            admin = IdName::new(found.id, &found.name);
        }

        let mut vpc = IdName::default();
        if !spec.vpc.is_empty() {
            let found = cache
                .vpcs
                .find_by_name(&spec.vpc)
                .await
                .ok_or_else(|| ResolveError::new("vpc", &spec.vpc))?;
            vpc = IdName::new(found.id, &found.name);
        }

        let mut template = IdName::default();
        if !spec.template.is_empty() {
            let found = cache
                .templates
                .find_by_name(&spec.template)
                .await
                .ok_or_else(|| ResolveError::new("template", &spec.template))?;
            template = IdName::new(found.id, &found.name);
        }

        let mut servers = Vec::with_capacity(spec.servers.len());
        for member in &spec.servers {
            let found = cache
                .servers
                .find_by_name(&member.name)
                .await
                .ok_or_else(|| ResolveError::new("server", &member.name))?;
            servers.push(IdName::new(found.id, &member.name));
        }

        Ok(ClusterAttrs {
            name: desired.meta.name.clone(),
            admin,
            site: IdName::new(site.id, &site.name),
            vpc,
            template,
            tags: spec.tags.clone(),
            servers,
        })
    }

    async fn find_by_name(
        &self,
        cache: &ResolutionCache,
        name: &str,
    ) -> Option<Arc<RemoteCluster>> {
        cache.clusters.find_by_name(name).await
    }

    async fn find_by_id(&self, cache: &ResolutionCache, id: i64) -> Option<Arc<RemoteCluster>> {
        cache.clusters.find_by_id(id).await
    }

    async fn create(
        &self,
        api: &dyn ControlPlane,
        twin: &TwinSpec<ClusterAttrs>,
    ) -> Result<i64, RemoteError> {
        let attrs = &twin.payload;
        api.add_cluster(&ClusterPayload {
            name: attrs.name.clone(),
            admin: attrs.admin.clone(),
            site: attrs.site.clone(),
            vpc: attrs.vpc.clone(),
            template: attrs.template.clone(),
            tags: attrs.tags.clone(),
            servers: attrs.servers.clone(),
        })
        .await
    }

    async fn update(
        &self,
        api: &dyn ControlPlane,
        id: i64,
        twin: &TwinSpec<ClusterAttrs>,
    ) -> Result<(), RemoteError> {
        // The update surface is only the member list and tags; placement
        // fields are create-only on the remote API.
        api.update_cluster(
            id,
            &ClusterUpdate {
                tags: twin.payload.tags.clone(),
                servers: twin.payload.servers.clone(),
            },
        )
        .await
    }

    async fn delete(&self, api: &dyn ControlPlane, id: i64) -> Result<(), RemoteError> {
        api.delete_cluster(id).await
    }

    async fn refresh(&self, cache: &ResolutionCache) -> Result<(), RemoteError> {
        cache.clusters.download().await
    }

    fn in_sync(&self, twin: &TwinSpec<ClusterAttrs>, remote: &RemoteCluster) -> bool {
        let attrs = &twin.payload;
        if remote.name != attrs.name {
            debug!(remote = %remote.name, local = %attrs.name, "name changed");
            return false;
        }
        if remote.site.id != attrs.site.id {
            debug!(remote = remote.site.id, local = attrs.site.id, "site changed");
            return false;
        }
        if remote.vpc.id != attrs.vpc.id {
            debug!(remote = remote.vpc.id, local = attrs.vpc.id, "vpc changed");
            return false;
        }
        if remote.template.id != attrs.template.id {
            debug!(remote = remote.template.id, local = attrs.template.id, "template changed");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_attrs() -> ClusterAttrs {
        ClusterAttrs {
            name: "batch".into(),
            admin: IdName::new(2, "acme"),
            site: IdName::new(3, "nyc1"),
            vpc: IdName::new(5, "prod-vpc"),
            template: IdName::new(6, "gpu-mesh"),
            tags: vec!["prod".into()],
            servers: vec![IdName::new(11, "web-1")],
        }
    }

    fn make_remote() -> RemoteCluster {
        RemoteCluster {
            id: 9,
            name: "batch".into(),
            admin: IdName::new(2, "acme"),
            site: IdName::new(3, "nyc1"),
            vpc: IdName::new(5, "prod-vpc"),
            template: IdName::new(6, "gpu-mesh"),
            tags: vec!["prod".into()],
            servers: vec![IdName::new(11, "web-1")],
        }
    }

    fn make_twin(attrs: ClusterAttrs) -> TwinSpec<ClusterAttrs> {
        TwinSpec {
            imported: false,
            reclaim: false,
            source_name: attrs.name.clone(),
            source_generation: 1,
            remote_id: 9,
            payload: attrs,
        }
    }

    #[test]
    fn matching_fields_are_in_sync() {
        assert!(ClusterKind.in_sync(&make_twin(make_attrs()), &make_remote()));
    }

    #[test]
    fn template_drift_is_detected() {
        let mut attrs = make_attrs();
        attrs.template = IdName::new(8, "cpu-mesh");
        assert!(!ClusterKind.in_sync(&make_twin(attrs), &make_remote()));
    }

    #[test]
    fn member_drift_alone_is_not_compared() {
        // Membership is re-asserted whenever a compared field drifts; the
        // member list itself is not part of the diff, matching the remote
        // API's update surface.
        let mut attrs = make_attrs();
        attrs.servers.push(IdName::new(12, "web-2"));
        assert!(ClusterKind.in_sync(&make_twin(attrs), &make_remote()));
    }
}

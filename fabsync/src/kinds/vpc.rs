//! VPC kind.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use fabsync_api::types::{IdName, RemoteVpc, VpcPayload};
use fabsync_api::{ControlPlane, RemoteError, VpcApi};

use super::{ResolveError, ResourceKind};
use crate::cache::ResolutionCache;
use crate::model::{DesiredObject, TwinSpec};

/// Desired state of a VPC, referencing tenants by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VpcSpec {
    /// Administering tenant; required.
    pub admin_tenant: String,
    /// Tenants granted access to the VPC.
    pub guest_tenants: Vec<String>,
    pub tags: Vec<String>,
}

/// Resolved twin payload with tenants as id/name pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VpcAttrs {
    pub name: String,
    pub admin_tenant: IdName,
    pub guest_tenants: Vec<IdName>,
    pub tags: Vec<String>,
}

/// Adapter for the VPC kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct VpcKind;

#[async_trait]
impl ResourceKind for VpcKind {
    const KIND: &'static str = "vpc";

    type Spec = VpcSpec;
    type Payload = VpcAttrs;
    type Remote = RemoteVpc;

    async fn resolve(
        &self,
        desired: &DesiredObject<VpcSpec>,
        cache: &ResolutionCache,
    ) -> Result<VpcAttrs, ResolveError> {
        let spec = &desired.spec;

        let admin = cache
            .tenants
            .find_by_name(&spec.admin_tenant)
            .await
            .ok_or_else(|| ResolveError::new("tenant", &spec.admin_tenant))?;

        let mut guest_tenants = Vec::with_capacity(spec.guest_tenants.len());
        for guest in &spec.guest_tenants {
            let found = cache
                .tenants
                .find_by_name(guest)
                .await
                .ok_or_else(|| ResolveError::new("tenant", guest))?;
            guest_tenants.push(IdName::new(found.id, &found.name));
        }

        Ok(VpcAttrs {
            name: desired.meta.name.clone(),
            admin_tenant: IdName::new(admin.id, &admin.name),
            guest_tenants,
            tags: spec.tags.clone(),
        })
    }

    async fn find_by_name(&self, cache: &ResolutionCache, name: &str) -> Option<Arc<RemoteVpc>> {
        cache.vpcs.find_by_name(name).await
    }

    async fn find_by_id(&self, cache: &ResolutionCache, id: i64) -> Option<Arc<RemoteVpc>> {
        cache.vpcs.find_by_id(id).await
    }

    async fn create(
        &self,
        api: &dyn ControlPlane,
        twin: &TwinSpec<VpcAttrs>,
    ) -> Result<i64, RemoteError> {
        api.add_vpc(&payload(&twin.payload)).await
    }

    async fn update(
        &self,
        api: &dyn ControlPlane,
        id: i64,
        twin: &TwinSpec<VpcAttrs>,
    ) -> Result<(), RemoteError> {
        api.update_vpc(id, &payload(&twin.payload)).await
    }

    async fn delete(&self, api: &dyn ControlPlane, id: i64) -> Result<(), RemoteError> {
        api.delete_vpc(id).await
    }

    async fn refresh(&self, cache: &ResolutionCache) -> Result<(), RemoteError> {
        cache.vpcs.download().await
    }

    fn in_sync(&self, twin: &TwinSpec<VpcAttrs>, remote: &RemoteVpc) -> bool {
        let attrs = &twin.payload;
        if remote.name != attrs.name {
            debug!(remote = %remote.name, local = %attrs.name, "name changed");
            return false;
        }
        if remote.admin_tenant.id != attrs.admin_tenant.id {
            debug!(
                remote = remote.admin_tenant.id,
                local = attrs.admin_tenant.id,
                "admin tenant changed"
            );
            return false;
        }
        if remote.guest_tenants.len() != attrs.guest_tenants.len() {
            debug!(
                remote = remote.guest_tenants.len(),
                local = attrs.guest_tenants.len(),
                "guest tenant count changed"
            );
            return false;
        }
        true
    }
}

fn payload(attrs: &VpcAttrs) -> VpcPayload {
    VpcPayload {
        name: attrs.name.clone(),
        admin_tenant: attrs.admin_tenant.clone(),
        guest_tenants: attrs.guest_tenants.clone(),
        tags: attrs.tags.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_twin() -> TwinSpec<VpcAttrs> {
        TwinSpec {
            imported: false,
            reclaim: false,
            source_name: "prod-vpc".into(),
            source_generation: 1,
            remote_id: 5,
            payload: VpcAttrs {
                name: "prod-vpc".into(),
                admin_tenant: IdName::new(2, "acme"),
                guest_tenants: vec![IdName::new(3, "analytics")],
                tags: vec![],
            },
        }
    }

    fn make_remote() -> RemoteVpc {
        RemoteVpc {
            id: 5,
            name: "prod-vpc".into(),
            admin_tenant: IdName::new(2, "acme"),
            guest_tenants: vec![IdName::new(3, "analytics")],
            tags: vec![],
        }
    }

    #[test]
    fn matching_fields_are_in_sync() {
        assert!(VpcKind.in_sync(&make_twin(), &make_remote()));
    }

    #[test]
    fn guest_tenant_count_drift_is_detected() {
        let mut remote = make_remote();
        remote.guest_tenants.clear();
        assert!(!VpcKind.in_sync(&make_twin(), &remote));
    }

    #[test]
    fn admin_tenant_drift_is_detected() {
        let mut remote = make_remote();
        remote.admin_tenant = IdName::new(9, "globex");
        assert!(!VpcKind.in_sync(&make_twin(), &remote));
    }
}

//! Inventory server kind.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use fabsync_api::types::{AutoNumber, IdName, PortLink, RemoteServer, ServerPayload};
use fabsync_api::{ControlPlane, RemoteError, ServerApi};

use super::{ResolveError, ResourceKind};
use crate::cache::ResolutionCache;
use crate::model::{DesiredObject, TwinSpec};

/// Desired state of an inventory server, referencing everything by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSpec {
    /// Owning tenant; optional.
    pub tenant: String,
    pub description: String,
    /// Site name; required.
    pub site: String,
    /// Hardware profile name; optional.
    pub profile: String,
    /// Main address; empty means the control plane assigns one.
    pub main_ip: String,
    /// Management address; empty means the control plane assigns one.
    pub mgmt_ip: String,
    /// BGP ASN; zero means auto.
    pub asn: i64,
    pub ports_count: i64,
    /// Hardware identity, e.g. from the BMC.
    pub uuid: String,
    pub links: Vec<ServerLink>,
    pub custom_data: String,
    pub tags: Vec<String>,
    /// Server role, e.g. "hypervisor".
    pub role: String,
}

/// Physical connection from a server NIC to a switch port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerLink {
    /// Server-side NIC name, e.g. "eth0".
    pub local: String,
    /// Switch port in `port@switch` form, e.g. "swp1@leaf01".
    pub remote: String,
}

/// Resolved twin payload: every reference replaced by its remote ID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerAttrs {
    pub name: String,
    pub description: String,
    pub tenant: IdName,
    pub site: IdName,
    pub profile: IdName,
    pub asn: i64,
    pub main_ip: String,
    pub mgmt_ip: String,
    pub ports_count: i64,
    pub uuid: String,
    pub links: Vec<PortLink>,
    pub custom_data: String,
    pub tags: Vec<String>,
    pub role: String,
}

fn wire_payload(attrs: &ServerAttrs) -> ServerPayload {
    let main_address = if attrs.main_ip.is_empty() {
        "auto".to_string()
    } else {
        attrs.main_ip.clone()
    };
    let mgmt_address = if attrs.mgmt_ip.is_empty() {
        "auto".to_string()
    } else {
        attrs.mgmt_ip.clone()
    };
    ServerPayload {
        name: attrs.name.clone(),
        description: attrs.description.clone(),
        tenant: attrs.tenant.clone(),
        site: attrs.site.clone(),
        profile: attrs.profile.clone(),
        asn: AutoNumber::from_value(attrs.asn),
        main_address,
        mgmt_address,
        port_count: attrs.ports_count,
        uuid: attrs.uuid.clone(),
        links: attrs.links.clone(),
        custom_data: attrs.custom_data.clone(),
        tags: attrs.tags.clone(),
        role: attrs.role.clone(),
    }
}

/// Adapter for the inventory server kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerKind;

#[async_trait]
impl ResourceKind for ServerKind {
    const KIND: &'static str = "inventory-server";

    type Spec = ServerSpec;
    type Payload = ServerAttrs;
    type Remote = RemoteServer;

    async fn resolve(
        &self,
        desired: &DesiredObject<ServerSpec>,
        cache: &ResolutionCache,
    ) -> Result<ServerAttrs, ResolveError> {
        let spec = &desired.spec;

        let site = cache
            .sites
            .find_by_name(&spec.site)
            .await
            .ok_or_else(|| ResolveError::new("site", &spec.site))?;

        let mut tenant = IdName::default();
        if !spec.tenant.is_empty() {
            let found = cache
                .tenants
                .find_by_name(&spec.tenant)
                .await
                .ok_or_else(|| ResolveError::new("tenant", &spec.tenant))?;
            tenant = IdName::new(found.id, &found.name);
        }

        let mut profile = IdName::default();
        if !spec.profile.is_empty() {
            let found = cache
                .profiles
                .find_by_name(&spec.profile)
                .await
                .ok_or_else(|| ResolveError::new("profile", &spec.profile))?;
            profile = IdName::new(found.id, &found.name);
        }

        let mut links = Vec::with_capacity(spec.links.len());
        for link in &spec.links {
            let port = cache
                .ports
                .find_by_name(&link.remote)
                .await
                .ok_or_else(|| ResolveError::new("port", &link.remote))?;
            links.push(PortLink {
                local: IdName::new(0, &link.local),
                remote: IdName::new(port.id, &port.port),
            });
        }

        Ok(ServerAttrs {
            name: desired.meta.name.clone(),
            description: spec.description.clone(),
            tenant,
            site: IdName::new(site.id, &site.name),
            profile,
            asn: spec.asn,
            main_ip: spec.main_ip.clone(),
            mgmt_ip: spec.mgmt_ip.clone(),
            ports_count: spec.ports_count,
            uuid: spec.uuid.clone(),
            links,
            custom_data: spec.custom_data.clone(),
            tags: spec.tags.clone(),
            role: spec.role.clone(),
        })
    }

    async fn find_by_name(
        &self,
        cache: &ResolutionCache,
        name: &str,
    ) -> Option<Arc<RemoteServer>> {
        cache.servers.find_by_name(name).await
    }

    async fn find_by_id(&self, cache: &ResolutionCache, id: i64) -> Option<Arc<RemoteServer>> {
        cache.servers.find_by_id(id).await
    }

    async fn create(
        &self,
        api: &dyn ControlPlane,
        twin: &TwinSpec<ServerAttrs>,
    ) -> Result<i64, RemoteError> {
        api.add_server(&wire_payload(&twin.payload)).await
    }

    async fn update(
        &self,
        api: &dyn ControlPlane,
        id: i64,
        twin: &TwinSpec<ServerAttrs>,
    ) -> Result<(), RemoteError> {
        api.update_server(id, &wire_payload(&twin.payload)).await
    }

    async fn delete(&self, api: &dyn ControlPlane, id: i64) -> Result<(), RemoteError> {
        api.delete_server(id).await
    }

    async fn refresh(&self, cache: &ResolutionCache) -> Result<(), RemoteError> {
        cache.servers.download().await
    }

    fn in_sync(&self, twin: &TwinSpec<ServerAttrs>, remote: &RemoteServer) -> bool {
        let attrs = &twin.payload;
        if remote.name != attrs.name {
            debug!(remote = %remote.name, local = %attrs.name, "name changed");
            return false;
        }
        if remote.description != attrs.description {
            debug!("description changed");
            return false;
        }
        if remote.tenant.id != attrs.tenant.id {
            debug!(remote = remote.tenant.id, local = attrs.tenant.id, "tenant changed");
            return false;
        }
        if remote.site.id != attrs.site.id {
            debug!(remote = remote.site.id, local = attrs.site.id, "site changed");
            return false;
        }
        if remote.profile.id != attrs.profile.id {
            debug!(remote = remote.profile.id, local = attrs.profile.id, "profile changed");
            return false;
        }
        if remote.main_ip.address != attrs.main_ip {
            debug!(remote = %remote.main_ip.address, local = %attrs.main_ip, "main address changed");
            return false;
        }
        if remote.mgmt_ip.address != attrs.mgmt_ip {
            debug!(remote = %remote.mgmt_ip.address, local = %attrs.mgmt_ip, "mgmt address changed");
            return false;
        }
        if remote.port_count != attrs.ports_count {
            debug!(remote = remote.port_count, local = attrs.ports_count, "port count changed");
            return false;
        }
        if remote.uuid != attrs.uuid {
            debug!("uuid changed");
            return false;
        }
        if remote.custom_data != attrs.custom_data {
            debug!("custom data changed");
            return false;
        }
        if remote.role != attrs.role {
            debug!(remote = %remote.role, local = %attrs.role, "role changed");
            return false;
        }
        true
    }

    fn adopt(&self, payload: &mut ServerAttrs, remote: &RemoteServer) -> bool {
        let mut changed = false;
        if payload.main_ip.is_empty() && !remote.main_ip.address.is_empty() {
            payload.main_ip = remote.main_ip.address.clone();
            changed = true;
        }
        if payload.mgmt_ip.is_empty() && !remote.mgmt_ip.address.is_empty() {
            payload.mgmt_ip = remote.mgmt_ip.address.clone();
            changed = true;
        }
        if payload.asn == 0 && remote.asn != 0 {
            payload.asn = remote.asn;
            changed = true;
        }
        changed
    }

    fn backfill(&self, spec: &mut ServerSpec, payload: &ServerAttrs) -> bool {
        let mut changed = false;
        if spec.main_ip.is_empty() && !payload.main_ip.is_empty() {
            spec.main_ip = payload.main_ip.clone();
            changed = true;
        }
        if spec.mgmt_ip.is_empty() && !payload.mgmt_ip.is_empty() {
            spec.mgmt_ip = payload.mgmt_ip.clone();
            changed = true;
        }
        if spec.asn == 0 && payload.asn != 0 {
            spec.asn = payload.asn;
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabsync_api::types::AddressRef;

    fn make_twin(attrs: ServerAttrs) -> TwinSpec<ServerAttrs> {
        TwinSpec {
            imported: false,
            reclaim: false,
            source_name: attrs.name.clone(),
            source_generation: 1,
            remote_id: 7,
            payload: attrs,
        }
    }

    fn make_attrs() -> ServerAttrs {
        ServerAttrs {
            name: "web-1".into(),
            description: "frontend".into(),
            tenant: IdName::new(2, "acme"),
            site: IdName::new(3, "nyc1"),
            profile: IdName::new(4, "compute"),
            asn: 65001,
            main_ip: "192.0.2.10".into(),
            mgmt_ip: "198.51.100.10".into(),
            ports_count: 2,
            uuid: "bmc-1234".into(),
            links: vec![],
            custom_data: String::new(),
            tags: vec![],
            role: "hypervisor".into(),
        }
    }

    fn make_remote() -> RemoteServer {
        RemoteServer {
            id: 7,
            name: "web-1".into(),
            description: "frontend".into(),
            tenant: IdName::new(2, "acme"),
            site: IdName::new(3, "nyc1"),
            profile: IdName::new(4, "compute"),
            asn: 65001,
            main_ip: AddressRef {
                address: "192.0.2.10".into(),
            },
            mgmt_ip: AddressRef {
                address: "198.51.100.10".into(),
            },
            port_count: 2,
            uuid: "bmc-1234".into(),
            links: vec![],
            custom_data: String::new(),
            tags: vec![],
            role: "hypervisor".into(),
        }
    }

    #[test]
    fn matching_fields_are_in_sync() {
        assert!(ServerKind.in_sync(&make_twin(make_attrs()), &make_remote()));
    }

    #[test]
    fn description_drift_is_detected() {
        let mut attrs = make_attrs();
        attrs.description = "frontend v2".into();
        assert!(!ServerKind.in_sync(&make_twin(attrs), &make_remote()));
    }

    #[test]
    fn asn_is_not_compared() {
        // ASN is assigned remotely when requested as auto; drift on it
        // never forces an update.
        let mut attrs = make_attrs();
        attrs.asn = 65002;
        assert!(ServerKind.in_sync(&make_twin(attrs), &make_remote()));
    }

    #[test]
    fn blank_addresses_go_to_the_wire_as_auto() {
        let mut attrs = make_attrs();
        attrs.main_ip = String::new();
        attrs.asn = 0;
        let payload = wire_payload(&attrs);
        assert_eq!(payload.main_address, "auto");
        assert_eq!(payload.mgmt_address, "198.51.100.10");
        assert_eq!(payload.asn, AutoNumber::Auto);
    }

    #[test]
    fn adopt_fills_only_blank_fields() {
        let mut attrs = make_attrs();
        attrs.main_ip = String::new();
        attrs.asn = 0;
        let changed = ServerKind.adopt(&mut attrs, &make_remote());
        assert!(changed);
        assert_eq!(attrs.main_ip, "192.0.2.10");
        assert_eq!(attrs.asn, 65001);
        // Populated fields stay untouched.
        assert_eq!(attrs.mgmt_ip, "198.51.100.10");
        assert!(!ServerKind.adopt(&mut attrs, &make_remote()));
    }

    #[test]
    fn backfill_reports_changes() {
        let mut spec = ServerSpec {
            site: "nyc1".into(),
            ..Default::default()
        };
        let changed = ServerKind.backfill(&mut spec, &make_attrs());
        assert!(changed);
        assert_eq!(spec.main_ip, "192.0.2.10");
        assert_eq!(spec.asn, 65001);
        assert!(!ServerKind.backfill(&mut spec, &make_attrs()));
    }
}

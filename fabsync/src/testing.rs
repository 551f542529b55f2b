//! In-memory fake control plane for tests.
//!
//! Backed by plain vectors and guarded by a blocking mutex (no await while
//! held). Every mutating call bumps a counter so tests can assert, for
//! example, that a converged resource issues zero remote writes.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use fabsync_api::error::Result as RemoteResult;
use fabsync_api::types::{
    AddressRef, AutoNumber, ClusterPayload, ClusterUpdate, IdName, RemoteCluster, RemotePort,
    RemoteProfile, RemoteServer, RemoteSite, RemoteTemplate, RemoteTenant, RemoteVpc,
    ServerPayload, TemplatePayload, VpcPayload,
};
use fabsync_api::{ClusterApi, RefApi, RemoteError, ServerApi, TemplateApi, VpcApi};

/// Per-call counters.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub lists: AtomicUsize,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl CallCounts {
    pub fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Total mutating calls.
    pub fn writes(&self) -> usize {
        self.creates() + self.updates() + self.deletes()
    }
}

/// Mutable remote state.
#[derive(Debug, Default)]
pub struct FakeState {
    pub sites: Vec<RemoteSite>,
    pub tenants: Vec<RemoteTenant>,
    pub profiles: Vec<RemoteProfile>,
    pub ports: Vec<RemotePort>,
    pub servers: Vec<RemoteServer>,
    pub clusters: Vec<RemoteCluster>,
    pub templates: Vec<RemoteTemplate>,
    pub vpcs: Vec<RemoteVpc>,
    next_id: i64,
}

impl FakeState {
    fn assign_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id + 1000
    }
}

/// Fake control plane.
#[derive(Debug, Default)]
pub struct FakeControlPlane {
    pub state: Mutex<FakeState>,
    pub calls: CallCounts,
    /// When set, every delete answers with this envelope status.
    pub delete_status: Mutex<Option<u16>>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed helper: run a closure against the remote state.
    pub fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    /// Force every delete to answer with the given envelope status.
    pub fn set_delete_status(&self, status: Option<u16>) {
        *self.delete_status.lock().unwrap() = status;
    }

    fn check_delete(&self) -> RemoteResult<()> {
        if let Some(status) = *self.delete_status.lock().unwrap() {
            return Err(RemoteError::Api {
                status,
                message: format!("delete refused with status {status}"),
            });
        }
        Ok(())
    }

}

fn delete_by_id<T>(items: &mut Vec<T>, id: i64, id_of: impl Fn(&T) -> i64) -> RemoteResult<()> {
    let before = items.len();
    items.retain(|item| id_of(item) != id);
    if items.len() == before {
        return Err(RemoteError::Api {
            status: 404,
            message: format!("no entity with id {id}"),
        });
    }
    Ok(())
}

fn server_from_payload(id: i64, payload: &ServerPayload) -> RemoteServer {
    // Blank "auto" fields get deterministic assignments so adoption and
    // backfill paths are exercisable.
    let main_ip = if payload.main_address == "auto" {
        format!("192.0.2.{id}")
    } else {
        payload.main_address.clone()
    };
    let mgmt_ip = if payload.mgmt_address == "auto" {
        format!("198.51.100.{id}")
    } else {
        payload.mgmt_address.clone()
    };
    let asn = match payload.asn {
        AutoNumber::Auto => 64512 + id,
        AutoNumber::Value(v) => v,
    };
    RemoteServer {
        id,
        name: payload.name.clone(),
        description: payload.description.clone(),
        tenant: payload.tenant.clone(),
        site: payload.site.clone(),
        profile: payload.profile.clone(),
        asn,
        main_ip: AddressRef { address: main_ip },
        mgmt_ip: AddressRef { address: mgmt_ip },
        port_count: payload.port_count,
        uuid: payload.uuid.clone(),
        links: payload.links.clone(),
        custom_data: payload.custom_data.clone(),
        tags: payload.tags.clone(),
        role: payload.role.clone(),
    }
}

#[async_trait]
impl ServerApi for FakeControlPlane {
    async fn list_servers(&self) -> RemoteResult<Vec<RemoteServer>> {
        self.calls.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().servers.clone())
    }

    async fn add_server(&self, payload: &ServerPayload) -> RemoteResult<i64> {
        self.calls.creates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let id = state.assign_id();
        let server = server_from_payload(id, payload);
        state.servers.push(server);
        Ok(id)
    }

    async fn update_server(&self, id: i64, payload: &ServerPayload) -> RemoteResult<()> {
        self.calls.updates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let Some(existing) = state.servers.iter_mut().find(|s| s.id == id) else {
            return Err(RemoteError::Api {
                status: 404,
                message: format!("no server with id {id}"),
            });
        };
        *existing = server_from_payload(id, payload);
        Ok(())
    }

    async fn delete_server(&self, id: i64) -> RemoteResult<()> {
        self.calls.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_delete()?;
        let mut state = self.state.lock().unwrap();
        delete_by_id(&mut state.servers, id, |s| s.id)
    }
}

#[async_trait]
impl ClusterApi for FakeControlPlane {
    async fn list_clusters(&self) -> RemoteResult<Vec<RemoteCluster>> {
        self.calls.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().clusters.clone())
    }

    async fn add_cluster(&self, payload: &ClusterPayload) -> RemoteResult<i64> {
        self.calls.creates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let id = state.assign_id();
        state.clusters.push(RemoteCluster {
            id,
            name: payload.name.clone(),
            admin: payload.admin.clone(),
            site: payload.site.clone(),
            vpc: payload.vpc.clone(),
            template: payload.template.clone(),
            tags: payload.tags.clone(),
            servers: payload.servers.clone(),
        });
        Ok(id)
    }

    async fn update_cluster(&self, id: i64, payload: &ClusterUpdate) -> RemoteResult<()> {
        self.calls.updates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let Some(existing) = state.clusters.iter_mut().find(|c| c.id == id) else {
            return Err(RemoteError::Api {
                status: 404,
                message: format!("no cluster with id {id}"),
            });
        };
        existing.tags = payload.tags.clone();
        existing.servers = payload.servers.clone();
        Ok(())
    }

    async fn delete_cluster(&self, id: i64) -> RemoteResult<()> {
        self.calls.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_delete()?;
        let mut state = self.state.lock().unwrap();
        delete_by_id(&mut state.clusters, id, |c| c.id)
    }
}

#[async_trait]
impl TemplateApi for FakeControlPlane {
    async fn list_templates(&self) -> RemoteResult<Vec<RemoteTemplate>> {
        self.calls.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().templates.clone())
    }

    async fn add_template(&self, payload: &TemplatePayload) -> RemoteResult<i64> {
        self.calls.creates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let id = state.assign_id();
        state.templates.push(RemoteTemplate {
            id,
            name: payload.name.clone(),
            vnets: payload.vnets.clone(),
        });
        Ok(id)
    }

    async fn update_template(&self, id: i64, payload: &TemplatePayload) -> RemoteResult<()> {
        self.calls.updates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let Some(existing) = state.templates.iter_mut().find(|t| t.id == id) else {
            return Err(RemoteError::Api {
                status: 404,
                message: format!("no template with id {id}"),
            });
        };
        existing.name = payload.name.clone();
        existing.vnets = payload.vnets.clone();
        Ok(())
    }

    async fn delete_template(&self, id: i64) -> RemoteResult<()> {
        self.calls.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_delete()?;
        let mut state = self.state.lock().unwrap();
        delete_by_id(&mut state.templates, id, |t| t.id)
    }
}

#[async_trait]
impl VpcApi for FakeControlPlane {
    async fn list_vpcs(&self) -> RemoteResult<Vec<RemoteVpc>> {
        self.calls.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().vpcs.clone())
    }

    async fn add_vpc(&self, payload: &VpcPayload) -> RemoteResult<i64> {
        self.calls.creates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let id = state.assign_id();
        state.vpcs.push(RemoteVpc {
            id,
            name: payload.name.clone(),
            admin_tenant: payload.admin_tenant.clone(),
            guest_tenants: payload.guest_tenants.clone(),
            tags: payload.tags.clone(),
        });
        Ok(id)
    }

    async fn update_vpc(&self, id: i64, payload: &VpcPayload) -> RemoteResult<()> {
        self.calls.updates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let Some(existing) = state.vpcs.iter_mut().find(|v| v.id == id) else {
            return Err(RemoteError::Api {
                status: 404,
                message: format!("no vpc with id {id}"),
            });
        };
        existing.name = payload.name.clone();
        existing.admin_tenant = payload.admin_tenant.clone();
        existing.guest_tenants = payload.guest_tenants.clone();
        existing.tags = payload.tags.clone();
        Ok(())
    }

    async fn delete_vpc(&self, id: i64) -> RemoteResult<()> {
        self.calls.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_delete()?;
        let mut state = self.state.lock().unwrap();
        delete_by_id(&mut state.vpcs, id, |v| v.id)
    }
}

#[async_trait]
impl RefApi for FakeControlPlane {
    async fn list_sites(&self) -> RemoteResult<Vec<RemoteSite>> {
        self.calls.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().sites.clone())
    }

    async fn list_tenants(&self) -> RemoteResult<Vec<RemoteTenant>> {
        self.calls.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().tenants.clone())
    }

    async fn list_profiles(&self) -> RemoteResult<Vec<RemoteProfile>> {
        self.calls.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().profiles.clone())
    }

    async fn list_ports(&self) -> RemoteResult<Vec<RemotePort>> {
        self.calls.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().ports.clone())
    }
}

/// Seed a site.
pub fn site(id: i64, name: &str) -> RemoteSite {
    RemoteSite {
        id,
        name: name.to_string(),
    }
}

/// Seed a tenant.
pub fn tenant(id: i64, name: &str) -> RemoteTenant {
    RemoteTenant {
        id,
        name: name.to_string(),
    }
}

/// Seed a server with the given placement and otherwise default fields.
pub fn server(id: i64, name: &str, site: IdName) -> RemoteServer {
    RemoteServer {
        id,
        name: name.to_string(),
        site,
        ..Default::default()
    }
}

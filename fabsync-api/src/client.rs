//! Capability traits for the control-plane API.
//!
//! Each entity kind gets its own trait; `ControlPlane` composes them so the
//! engine can hold a single injected client. Implementations must apply a
//! fixed per-call timeout; a timeout is an ordinary [`RemoteError`] and the
//! caller retries on its own schedule.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    ClusterPayload, ClusterUpdate, RemoteCluster, RemotePort, RemoteProfile, RemoteServer,
    RemoteSite, RemoteTemplate, RemoteTenant, RemoteVpc, ServerPayload, TemplatePayload,
    VpcPayload,
};

/// Inventory server operations.
#[async_trait]
pub trait ServerApi: Send + Sync {
    async fn list_servers(&self) -> Result<Vec<RemoteServer>>;

    /// Create a server, returning its assigned ID.
    async fn add_server(&self, payload: &ServerPayload) -> Result<i64>;

    async fn update_server(&self, id: i64, payload: &ServerPayload) -> Result<()>;

    async fn delete_server(&self, id: i64) -> Result<()>;
}

/// Server cluster operations.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn list_clusters(&self) -> Result<Vec<RemoteCluster>>;

    /// Create a cluster, returning its assigned ID.
    async fn add_cluster(&self, payload: &ClusterPayload) -> Result<i64>;

    async fn update_cluster(&self, id: i64, payload: &ClusterUpdate) -> Result<()>;

    async fn delete_cluster(&self, id: i64) -> Result<()>;
}

/// Cluster template operations.
#[async_trait]
pub trait TemplateApi: Send + Sync {
    async fn list_templates(&self) -> Result<Vec<RemoteTemplate>>;

    /// Create a template, returning its assigned ID.
    async fn add_template(&self, payload: &TemplatePayload) -> Result<i64>;

    async fn update_template(&self, id: i64, payload: &TemplatePayload) -> Result<()>;

    async fn delete_template(&self, id: i64) -> Result<()>;
}

/// VPC operations.
#[async_trait]
pub trait VpcApi: Send + Sync {
    async fn list_vpcs(&self) -> Result<Vec<RemoteVpc>>;

    /// Create a VPC, returning its assigned ID.
    async fn add_vpc(&self, payload: &VpcPayload) -> Result<i64>;

    async fn update_vpc(&self, id: i64, payload: &VpcPayload) -> Result<()>;

    async fn delete_vpc(&self, id: i64) -> Result<()>;
}

/// Read-only listings for the reference kinds.
#[async_trait]
pub trait RefApi: Send + Sync {
    async fn list_sites(&self) -> Result<Vec<RemoteSite>>;

    async fn list_tenants(&self) -> Result<Vec<RemoteTenant>>;

    async fn list_profiles(&self) -> Result<Vec<RemoteProfile>>;

    async fn list_ports(&self) -> Result<Vec<RemotePort>>;
}

/// Composite control-plane client combining every kind.
pub trait ControlPlane: ServerApi + ClusterApi + TemplateApi + VpcApi + RefApi {}

impl<T: ServerApi + ClusterApi + TemplateApi + VpcApi + RefApi> ControlPlane for T {}

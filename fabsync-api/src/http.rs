//! reqwest-backed control-plane client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::client::{ClusterApi, RefApi, ServerApi, TemplateApi, VpcApi};
use crate::envelope::{AddReply, Envelope};
use crate::error::Result;
use crate::types::{
    ClusterPayload, ClusterUpdate, RemoteCluster, RemotePort, RemoteProfile, RemoteServer,
    RemoteSite, RemoteTemplate, RemoteTenant, RemoteVpc, ServerPayload, TemplatePayload,
    VpcPayload,
};

/// HTTP client for the fabric control plane.
///
/// Every request carries the same fixed timeout; a timeout surfaces as a
/// transport error and the caller retries on its own schedule.
pub struct HttpControlPlane {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpControlPlane {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_list<E: DeserializeOwned>(&self, path: &str) -> Result<Vec<E>> {
        debug!(path, "GET");
        let env: Envelope<Vec<E>> = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?
            .json()
            .await?;
        env.into_data()
    }

    async fn add<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<i64> {
        debug!(path, "POST");
        let env: Envelope<AddReply> = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?
            .json()
            .await?;
        env.into_data().map(|reply| reply.id)
    }

    async fn put<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<()> {
        debug!(path, "PUT");
        let env: Envelope<serde_json::Value> = self
            .http
            .put(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?
            .json()
            .await?;
        env.into_result()
    }

    async fn remove(&self, path: &str) -> Result<()> {
        debug!(path, "DELETE");
        let env: Envelope<serde_json::Value> = self
            .http
            .delete(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?
            .json()
            .await?;
        env.into_result()
    }
}

#[async_trait]
impl ServerApi for HttpControlPlane {
    async fn list_servers(&self) -> Result<Vec<RemoteServer>> {
        self.get_list("/api/inventory/servers").await
    }

    async fn add_server(&self, payload: &ServerPayload) -> Result<i64> {
        self.add("/api/inventory/servers", payload).await
    }

    async fn update_server(&self, id: i64, payload: &ServerPayload) -> Result<()> {
        self.put(&format!("/api/inventory/servers/{id}"), payload)
            .await
    }

    async fn delete_server(&self, id: i64) -> Result<()> {
        self.remove(&format!("/api/inventory/servers/{id}")).await
    }
}

#[async_trait]
impl ClusterApi for HttpControlPlane {
    async fn list_clusters(&self) -> Result<Vec<RemoteCluster>> {
        self.get_list("/api/server-clusters").await
    }

    async fn add_cluster(&self, payload: &ClusterPayload) -> Result<i64> {
        self.add("/api/server-clusters", payload).await
    }

    async fn update_cluster(&self, id: i64, payload: &ClusterUpdate) -> Result<()> {
        self.put(&format!("/api/server-clusters/{id}"), payload)
            .await
    }

    async fn delete_cluster(&self, id: i64) -> Result<()> {
        self.remove(&format!("/api/server-clusters/{id}")).await
    }
}

#[async_trait]
impl TemplateApi for HttpControlPlane {
    async fn list_templates(&self) -> Result<Vec<RemoteTemplate>> {
        self.get_list("/api/cluster-templates").await
    }

    async fn add_template(&self, payload: &TemplatePayload) -> Result<i64> {
        self.add("/api/cluster-templates", payload).await
    }

    async fn update_template(&self, id: i64, payload: &TemplatePayload) -> Result<()> {
        self.put(&format!("/api/cluster-templates/{id}"), payload)
            .await
    }

    async fn delete_template(&self, id: i64) -> Result<()> {
        self.remove(&format!("/api/cluster-templates/{id}")).await
    }
}

#[async_trait]
impl VpcApi for HttpControlPlane {
    async fn list_vpcs(&self) -> Result<Vec<RemoteVpc>> {
        self.get_list("/api/vpcs").await
    }

    async fn add_vpc(&self, payload: &VpcPayload) -> Result<i64> {
        self.add("/api/vpcs", payload).await
    }

    async fn update_vpc(&self, id: i64, payload: &VpcPayload) -> Result<()> {
        self.put(&format!("/api/vpcs/{id}"), payload).await
    }

    async fn delete_vpc(&self, id: i64) -> Result<()> {
        self.remove(&format!("/api/vpcs/{id}")).await
    }
}

#[async_trait]
impl RefApi for HttpControlPlane {
    async fn list_sites(&self) -> Result<Vec<RemoteSite>> {
        self.get_list("/api/sites").await
    }

    async fn list_tenants(&self) -> Result<Vec<RemoteTenant>> {
        self.get_list("/api/tenants").await
    }

    async fn list_profiles(&self) -> Result<Vec<RemoteProfile>> {
        self.get_list("/api/inventory/profiles").await
    }

    async fn list_ports(&self) -> Result<Vec<RemotePort>> {
        self.get_list("/api/ports").await
    }
}

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::client::check_status;
use crate::{Client, Index};

/// Information about the cluster behind a node, as returned by a ping.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterInfo {
    /// The name of the node that answered.
    pub name: String,
    /// The name of the cluster.
    pub cluster_name: String,
    /// Version information of the service.
    pub version: VersionInfo,
}

/// Version information of the service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionInfo {
    /// The version number, such as `7.17.0`.
    pub number: String,
}

/// Response of provisioning requests that need to be acknowledged by the cluster.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Acknowledged {
    /// Whether the cluster acknowledged the change.
    #[serde(default)]
    pub acknowledged: bool,
}

impl Client {
    /// Pings the service and returns basic information about the cluster.
    pub async fn ping(&self) -> crate::Result<ClusterInfo> {
        let url = self.endpoint(&[])?;
        let response = self.request(Method::GET, url).send().await?;
        let info = check_status(response).await?.json().await?;
        Ok(info)
    }

    /// Checks whether the given index exists.
    pub async fn index_exists(&self, index: &Index) -> crate::Result<bool> {
        let url = self.endpoint(&[index.name()])?;
        let response = self.request(Method::HEAD, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response).await?;
        Ok(true)
    }

    /// Creates the given index with default settings.
    pub async fn create_index(&self, index: &Index) -> crate::Result<Acknowledged> {
        tracing::debug!(index = index.name(), "creating index");
        let url = self.endpoint(&[index.name()])?;
        let response = self.request(Method::PUT, url).send().await?;
        let ack = check_status(response).await?.json().await?;
        Ok(ack)
    }

    /// Puts the given field mapping on the index.
    pub async fn put_mapping(
        &self,
        index: &Index,
        mapping: &serde_json::Value,
    ) -> crate::Result<Acknowledged> {
        tracing::debug!(index = index.name(), "updating mapping");
        let url = match index.doc_type() {
            Some(doc_type) => self.endpoint(&[index.name(), "_mapping", doc_type])?,
            None => self.endpoint(&[index.name(), "_mapping"])?,
        };
        let response = self.request(Method::PUT, url).json(mapping).send().await?;
        let ack = check_status(response).await?.json().await?;
        Ok(ack)
    }

    /// Flushes the index, waiting for an ongoing flush to finish first.
    pub async fn flush(&self, index: &Index) -> crate::Result<()> {
        let url = self.endpoint(&[index.name(), "_flush"])?;
        let response = self
            .request(Method::POST, url)
            .query(&[("wait_if_ongoing", "true")])
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

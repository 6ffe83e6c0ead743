//! Contains a remote implementation using HTTP to interact with the document service.

use anyhow::Result;
use docbench_client::{BulkResponse, Client, Index};

use crate::bench::SetupError;
use crate::record::{Document, Record};
use crate::record_log::Term;
use crate::remote::Remote;

/// A remote implementation using HTTP to interact with the document service.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    /// The client used to talk to the service.
    pub client: Client,
    /// The index all documents are written to and searched in.
    pub index: Index,
}

impl HttpRemote {
    /// Creates a new `HttpRemote` for the given client and index.
    pub fn new(client: Client, index: Index) -> Self {
        Self { client, index }
    }
}

#[async_trait::async_trait]
impl Remote for HttpRemote {
    async fn check(&self) -> Result<()> {
        let info = self.client.ping().await.map_err(SetupError::from)?;
        tracing::debug!(cluster = %info.cluster_name, "service is reachable");

        let exists = self
            .client
            .index_exists(&self.index)
            .await
            .map_err(SetupError::from)?;
        if !exists {
            return Err(SetupError::IndexMissing(self.index.name().to_owned()).into());
        }
        Ok(())
    }

    async fn create(&self, id: &str, record: &Record) -> Result<String> {
        Ok(self.client.create(&self.index, id, record).await?)
    }

    async fn bulk_create(&self, batch: &[Document]) -> Result<BulkResponse> {
        let batch: Vec<_> = batch
            .iter()
            .map(|document| (document.id.as_str(), document.record.as_ref()))
            .collect();
        Ok(self.client.bulk_create(&self.index, &batch).await?)
    }

    async fn count(&self, term: &Term) -> Result<u64> {
        Ok(self
            .client
            .count_term(&self.index, &term.field, &term.value)
            .await?)
    }

    async fn flush(&self) -> Result<()> {
        Ok(self.client.flush(&self.index).await?)
    }
}

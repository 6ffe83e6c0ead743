use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::client::check_status;
use crate::{Client, Index};

/// How long the service may wait for the primary shard before failing a write.
const WRITE_TIMEOUT: &str = "60s";

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(rename = "_id")]
    id: String,
}

impl Client {
    /// Creates a document under the given `id`, failing if the id is already taken.
    ///
    /// Returns the id assigned by the service.
    pub async fn create<D>(&self, index: &Index, id: &str, document: &D) -> crate::Result<String>
    where
        D: Serialize + ?Sized,
    {
        let url = match index.doc_type() {
            Some(doc_type) => self.endpoint(&[index.name(), doc_type, id, "_create"])?,
            None => self.endpoint(&[index.name(), "_create", id])?,
        };

        let response = self
            .request(Method::PUT, url)
            .query(&[("timeout", WRITE_TIMEOUT)])
            .json(document)
            .send()
            .await?;
        let created: CreateResponse = check_status(response).await?.json().await?;

        tracing::trace!(id = %created.id, "created document");
        Ok(created.id)
    }
}

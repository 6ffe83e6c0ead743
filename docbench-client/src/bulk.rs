use std::collections::BTreeMap;

use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::check_status;
use crate::{Client, Index};

/// The per-item report of a bulk request.
#[derive(Debug, Clone)]
pub struct BulkResponse {
    /// One entry per requested document, in request order.
    pub items: Vec<BulkItem>,
}

impl BulkResponse {
    /// Returns whether any of the items failed.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|item| !item.is_success())
    }

    /// The items that were written successfully.
    pub fn succeeded(&self) -> impl Iterator<Item = &BulkItem> {
        self.items.iter().filter(|item| item.is_success())
    }

    /// The items that could not be written.
    pub fn failed(&self) -> impl Iterator<Item = &BulkItem> {
        self.items.iter().filter(|item| !item.is_success())
    }
}

/// The outcome of a single document within a bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItem {
    /// The document id.
    pub id: String,
    /// The HTTP status the service assigned to this item.
    pub status: u16,
    /// The failure reason, if the item failed.
    pub error: Option<String>,
}

impl BulkItem {
    /// Returns `true` for items with a `2xx` status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Deserialize)]
struct RawBulkResponse {
    items: Vec<BTreeMap<String, RawBulkItem>>,
}

#[derive(Debug, Deserialize)]
struct RawBulkItem {
    #[serde(rename = "_id")]
    id: String,
    status: u16,
    error: Option<RawBulkError>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBulkError {
    Detailed {
        #[serde(rename = "type")]
        kind: String,
        reason: Option<String>,
    },
    Plain(String),
}

impl From<RawBulkError> for String {
    fn from(error: RawBulkError) -> Self {
        match error {
            RawBulkError::Detailed {
                reason: Some(reason),
                ..
            } => reason,
            RawBulkError::Detailed { kind, .. } => kind,
            RawBulkError::Plain(message) => message,
        }
    }
}

impl Client {
    /// Creates all documents of `batch` with a single `_bulk` request.
    ///
    /// The request as a whole only fails if the service rejects it outright. Failures of individual
    /// documents, such as conflicting ids, are reported per item in the [`BulkResponse`].
    pub async fn bulk_create<I, D>(
        &self,
        index: &Index,
        batch: &[(I, D)],
    ) -> crate::Result<BulkResponse>
    where
        I: AsRef<str>,
        D: Serialize,
    {
        let mut body = Vec::new();
        for (id, document) in batch {
            let mut action = json!({ "_index": index.name(), "_id": id.as_ref() });
            if let Some(doc_type) = index.doc_type() {
                action["_type"] = doc_type.into();
            }

            serde_json::to_writer(&mut body, &json!({ "create": action }))?;
            body.push(b'\n');
            serde_json::to_writer(&mut body, document)?;
            body.push(b'\n');
        }

        tracing::debug!(index = index.name(), documents = batch.len(), "sending bulk request");

        let url = self.endpoint(&["_bulk"])?;
        let response = self
            .request(Method::POST, url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        let raw: RawBulkResponse = check_status(response).await?.json().await?;

        // Every item is keyed by its action, which is always `create` here.
        let items = raw
            .items
            .into_iter()
            .filter_map(|item| item.into_values().next())
            .map(|item| BulkItem {
                id: item.id,
                status: item.status,
                error: item.error.map(String::from),
            })
            .collect();

        Ok(BulkResponse { items })
    }
}

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use crate::client::check_status;
use crate::{Client, Index};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    total: Total,
}

/// Older servers report a plain number, newer ones an object with a relation.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Total {
    Count(u64),
    Object { value: u64 },
}

impl Client {
    /// Counts the documents whose `field` exactly matches `value`.
    pub async fn count_term(&self, index: &Index, field: &str, value: &str) -> crate::Result<u64> {
        let url = match index.doc_type() {
            Some(doc_type) => self.endpoint(&[index.name(), doc_type, "_search"])?,
            None => self.endpoint(&[index.name(), "_search"])?,
        };

        let body = json!({
            "size": 0,
            "query": { "term": { field: value } },
        });
        let response = self.request(Method::POST, url).json(&body).send().await?;
        let search: SearchResponse = check_status(response).await?.json().await?;

        let hits = match search.hits.total {
            Total::Count(count) => count,
            Total::Object { value } => value,
        };
        Ok(hits)
    }
}

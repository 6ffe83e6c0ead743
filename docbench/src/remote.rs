//! The seam between the benchmark engine and the document service.

use std::fmt;

use anyhow::Result;
use docbench_client::BulkResponse;

use crate::record::{Document, Record};
use crate::record_log::Term;

/// A document service that work items are executed against.
///
/// All operations must be safe to call concurrently from many workers on one shared instance.
#[async_trait::async_trait]
pub trait Remote: fmt::Debug + Send + Sync + 'static {
    /// Verifies that the service is reachable and ready before any work is started.
    async fn check(&self) -> Result<()> {
        Ok(())
    }

    /// Creates a single document under the given id, returning the id assigned by the service.
    async fn create(&self, id: &str, record: &Record) -> Result<String>;

    /// Creates a batch of documents with one request, reporting the outcome per document.
    async fn bulk_create(&self, batch: &[Document]) -> Result<BulkResponse>;

    /// Counts the documents matching the term exactly.
    async fn count(&self, term: &Term) -> Result<u64>;

    /// Makes all created documents durable and visible to searches.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

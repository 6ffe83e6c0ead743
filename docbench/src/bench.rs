//! The benchmark commands: provisioning the index, creating documents and searching for them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use docbench_client::{Client, ClusterInfo, Index};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value, json};

use crate::config::Config;
use crate::engine::{Engine, Run, WorkItem};
use crate::record::{Document, FIELD_COUNT, Record, RecordGenerator, field_name};
use crate::record_log::{RecordLog, RecordSampler};
use crate::remote::Remote;
use crate::report::Report;

/// Errors that abort provisioning before any benchmark runs.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// The service could not be reached or rejected a request.
    #[error(transparent)]
    Client(#[from] docbench_client::Error),
    /// The service did not acknowledge the creation of the index.
    #[error("creation of index `{0}` was not acknowledged")]
    IndexNotAcknowledged(String),
    /// The service did not acknowledge the mapping.
    #[error("mapping of index `{0}` was not acknowledged")]
    MappingNotAcknowledged(String),
    /// The index has not been provisioned.
    #[error("index `{0}` does not exist, run `docbench setup` first")]
    IndexMissing(String),
}

/// Builds the client and the target index from the configuration.
pub fn connect(config: &Config) -> Result<(Client, Index)> {
    let client = Client::builder(config.url.as_str())
        .timeout(config.timeout)
        .build()
        .context("failed to build client")?;

    let index = match &config.doc_type {
        Some(doc_type) => Index::new(&config.index).with_type(doc_type),
        None => Index::new(&config.index),
    };

    Ok((client, index))
}

/// The mapping of all record fields as exact-match keywords.
pub fn mapping() -> Value {
    let properties: Map<String, Value> = (0..FIELD_COUNT)
        .map(|index| (field_name(index), json!({ "type": "keyword" })))
        .collect();
    json!({ "properties": properties })
}

/// Pings the service, creates the index if it is missing and puts the record mapping.
pub async fn setup(client: &Client, index: &Index) -> Result<ClusterInfo, SetupError> {
    let info = client.ping().await?;
    tracing::info!(
        name = %info.name,
        cluster = %info.cluster_name,
        version = %info.version.number,
        "connected"
    );

    if !client.index_exists(index).await? {
        tracing::info!(index = index.name(), "creating index");
        if !client.create_index(index).await?.acknowledged {
            return Err(SetupError::IndexNotAcknowledged(index.name().to_owned()));
        }
    }

    if !client.put_mapping(index, &mapping()).await?.acknowledged {
        return Err(SetupError::MappingNotAcknowledged(index.name().to_owned()));
    }

    Ok(info)
}

fn progress_bar(config: &Config, message: &'static str) -> Result<ProgressBar> {
    if !config.progress {
        return Ok(ProgressBar::hidden());
    }

    let bar = ProgressBar::new(0)
        .with_message(message)
        .with_style(ProgressStyle::with_template(
            "{msg}\n{wide_bar} {pos}/{len} {elapsed}",
        )?);
    bar.enable_steady_tick(Duration::from_millis(100));
    Ok(bar)
}

fn engine(config: &Config, remote: Arc<dyn Remote>, message: &'static str) -> Result<Engine> {
    Ok(Engine::new(remote, config.concurrency)
        .distribution(config.distribution)
        .progress(progress_bar(config, message)?))
}

fn log_failures(failures: &[String]) {
    for message in failures {
        tracing::error!(error = %message, "request failed");
    }
}

/// Creates `count` fresh documents and appends every confirmed one to the record log.
///
/// Fails before creating anything if the service cannot be reached.
pub async fn create(config: &Config, remote: Arc<dyn Remote>) -> Result<Report> {
    remote.check().await.context("document service is not ready")?;

    let mut log = RecordLog::open_append(&config.record_log).with_context(|| {
        format!("failed to open record log {}", config.record_log.display())
    })?;

    let mut generator = RecordGenerator::new();
    let documents: Vec<_> = (0..config.count)
        .map(|_| Document::generate(&mut generator))
        .collect();
    let mut records: HashMap<String, Arc<Record>> = documents
        .iter()
        .map(|document| (document.id.clone(), Arc::clone(&document.record)))
        .collect();

    let items: Vec<_> = match config.bulk_size {
        Some(size) => documents
            .chunks(size)
            .map(|batch| WorkItem::BulkCreate(batch.to_vec()))
            .collect(),
        None => documents.into_iter().map(WorkItem::Create).collect(),
    };

    let engine = engine(config, Arc::clone(&remote), "Creating documents")?;
    let Run {
        collected,
        elapsed,
        latency,
    } = engine.run(items).await?;

    for id in &collected.successes {
        match records.remove(id) {
            Some(record) => log.append(&record)?,
            None => tracing::warn!(%id, "service confirmed an unknown document"),
        }
    }
    log.flush()?;
    tracing::info!(
        written = collected.succeeded(),
        path = %log.path().display(),
        "appended records to log"
    );

    remote.flush().await.context("failed to flush index")?;
    log_failures(&collected.failures);

    Ok(Report::new(&collected, elapsed, latency))
}

/// Runs `count` term searches sampled from the record log.
///
/// Every search is expected to hit exactly one document. Deviating hit counts are logged. Fails
/// before searching if the service cannot be reached.
pub async fn search(config: &Config, remote: Arc<dyn Remote>) -> Result<Report> {
    remote.check().await.context("document service is not ready")?;

    let mut sampler = RecordSampler::open(&config.record_log).with_context(|| {
        format!("failed to sample record log {}", config.record_log.display())
    })?;

    let items = (0..config.count)
        .map(|_| sampler.sample().map(WorkItem::Search))
        .collect::<Result<Vec<_>, _>>()?;

    let engine = engine(config, remote, "Searching documents")?;
    let Run {
        collected,
        elapsed,
        latency,
    } = engine.run(items).await?;

    let unexpected = unexpected_hits(&collected.successes);
    if unexpected > 0 {
        tracing::warn!(unexpected, "searches did not hit exactly one document");
    }
    log_failures(&collected.failures);

    Ok(Report::new(&collected, elapsed, latency))
}

/// Logs every hit count that is not exactly one and returns how many there were.
fn unexpected_hits(hits: &[String]) -> usize {
    hits.iter()
        .filter(|hits| hits.as_str() != "1")
        .inspect(|hits| tracing::warn!("expected one hit, but got {hits}"))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_all_fields_as_keywords() {
        let mapping = mapping();
        let properties = mapping["properties"].as_object().unwrap();
        assert_eq!(properties.len(), FIELD_COUNT);
        assert_eq!(properties["data0"], json!({ "type": "keyword" }));
        assert_eq!(properties["data19"], json!({ "type": "keyword" }));
    }

    #[test]
    fn counts_unexpected_hits() {
        let hits = ["1", "0", "1", "2"].map(String::from);
        assert_eq!(unexpected_hits(&hits), 2);
        assert_eq!(unexpected_hits(&[]), 0);
    }

    #[test]
    fn connects_with_optional_type() {
        let config = Config {
            doc_type: Some("doc".into()),
            ..Default::default()
        };
        let (client, index) = connect(&config).unwrap();
        assert_eq!(client.service_url().as_str(), "http://localhost:9200/");
        assert_eq!(index.name(), "docbench");
        assert_eq!(index.doc_type(), Some("doc"));
    }
}

//! The bounded-concurrency fan-out/fan-in execution engine.
//!
//! An [`Engine`] runs a fixed population of [`WorkItem`]s on a pool of workers and collects one
//! [`Outcome`] per document:
//!
//! - Every worker owns an output channel for successes and an error channel for failures. It
//!   executes one item at a time and closes both channels when it runs out of work.
//! - Work reaches the workers either through a dispatcher, which deals items round-robin into one
//!   bounded input channel per worker ([`Distribution::RoundRobin`]), or by having the workers
//!   claim item indices from a shared atomic cursor ([`Distribution::SharedCursor`]).
//! - The multiplexer waits on all output and error channels at once and finishes exactly when every
//!   one of them has been closed.
//!
//! Remote failures never abort a run. They are collected as [`Outcome::Failure`]s and reported
//! along with the successes.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use docbench_client::{BulkItem, BulkResponse};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use sketches_ddsketch::DDSketch;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::record::Document;
use crate::record_log::Term;
use crate::remote::Remote;

mod cursor;
mod dispatch;
mod multiplex;
mod worker;

pub use self::cursor::SharedCursor;
pub use self::dispatch::{dispatch, input_capacity};
pub use self::multiplex::{Collected, Multiplexer};
pub use self::worker::{Worker, WorkerStats};

/// One self-contained unit of work, prepared before the run starts.
#[derive(Debug, Clone)]
pub enum WorkItem {
    /// Create a single document.
    Create(Document),
    /// Create a batch of documents with one bulk request.
    BulkCreate(Vec<Document>),
    /// Count the documents matching a term.
    Search(Term),
}

impl WorkItem {
    /// The number of outcomes this item produces, which is the number of documents it covers.
    pub fn weight(&self) -> usize {
        match self {
            WorkItem::Create(_) | WorkItem::Search(_) => 1,
            WorkItem::BulkCreate(batch) => batch.len(),
        }
    }

    /// Executes the item against the remote, yielding one outcome per document.
    ///
    /// On success, creates yield the assigned id and searches the hit count.
    pub async fn execute(&self, remote: &dyn Remote) -> Vec<Outcome> {
        match self {
            WorkItem::Create(document) => {
                let outcome = match remote.create(&document.id, &document.record).await {
                    Ok(id) => Outcome::Success(id),
                    Err(err) => Outcome::Failure(format!("{err:#}")),
                };
                vec![outcome]
            }
            WorkItem::BulkCreate(batch) => match remote.bulk_create(batch).await {
                Ok(response) => bulk_outcomes(batch, response),
                // A rejected request fails every document it carried.
                Err(err) => {
                    let message = format!("{err:#}");
                    batch
                        .iter()
                        .map(|_| Outcome::Failure(message.clone()))
                        .collect()
                }
            },
            WorkItem::Search(term) => {
                let outcome = match remote.count(term).await {
                    Ok(hits) => Outcome::Success(hits.to_string()),
                    Err(err) => Outcome::Failure(format!("{err:#}")),
                };
                vec![outcome]
            }
        }
    }
}

/// Pairs the items of a bulk response with the documents of the batch, in batch order.
///
/// Documents the response does not report on fail. Items for ids outside the batch are dropped.
fn bulk_outcomes(batch: &[Document], response: BulkResponse) -> Vec<Outcome> {
    let mut items: HashMap<String, BulkItem> = response
        .items
        .into_iter()
        .map(|item| (item.id.clone(), item))
        .collect();

    let outcomes = batch
        .iter()
        .map(|document| match items.remove(&document.id) {
            Some(item) => match (item.is_success(), item.error) {
                (true, _) => Outcome::Success(item.id),
                (false, Some(error)) => Outcome::Failure(format!("{}: {error}", item.id)),
                (false, None) => Outcome::Failure(format!("{}: status {}", item.id, item.status)),
            },
            None => Outcome::Failure(format!("{}: missing from bulk response", document.id)),
        })
        .collect();

    for id in items.keys() {
        tracing::warn!(%id, "bulk response reported a document outside the batch");
    }
    outcomes
}

/// The result of executing one document's worth of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The remote call succeeded, carrying the assigned id or the hit count.
    Success(String),
    /// The remote call failed, carrying the stringified error.
    Failure(String),
}

/// How work items are distributed to workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    /// A dispatcher deals item `i` to worker `i mod C` through bounded per-worker channels.
    #[default]
    RoundRobin,
    /// Workers claim item indices from a shared atomic cursor.
    SharedCursor,
}

impl FromStr for Distribution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" => Ok(Self::RoundRobin),
            "shared_cursor" => Ok(Self::SharedCursor),
            other => Err(format!(
                "unknown distribution `{other}`, expected `round_robin` or `shared_cursor`"
            )),
        }
    }
}

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine was configured without workers.
    #[error("concurrency must be greater than 0")]
    NoWorkers,
    /// A worker task panicked, which indicates a defect rather than a remote failure.
    #[error("worker task failed: {0}")]
    Worker(#[from] JoinError),
    /// Fewer outcomes arrived than documents were dispatched.
    #[error("expected {expected} outcomes, but collected {collected}")]
    MissingOutcomes {
        /// The number of documents dispatched.
        expected: usize,
        /// The number of outcomes collected.
        collected: usize,
    },
}

/// The aggregated result of one engine run.
pub struct Run {
    /// The successes and failures in arrival order.
    pub collected: Collected,
    /// Wall-clock time from the first dispatch until the last channel closed.
    pub elapsed: Duration,
    /// Latency of the individual remote calls, in seconds, merged across workers.
    pub latency: DDSketch,
}

impl fmt::Debug for Run {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Run")
            .field("collected", &self.collected)
            .field("elapsed", &self.elapsed)
            .field("latency_count", &self.latency.count())
            .finish()
    }
}

/// Runs work items on a fixed pool of concurrent workers.
#[derive(Debug)]
pub struct Engine {
    remote: Arc<dyn Remote>,
    concurrency: usize,
    distribution: Distribution,
    progress: ProgressBar,
}

impl Engine {
    /// Creates an engine with the given number of workers and round-robin distribution.
    pub fn new(remote: Arc<dyn Remote>, concurrency: usize) -> Self {
        Self {
            remote,
            concurrency,
            distribution: Distribution::default(),
            progress: ProgressBar::hidden(),
        }
    }

    /// Selects how items are handed to workers.
    pub fn distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    /// Advances the given progress bar once per collected outcome.
    pub fn progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Executes all items and waits until every outcome has been collected.
    ///
    /// Remote failures are part of the returned [`Run`]. An error is only returned if the engine
    /// itself cannot account for every document.
    pub async fn run(&self, items: Vec<WorkItem>) -> Result<Run, EngineError> {
        if self.concurrency == 0 {
            return Err(EngineError::NoWorkers);
        }

        let expected: usize = items.iter().map(WorkItem::weight).sum();
        self.progress.set_length(expected as u64);

        tracing::info!(
            items = items.len(),
            documents = expected,
            concurrency = self.concurrency,
            distribution = ?self.distribution,
            "starting run"
        );

        let mut multiplexer = Multiplexer::new().progress(self.progress.clone());
        let mut workers = Vec::with_capacity(self.concurrency);
        for id in 0..self.concurrency {
            let (outputs_tx, outputs_rx) = mpsc::channel(self.concurrency);
            let (errors_tx, errors_rx) = mpsc::channel(self.concurrency);
            multiplexer.add_worker(id, outputs_rx, errors_rx);
            workers.push(Worker::new(id, Arc::clone(&self.remote), outputs_tx, errors_tx));
        }

        let start = Instant::now();
        let (collected, handles) = match self.distribution {
            Distribution::RoundRobin => {
                let capacity = input_capacity(items.len(), self.concurrency);
                let (inputs, handles): (Vec<_>, Vec<_>) = workers
                    .into_iter()
                    .map(|worker| {
                        let (input_tx, input_rx) = mpsc::channel(capacity);
                        (input_tx, tokio::spawn(worker.run(input_rx)))
                    })
                    .unzip();

                let ((), collected) = tokio::join!(dispatch(items, inputs), multiplexer.collect());
                (collected, handles)
            }
            Distribution::SharedCursor => {
                let items: Arc<[WorkItem]> = items.into();
                let cursor = Arc::new(SharedCursor::new(items.len()));
                let handles: Vec<_> = workers
                    .into_iter()
                    .map(|worker| {
                        let items = Arc::clone(&items);
                        let cursor = Arc::clone(&cursor);
                        tokio::spawn(worker.run_claiming(items, cursor))
                    })
                    .collect();

                (multiplexer.collect().await, handles)
            }
        };
        let elapsed = start.elapsed();

        let latency = merge_worker_stats(handles).await?;

        if collected.len() != expected {
            return Err(EngineError::MissingOutcomes {
                expected,
                collected: collected.len(),
            });
        }

        tracing::info!(
            succeeded = collected.succeeded(),
            failed = collected.failed(),
            elapsed = ?elapsed,
            "run finished"
        );

        Ok(Run {
            collected,
            elapsed,
            latency,
        })
    }
}

async fn merge_worker_stats(
    handles: Vec<JoinHandle<WorkerStats>>,
) -> Result<DDSketch, EngineError> {
    let mut latency = DDSketch::default();
    for handle in handles {
        let stats = handle.await?;
        tracing::debug!(worker = stats.id, executed = stats.executed, "worker finished");
        // Sketches created with the same default config always merge.
        latency.merge(&stats.latency).ok();
    }
    Ok(latency)
}

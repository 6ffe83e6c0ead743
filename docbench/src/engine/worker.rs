use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use sketches_ddsketch::DDSketch;
use tokio::sync::mpsc;

use super::{Outcome, SharedCursor, WorkItem};
use crate::remote::Remote;

/// What a worker reports back once it has run out of work.
pub struct WorkerStats {
    /// The worker's index within the pool.
    pub id: usize,
    /// The number of items the worker executed.
    pub executed: usize,
    /// Latency of each remote call, in seconds.
    pub latency: DDSketch,
}

impl fmt::Debug for WorkerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerStats")
            .field("id", &self.id)
            .field("executed", &self.executed)
            .field("latency_count", &self.latency.count())
            .finish()
    }
}

/// A single worker of the pool.
///
/// Executes at most one item at a time and routes each outcome to its output or error channel.
/// Both channels are closed when the worker is dropped at the end of its run.
#[derive(Debug)]
pub struct Worker {
    id: usize,
    remote: Arc<dyn Remote>,
    outputs: mpsc::Sender<String>,
    errors: mpsc::Sender<String>,
    stats: WorkerStats,
}

impl Worker {
    /// Creates a worker sending successes to `outputs` and failures to `errors`.
    pub fn new(
        id: usize,
        remote: Arc<dyn Remote>,
        outputs: mpsc::Sender<String>,
        errors: mpsc::Sender<String>,
    ) -> Self {
        Self {
            id,
            remote,
            outputs,
            errors,
            stats: WorkerStats {
                id,
                executed: 0,
                latency: DDSketch::default(),
            },
        }
    }

    /// Executes items from the input channel until it is closed and drained.
    pub async fn run(mut self, mut input: mpsc::Receiver<WorkItem>) -> WorkerStats {
        while let Some(item) = input.recv().await {
            self.execute(&item).await;
        }
        self.finish()
    }

    /// Claims and executes items from the shared list until the cursor is exhausted.
    pub async fn run_claiming(
        mut self,
        items: Arc<[WorkItem]>,
        cursor: Arc<SharedCursor>,
    ) -> WorkerStats {
        while let Some(index) = cursor.claim() {
            self.execute(&items[index]).await;
        }
        self.finish()
    }

    async fn execute(&mut self, item: &WorkItem) {
        let start = Instant::now();
        let outcomes = item.execute(self.remote.as_ref()).await;
        self.stats.latency.add(start.elapsed().as_secs_f64());
        self.stats.executed += 1;

        for outcome in outcomes {
            let sent = match outcome {
                Outcome::Success(value) => {
                    tracing::trace!(worker = self.id, %value, "success");
                    self.outputs.send(value).await
                }
                Outcome::Failure(message) => {
                    tracing::debug!(worker = self.id, error = %message, "failure");
                    self.errors.send(message).await
                }
            };
            if sent.is_err() {
                tracing::error!(worker = self.id, "outcome receiver dropped");
            }
        }
    }

    fn finish(self) -> WorkerStats {
        tracing::debug!(worker = self.id, executed = self.stats.executed, "worker done");
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{Result, bail};
    use docbench_client::BulkResponse;

    use crate::record::{Document, Record};
    use crate::record_log::Term;

    use super::*;

    #[derive(Debug)]
    struct EvenRemote;

    #[async_trait::async_trait]
    impl Remote for EvenRemote {
        async fn create(&self, _id: &str, _record: &Record) -> Result<String> {
            unimplemented!()
        }

        async fn bulk_create(&self, _batch: &[Document]) -> Result<BulkResponse> {
            unimplemented!()
        }

        async fn count(&self, term: &Term) -> Result<u64> {
            let value: u64 = term.value.parse()?;
            if value % 2 == 1 {
                bail!("odd {value}");
            }
            Ok(value)
        }
    }

    fn search(value: usize) -> WorkItem {
        WorkItem::Search(Term {
            field: "data0".into(),
            value: value.to_string(),
        })
    }

    #[tokio::test]
    async fn routes_outcomes_and_closes_channels() {
        let (outputs_tx, mut outputs_rx) = mpsc::channel(8);
        let (errors_tx, mut errors_rx) = mpsc::channel(8);
        let (input_tx, input_rx) = mpsc::channel(8);

        for value in 0..5 {
            input_tx.send(search(value)).await.unwrap();
        }
        drop(input_tx);

        let worker = Worker::new(0, Arc::new(EvenRemote), outputs_tx, errors_tx);
        let stats = worker.run(input_rx).await;
        assert_eq!(stats.executed, 5);
        assert_eq!(stats.latency.count(), 5);

        let mut outputs = Vec::new();
        while let Some(value) = outputs_rx.recv().await {
            outputs.push(value);
        }
        let mut errors = Vec::new();
        while let Some(message) = errors_rx.recv().await {
            errors.push(message);
        }

        assert_eq!(outputs, ["0", "2", "4"]);
        assert_eq!(errors, ["odd 1", "odd 3"]);
    }

    #[tokio::test]
    async fn claims_until_exhausted() {
        let (outputs_tx, mut outputs_rx) = mpsc::channel(8);
        let (errors_tx, errors_rx) = mpsc::channel(8);
        drop(errors_rx);

        let items: Arc<[WorkItem]> = vec![search(0), search(2)].into();
        let cursor = Arc::new(SharedCursor::new(items.len()));

        let worker = Worker::new(1, Arc::new(EvenRemote), outputs_tx, errors_tx);
        let stats = worker.run_claiming(items, cursor.clone()).await;

        assert_eq!(stats.id, 1);
        assert_eq!(stats.executed, 2);
        assert_eq!(cursor.claim(), None);
        assert_eq!(outputs_rx.recv().await.as_deref(), Some("0"));
        assert_eq!(outputs_rx.recv().await.as_deref(), Some("2"));
        assert_eq!(outputs_rx.recv().await, None);
    }
}

use indicatif::ProgressBar;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::StreamMap;
use tokio_stream::wrappers::ReceiverStream;

/// Which kind of channel a value arrived on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Kind {
    Output,
    Error,
}

/// Identifies one channel of one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Source {
    kind: Kind,
    worker: usize,
}

/// The outcomes collected from all workers, in arrival order.
#[derive(Debug, Default)]
pub struct Collected {
    /// Values received on output channels.
    pub successes: Vec<String>,
    /// Messages received on error channels.
    pub failures: Vec<String>,
}

impl Collected {
    /// The number of successful outcomes.
    pub fn succeeded(&self) -> usize {
        self.successes.len()
    }

    /// The number of failed outcomes.
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// The total number of outcomes.
    pub fn len(&self) -> usize {
        self.succeeded() + self.failed()
    }

    /// Returns `true` if nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Waits on the output and error channels of all workers at once.
///
/// Every channel is tagged with its kind, so a value is classified by where it came from. Closed
/// channels leave the wait set and collection ends when the set is empty.
#[derive(Debug)]
pub struct Multiplexer {
    channels: StreamMap<Source, ReceiverStream<String>>,
    progress: ProgressBar,
}

impl Multiplexer {
    /// Creates a multiplexer without any channels.
    pub fn new() -> Self {
        Self {
            channels: StreamMap::new(),
            progress: ProgressBar::hidden(),
        }
    }

    /// Advances the given progress bar once per received value.
    pub fn progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Adds the output and error channel of a worker to the wait set.
    pub fn add_worker(
        &mut self,
        worker: usize,
        outputs: mpsc::Receiver<String>,
        errors: mpsc::Receiver<String>,
    ) {
        let output = Source {
            kind: Kind::Output,
            worker,
        };
        let error = Source {
            kind: Kind::Error,
            worker,
        };
        self.channels.insert(output, ReceiverStream::new(outputs));
        self.channels.insert(error, ReceiverStream::new(errors));
    }

    /// The number of channels that have not been closed yet.
    pub fn open_channels(&self) -> usize {
        self.channels.len()
    }

    /// Receives values until every channel has been closed.
    pub async fn collect(mut self) -> Collected {
        let mut collected = Collected::default();

        while let Some((source, value)) = self.channels.next().await {
            match source.kind {
                Kind::Output => collected.successes.push(value),
                Kind::Error => collected.failures.push(value),
            }
            self.progress.inc(1);
        }

        self.progress.finish_and_clear();
        collected
    }
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new()
    }
}

use tokio::sync::mpsc;

use super::WorkItem;

/// The capacity of each worker's input channel: `ceil(total / concurrency)`, at least 1.
///
/// With this capacity the dispatcher can hand out every item without waiting for a worker.
pub fn input_capacity(total: usize, concurrency: usize) -> usize {
    total.div_ceil(concurrency.max(1)).max(1)
}

/// Deals items round-robin into the worker inputs: item `i` goes to worker `i mod C`.
///
/// All inputs are closed once every item has been sent. Sending only fails if a worker has already
/// terminated, in which case its remaining items are dropped and show up as missing outcomes.
pub async fn dispatch(items: Vec<WorkItem>, inputs: Vec<mpsc::Sender<WorkItem>>) {
    if inputs.is_empty() {
        return;
    }

    for (index, item) in items.into_iter().enumerate() {
        let worker = index % inputs.len();
        if inputs[worker].send(item).await.is_err() {
            tracing::error!(worker, "worker input closed before dispatch finished");
        }
    }

    tracing::debug!(workers = inputs.len(), "dispatch finished");
    drop(inputs);
}

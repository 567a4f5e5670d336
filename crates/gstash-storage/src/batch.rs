//! Bounded concurrent execution of batch operations.
//!
//! Items run as futures multiplexed on the calling task, at most `width` at a
//! time. Completion order is unspecified.

use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use crate::error::{BatchFailure, StorageError, StorageResult};
use crate::metrics::record_batch;
use crate::options::BatchPolicy;

/// Run labelled tasks with bounded concurrency under `policy`.
///
/// With [`BatchPolicy::FailFast`] the first error is returned and the
/// remaining in-flight tasks are dropped. With [`BatchPolicy::CollectAll`]
/// every task runs and failures come back as [`StorageError::Batch`].
pub async fn run_batch<T, Fut>(
    operation: &'static str,
    tasks: Vec<(String, Fut)>,
    width: usize,
    policy: BatchPolicy,
) -> StorageResult<Vec<T>>
where
    Fut: Future<Output = StorageResult<T>>,
{
    let total = tasks.len();
    let width = width.max(1);
    debug!(operation, total, width, ?policy, "Running batch");

    match policy {
        BatchPolicy::FailFast => {
            let result = stream::iter(tasks.into_iter().map(|(_, fut)| Ok::<_, StorageError>(fut)))
                .try_buffer_unordered(width)
                .try_collect::<Vec<T>>()
                .await;

            match &result {
                Ok(done) => record_batch(operation, done.len(), 0),
                Err(e) => {
                    warn!(operation, "Batch aborted on first failure: {}", e);
                    record_batch(operation, 0, 1);
                }
            }
            result
        }
        BatchPolicy::CollectAll => {
            let outcomes: Vec<(String, StorageResult<T>)> = stream::iter(
                tasks
                    .into_iter()
                    .map(|(label, fut)| async move { (label, fut.await) }),
            )
            .buffer_unordered(width)
            .collect()
            .await;

            let mut succeeded = Vec::with_capacity(total);
            let mut failures = Vec::new();
            for (item, outcome) in outcomes {
                match outcome {
                    Ok(value) => succeeded.push(value),
                    Err(error) => failures.push(BatchFailure { item, error }),
                }
            }

            record_batch(operation, succeeded.len(), failures.len());

            if failures.is_empty() {
                Ok(succeeded)
            } else {
                warn!(
                    operation,
                    failed = failures.len(),
                    total,
                    "Batch finished with failures"
                );
                Err(StorageError::Batch {
                    succeeded: succeeded.len(),
                    failures,
                })
            }
        }
    }
}

//! Retry coordinator of the concurrent pipeline.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::core::{ChunkLedger, ChunkState};
use crate::data::{ChunkResult, ChunkTask};
use crate::effects::pool::deliver;

/// Queues and bookkeeping owned by the coordinator loop.
pub(crate) struct Coordinator {
    pub size:      u64,
    pub max_retry: u32,
    pub ledger:    ChunkLedger,
    pub tasks:     mpsc::Sender<ChunkTask>,
    pub results:   mpsc::Receiver<ChunkResult>,
    pub out:       mpsc::Sender<ChunkResult>,
}

impl Coordinator {
    /// Drive the pipeline until every byte was forwarded, a range ran out of
    /// retries, or `cancel` fired. Cancels `cancel` on exit so that the
    /// emitter and the workers stop with it.
    pub async fn run(mut self, cancel: CancellationToken) {
        debug!(size = self.size, "[pool reporter] start");
        let mut received = 0_u64;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(received, "[pool reporter] cancelled");
                    break;
                }
                result = self.results.recv() => match result {
                    Some(result) => result,
                    None => {
                        warn!(received, size = self.size, "[pool reporter] all workers exited early");
                        break;
                    }
                },
            };

            if result.is_success() {
                received += result.range_len();
                self.ledger.record_success(result.end);
                if !deliver(&self.out, &cancel, result).await {
                    break;
                }
                if received >= self.size {
                    debug!(received, "[pool reporter] all chunks delivered");
                    break;
                }
                continue;
            }

            match self
                .ledger
                .record_failure(result.end, result.retry, self.max_retry)
            {
                ChunkState::Pending { retry } => {
                    debug!(
                        start = result.start,
                        end = result.end,
                        retry,
                        error = ?result.error(),
                        "[pool reporter] retry"
                    );
                    let task = ChunkTask {
                        start: result.start,
                        end: result.end,
                        retry,
                    };
                    self.ledger.dispatch(result.end);
                    if !deliver(&self.tasks, &cancel, task).await {
                        break;
                    }
                }
                _ => {
                    error!(
                        start = result.start,
                        end = result.end,
                        retry = result.retry,
                        error = ?result.error(),
                        "[pool reporter] max retry exceeded"
                    );
                    deliver(&self.out, &cancel, result).await;
                    break;
                }
            }
        }

        debug!(remaining = self.ledger.remaining(), "[pool reporter] exit");
        cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::error::FetchError;

    struct Harness {
        tasks:   mpsc::Receiver<ChunkTask>,
        results: mpsc::Sender<ChunkResult>,
        out:     mpsc::Receiver<ChunkResult>,
        cancel:  CancellationToken,
        handle:  tokio::task::JoinHandle<()>,
    }

    fn start(size: u64, plan: &[ChunkTask], max_retry: u32) -> Harness {
        let (task_tx, task_rx) = mpsc::channel(8);
        let (result_tx, result_rx) = mpsc::channel(8);
        let (out_tx, out_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let coordinator = Coordinator {
            size,
            max_retry,
            ledger: ChunkLedger::from_plan(plan),
            tasks: task_tx,
            results: result_rx,
            out: out_tx,
        };
        let handle = tokio::spawn(coordinator.run(cancel.clone()));
        Harness {
            tasks: task_rx,
            results: result_tx,
            out: out_rx,
            cancel,
            handle,
        }
    }

    #[tokio::test]
    async fn test_finishes_when_all_bytes_arrive() {
        let plan = [ChunkTask::new(0, 3), ChunkTask::new(4, 7)];
        let mut h = start(8, &plan, 2);

        h.results
            .send(ChunkResult::success(4, Bytes::from_static(b"efgh"), 0))
            .await
            .unwrap();
        h.results
            .send(ChunkResult::success(0, Bytes::from_static(b"abcd"), 0))
            .await
            .unwrap();

        h.handle.await.unwrap();
        assert_eq!(h.out.recv().await.unwrap().start, 4);
        assert_eq!(h.out.recv().await.unwrap().start, 0);
        assert!(h.out.recv().await.is_none());
        assert!(h.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_failure_is_requeued_with_next_retry() {
        let plan = [ChunkTask::new(0, 9)];
        let mut h = start(10, &plan, 2);

        h.results
            .send(ChunkResult::failure(4, 9, 0, FetchError::Timeout))
            .await
            .unwrap();

        let task = h.tasks.recv().await.unwrap();
        assert_eq!(task, ChunkTask {
            start: 4,
            end:   9,
            retry: 1,
        });
        h.cancel.cancel();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_exhausted_retry_aborts() {
        let plan = [ChunkTask::new(0, 9)];
        let mut h = start(10, &plan, 1);

        h.results
            .send(ChunkResult::failure(0, 9, 1, FetchError::Timeout))
            .await
            .unwrap();

        h.handle.await.unwrap();
        let last = h.out.recv().await.unwrap();
        assert!(matches!(last.error(), Some(FetchError::Timeout)));
        assert_eq!(last.retry, 1);
        assert!(h.out.recv().await.is_none());
        assert!(h.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_closed_result_queue_ends_loop() {
        let h = start(10, &[ChunkTask::new(0, 9)], 1);
        drop(h.results);
        h.handle.await.unwrap();
        assert!(h.cancel.is_cancelled());
    }
}

//! Chunk emitter and range workers.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures_util::{FutureExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::core::{backoff_delay, check_ranged_status};
use crate::data::{ChunkResult, ChunkTask, FetchConfig, Request};
use crate::effects::http::HttpClient;
use crate::error::FetchError;

/// Everything a worker needs to turn a task into ranged requests.
pub(crate) struct WorkerContext<C> {
    pub client:   Arc<C>,
    pub template: Request,
    pub config:   FetchConfig,
    pub size:     u64,
}

pub(crate) type TaskQueue = Arc<Mutex<mpsc::Receiver<ChunkTask>>>;

/// Send `item`, giving up when the fetch is cancelled or the receiver is gone.
pub(crate) async fn deliver<T>(tx: &mpsc::Sender<T>, cancel: &CancellationToken, item: T) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}

/// Feed the planned tasks into the task queue.
pub(crate) async fn emit_tasks(
    plan: Vec<ChunkTask>,
    tasks: mpsc::Sender<ChunkTask>,
    cancel: CancellationToken,
) {
    debug!(chunks = plan.len(), "[chunk emitter] start");
    for task in plan {
        debug!(start = task.start, end = task.end, "[chunk emitter] emit");
        if !deliver(&tasks, &cancel, task).await {
            debug!("[chunk emitter] stopped");
            return;
        }
    }
    debug!("[chunk emitter] all tasks sent");
}

/// Pull tasks until the queue closes or the fetch is cancelled.
pub(crate) async fn run_worker<C: HttpClient>(
    id: usize,
    ctx: Arc<WorkerContext<C>>,
    tasks: TaskQueue,
    results: mpsc::Sender<ChunkResult>,
    cancel: CancellationToken,
) {
    debug!(worker = id, "[worker] start");
    loop {
        let task = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            task = async { tasks.lock().await.recv().await } => match task {
                Some(task) => task,
                None => break,
            },
        };
        debug!(
            worker = id,
            start = task.start,
            end = task.end,
            retry = task.retry,
            "[worker] retrieve"
        );

        let cursor = AtomicU64::new(task.start);
        let outcome = AssertUnwindSafe(fetch_range(&ctx, task, &cursor, &results, &cancel))
            .catch_unwind()
            .await;

        if let Err(panic) = outcome {
            let message = panic_message(panic.as_ref());
            let start = cursor.load(Ordering::Acquire);
            error!(worker = id, start, end = task.end, %message, "worker panicked");
            let failure = ChunkResult::failure(
                start,
                task.end,
                task.retry,
                FetchError::WorkerPanicked(message),
            );
            if !deliver(&results, &cancel, failure).await {
                break;
            }
        }
    }
    debug!(worker = id, "[worker] exit");
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Fetch `task` with one ranged request, emitting a result per frame.
///
/// `cursor` tracks the first byte not yet delivered so that a failure, or a
/// panic caught by the caller, reports only the unread remainder.
async fn fetch_range<C: HttpClient>(
    ctx: &WorkerContext<C>,
    task: ChunkTask,
    cursor: &AtomicU64,
    results: &mpsc::Sender<ChunkResult>,
    cancel: &CancellationToken,
) {
    let fail = |start: u64, error: FetchError| {
        ChunkResult::failure(start, task.end, task.retry, error)
    };

    let delay = backoff_delay(
        task.retry,
        ctx.config.retry_backoff,
        ctx.config.max_retry_backoff,
    );
    if !delay.is_zero() {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = results.try_send(fail(task.start, FetchError::Cancelled));
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }

    let prepared = match ctx
        .template
        .clone()
        .range(task.start, task.end)
        .without_timeout()
        .prepare(ctx.config.default_timeout)
    {
        Ok(prepared) => prepared,
        Err(e) => {
            deliver(results, cancel, fail(task.start, e)).await;
            return;
        }
    };

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            let _ = results.try_send(fail(task.start, FetchError::Cancelled));
            return;
        }
        response = ctx.client.send(&prepared) => response,
    };
    let response = match response {
        Ok(response) => response.into_fetch(),
        Err(e) => {
            deliver(results, cancel, fail(task.start, e.into())).await;
            return;
        }
    };

    if let Err(e) = check_ranged_status(response.status, &task, ctx.size) {
        deliver(results, cancel, fail(task.start, e)).await;
        return;
    }

    let expected = task.byte_count();
    if let Some(length) = response
        .headers
        .content_length()
        .filter(|&length| length != expected)
    {
        warn!(
            start = task.start,
            end = task.end,
            requested = expected,
            header = length,
            "header length does not match requested range"
        );
    }

    let mut body = response.body;
    loop {
        let position = cursor.load(Ordering::Acquire);
        if position > task.end {
            break;
        }

        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = results.try_send(fail(position, FetchError::Cancelled));
                return;
            }
            frame = body.next() => frame,
        };

        let mut data = match frame {
            Some(Ok(data)) => data,
            Some(Err(e)) => {
                deliver(results, cancel, fail(position, e)).await;
                return;
            }
            None => {
                let short = FetchError::ShortBody {
                    expected,
                    received: position - task.start,
                };
                deliver(results, cancel, fail(position, short)).await;
                return;
            }
        };

        let wanted = task.end - position + 1;
        if data.len() as u64 > wanted {
            warn!(
                start = task.start,
                end = task.end,
                extra = data.len() as u64 - wanted,
                "body longer than requested range, truncating"
            );
            data.truncate(wanted as usize);
        }

        for piece in split_frame(data, ctx.config.max_read_buffer) {
            let start = cursor.load(Ordering::Acquire);
            let len = piece.len() as u64;
            if !deliver(results, cancel, ChunkResult::success(start, piece, task.retry)).await {
                return;
            }
            cursor.store(start + len, Ordering::Release);
        }
    }
}

/// Split a body frame into non-empty pieces of at most `max` bytes.
fn split_frame(mut data: Bytes, max: usize) -> impl Iterator<Item = Bytes> {
    let max = max.max(1);
    std::iter::from_fn(move || {
        if data.is_empty() {
            None
        } else {
            let at = max.min(data.len());
            Some(data.split_to(at))
        }
    })
}

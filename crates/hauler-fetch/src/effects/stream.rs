use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::data::ChunkResult;

/// Results of one fetch, in completion order.
///
/// The stream ends once every byte was delivered, a range ran out of
/// retries, or the fetch was cancelled. Dropping it cancels the fetch and
/// releases its workers.
pub struct ChunkStream {
    rx:     mpsc::Receiver<ChunkResult>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl std::fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ChunkStream {
    pub(crate) fn new(rx: mpsc::Receiver<ChunkResult>, cancel: CancellationToken) -> Self {
        Self {
            rx,
            _guard: cancel.clone().drop_guard(),
            cancel,
        }
    }

    /// Next result, or `None` once the fetch has finished.
    pub async fn recv(&mut self) -> Option<ChunkResult> {
        self.rx.recv().await
    }

    /// Stop the fetch; results already queued are still delivered.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for ChunkStream {
    type Item = ChunkResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

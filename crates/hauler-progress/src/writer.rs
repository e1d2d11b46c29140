//! Progress-reporting wrapper around a [`WriteAt`] sink.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

use crate::bucket::ThroughputBucket;
use crate::error::Result;
use crate::sink::WriteAt;

const DEFAULT_GRANULE: Duration = Duration::from_millis(100);
const DEFAULT_SLOTS: usize = 10;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Sink wrapper that feeds every write into a [`ThroughputBucket`].
///
/// A background tick reports zero bytes once per granule so the measured
/// rate falls off while no data arrives. The tick runs until
/// [`close`](Self::close) is called or the writer is dropped.
///
/// Must be created inside a tokio runtime for the tick to run; outside one
/// the writer still works but idle periods do not decay the rate.
pub struct ProgressWriter<W> {
    inner:   W,
    size:    u64,
    written: AtomicU64,
    bucket:  Arc<ThroughputBucket>,
    window:  Duration,
    ticker:  CancellationToken,
}

impl<W: WriteAt> ProgressWriter<W> {
    /// Wrap `inner` with a one-second window made of ten 100ms granules.
    pub fn new(inner: W, size: u64) -> Self {
        Self::with_window(inner, size, DEFAULT_GRANULE, DEFAULT_SLOTS)
    }

    /// Wrap `inner` with `slots` windows of `granule` each.
    pub fn with_window(inner: W, size: u64, granule: Duration, slots: usize) -> Self {
        let granule_ms = (granule.as_millis() as i64).max(1);
        let slots = NonZeroUsize::new(slots).unwrap_or(NonZeroUsize::MIN);
        let bucket = Arc::new(ThroughputBucket::with_granularity(slots, move |ms| {
            ms / granule_ms
        }));
        let ticker = CancellationToken::new();
        spawn_ticker(Arc::clone(&bucket), Duration::from_millis(granule_ms as u64), ticker.clone());

        Self {
            inner,
            size,
            written: AtomicU64::new(0),
            bucket,
            window: Duration::from_millis(granule_ms as u64 * slots.get() as u64),
            ticker,
        }
    }

    /// Write through to the wrapped sink and record the bytes written.
    ///
    /// A rejected write is returned as-is and records nothing.
    pub fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize> {
        let n = self.inner.write_at(buf, offset)?;
        self.bucket.report(now_millis(), n as i64);
        self.written.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    /// Bytes written over the last window, scaled to one second.
    pub fn bytes_per_second(&self) -> f64 {
        let window = self.window.as_secs_f64();
        if window == 0.0 {
            return 0.0;
        }
        self.bucket.collect() as f64 / window
    }

    /// Total bytes successfully written so far.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Expected total size passed at construction.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn bucket(&self) -> &Arc<ThroughputBucket> {
        &self.bucket
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Stop the idle tick. Call once after the final write.
    pub fn close(self) {
        self.ticker.cancel();
    }
}

impl<W> Drop for ProgressWriter<W> {
    fn drop(&mut self) {
        self.ticker.cancel();
    }
}

fn spawn_ticker(bucket: Arc<ThroughputBucket>, period: Duration, stop: CancellationToken) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        tracing::warn!("no tokio runtime, progress rate will not decay while idle");
        return;
    };
    handle.spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = interval.tick() => bucket.report(now_millis(), 0),
            }
        }
        tracing::trace!("progress ticker stopped");
    });
}

//! Fixed-size ring of time-windowed counters.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Maps a report key (usually a timestamp) onto a window number.
pub type Granularity = Box<dyn Fn(i64) -> i64 + Send + Sync>;

/// Sliding-window counter approximating a transfer rate.
///
/// Keys are mapped to slots with `granularity(key) mod slots`. A report that
/// lands on a different slot than the previous one overwrites that slot, which
/// drops the stale window it held; consecutive reports on the same slot
/// accumulate. [`collect`](Self::collect) sums every slot, so the result is
/// the total over the last `slots` windows, give or take one window.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
/// use hauler_progress::ThroughputBucket;
///
/// let bucket = ThroughputBucket::new(NonZeroUsize::new(10).unwrap());
/// bucket.report(1, 1);
/// bucket.report(2, 2);
/// assert_eq!(bucket.collect(), 3);
/// ```
pub struct ThroughputBucket {
    slots: Mutex<Slots>,
    granularity: Option<Granularity>,
}

struct Slots {
    counters: Vec<i64>,
    last: usize,
}

impl ThroughputBucket {
    /// Bucket with `slots` counters and identity hashing of keys.
    pub fn new(slots: NonZeroUsize) -> Self {
        Self {
            slots: Mutex::new(Slots {
                counters: vec![0; slots.get()],
                last: 0,
            }),
            granularity: None,
        }
    }

    /// Bucket whose keys go through `granularity` before slot selection.
    ///
    /// With millisecond timestamps as keys, `|ms| ms / 100` gives 100ms
    /// windows.
    pub fn with_granularity<F>(slots: NonZeroUsize, granularity: F) -> Self
    where
        F: Fn(i64) -> i64 + Send + Sync + 'static,
    {
        Self {
            granularity: Some(Box::new(granularity)),
            ..Self::new(slots)
        }
    }

    /// Number of slots in the ring.
    pub fn size(&self) -> usize {
        self.lock().counters.len()
    }

    /// Record `delta` against the window selected by `key`.
    pub fn report(&self, key: i64, delta: i64) {
        let hashed = match &self.granularity {
            Some(granularity) => granularity(key),
            None => key,
        };

        let mut slots = self.lock();
        let index = hashed.rem_euclid(slots.counters.len() as i64) as usize;
        if index != slots.last {
            slots.counters[index] = delta;
            slots.last = index;
        } else {
            slots.counters[index] += delta;
        }
    }

    /// Sum of all slots.
    pub fn collect(&self) -> i64 {
        self.lock().counters.iter().sum()
    }

    // A panic while holding the lock cannot leave the counters half-written.
    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ThroughputBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.lock();
        f.debug_struct("ThroughputBucket")
            .field("counters", &slots.counters)
            .field("last", &slots.last)
            .field("granularity", &self.granularity.as_ref().map(|_| "{ ... }"))
            .finish()
    }
}

use std::collections::BTreeMap;
use std::time::Duration;

use crate::data::ChunkTask;

/// Calculate the delay before a retry attempt using exponential backoff.
///
/// The delay formula is: `base * 2^retry_count`
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use hauler_fetch::core::retry_delay;
///
/// assert_eq!(retry_delay(0, Duration::from_millis(100)), Duration::from_millis(100));
/// assert_eq!(retry_delay(1, Duration::from_millis(100)), Duration::from_millis(200));
/// assert_eq!(retry_delay(2, Duration::from_millis(100)), Duration::from_millis(400));
/// ```
pub fn retry_delay(retry_count: u32, base: Duration) -> Duration {
    let multiplier = 2_u32.saturating_pow(retry_count);
    base.saturating_mul(multiplier)
}

/// Delay before running a task that is on its `retry`-th attempt.
///
/// Zero for first attempts, otherwise [`retry_delay`] for the previous
/// attempt capped at `max`.
pub fn backoff_delay(retry: u32, base: Duration, max: Duration) -> Duration {
    if retry == 0 {
        return Duration::ZERO;
    }
    retry_delay(retry - 1, base).min(max)
}

/// Lifecycle of one chunk of the resource.
///
/// ```text
/// Pending(n) -> InFlight(n) -> Done
///                           -> Failed(n) -> Pending(n + 1)   if n < max_retry
///                                        -> Aborted          otherwise
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Pending { retry: u32 },
    InFlight { retry: u32 },
    Done,
    Failed { retry: u32 },
    Aborted,
}

impl ChunkState {
    /// A worker picked the chunk up.
    #[must_use]
    pub fn dispatch(self) -> Self {
        match self {
            ChunkState::Pending { retry } => ChunkState::InFlight { retry },
            other => other,
        }
    }

    /// The last byte of the chunk was delivered.
    #[must_use]
    pub fn complete(self) -> Self {
        match self {
            ChunkState::InFlight { .. } | ChunkState::Pending { .. } => ChunkState::Done,
            other => other,
        }
    }

    /// The attempt numbered `retry` failed.
    #[must_use]
    pub fn fail(self, retry: u32) -> Self {
        match self {
            ChunkState::InFlight { .. } | ChunkState::Pending { .. } => {
                ChunkState::Failed { retry }
            }
            other => other,
        }
    }

    /// Decide what happens after a failure.
    #[must_use]
    pub fn resolve(self, max_retry: u32) -> Self {
        match self {
            ChunkState::Failed { retry } if retry < max_retry => {
                ChunkState::Pending { retry: retry + 1 }
            }
            ChunkState::Failed { .. } => ChunkState::Aborted,
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChunkState::Done | ChunkState::Aborted)
    }
}

/// Per-chunk states of one concurrent fetch.
///
/// Chunks are keyed by their inclusive end byte. A worker that fails midway
/// reports the unread remainder, which shares the end byte of the chunk it
/// came from, so retries of any remainder land on the same entry.
#[derive(Debug, Clone, Default)]
pub struct ChunkLedger {
    states: BTreeMap<u64, ChunkState>,
}

impl ChunkLedger {
    /// Ledger for a freshly planned fetch, every chunk queued.
    pub fn from_plan(plan: &[ChunkTask]) -> Self {
        let states = plan
            .iter()
            .map(|task| {
                let state = ChunkState::Pending { retry: task.retry }.dispatch();
                (task.end, state)
            })
            .collect();
        Self { states }
    }

    pub fn state(&self, end: u64) -> Option<ChunkState> {
        self.states.get(&end).copied()
    }

    /// Record a delivered fragment ending at `end`.
    ///
    /// Only the fragment that reaches the chunk's last byte completes it.
    pub fn record_success(&mut self, end: u64) {
        if let Some(state) = self.states.get_mut(&end) {
            *state = state.complete();
        }
    }

    /// Record a failed attempt and return the resolved state.
    pub fn record_failure(&mut self, end: u64, retry: u32, max_retry: u32) -> ChunkState {
        let state = self
            .states
            .entry(end)
            .or_insert(ChunkState::InFlight { retry });
        *state = state.fail(retry).resolve(max_retry);
        *state
    }

    /// Mark a re-queued chunk as handed to the workers.
    pub fn dispatch(&mut self, end: u64) {
        if let Some(state) = self.states.get_mut(&end) {
            *state = state.dispatch();
        }
    }

    pub fn is_complete(&self) -> bool {
        self.states.values().all(|s| *s == ChunkState::Done)
    }

    pub fn remaining(&self) -> usize {
        self.states.values().filter(|s| !s.is_terminal()).count()
    }
}

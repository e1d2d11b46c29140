//! Pure transformations and decision logic for the fetch pipeline.
//!
//! Nothing here touches the network or spawns tasks: chunk planning, retry
//! timing, the per-chunk state machine and response validation are plain
//! functions over data so they can be tested without a runtime.

mod plan;
mod retry;
mod validation;

pub use plan::{clamp_connections, plan_chunks};
pub use retry::{ChunkLedger, ChunkState, backoff_delay, retry_delay};
pub use validation::{accepts_ranges, check_ranged_status, is_success};

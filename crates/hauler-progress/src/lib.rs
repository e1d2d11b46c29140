//! Transfer throughput measurement for concurrent downloads.
//!
//! # Key Features
//!
//! - **Sliding window**: [`ThroughputBucket`] keeps a fixed ring of
//!   time-windowed counters, so measuring a rate never allocates
//! - **Random access**: [`WriteAt`] sinks accept fragments at any offset, in
//!   any order, from any task
//! - **Idle decay**: [`ProgressWriter`] ticks zero-byte reports so a stalled
//!   transfer reads as slow instead of keeping its last rate
//!
//! # Example
//!
//! ```
//! use hauler_progress::{MemorySink, ProgressWriter, WriteAt};
//!
//! let sink = MemorySink::new(4);
//! let writer = ProgressWriter::new(&sink, 4);
//! writer.write_at(&[3, 4], 2).unwrap();
//! writer.write_at(&[1, 2], 0).unwrap();
//! writer.close();
//!
//! assert_eq!(sink.to_vec(), vec![1, 2, 3, 4]);
//! ```

pub use self::bucket::{Granularity, ThroughputBucket};
pub use self::error::{Result, SinkError};
pub use self::sink::{FileSink, MemorySink, WriteAt};
pub use self::writer::ProgressWriter;

mod bucket;
mod error;
mod sink;
mod writer;

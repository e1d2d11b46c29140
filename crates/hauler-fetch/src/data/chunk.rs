use bytes::Bytes;

use crate::error::FetchError;

/// What the capability probe learned about a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// Total size in bytes; `None` when the server did not say.
    pub size: Option<u64>,
    /// Whether the server advertises `Accept-Ranges: bytes`.
    pub range_supported: bool,
}

impl ResourceDescriptor {
    /// Returns `true` when the resource can be split into ranged requests.
    pub fn can_split(&self) -> bool {
        self.range_supported && self.size.is_some_and(|size| size > 0)
    }
}

/// A contiguous inclusive byte range waiting for a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkTask {
    pub start: u64,
    /// Inclusive.
    pub end:   u64,
    /// How many times this range has been retried.
    pub retry: u32,
}

impl ChunkTask {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end,
            retry: 0,
        }
    }

    /// Number of bytes covered.
    pub fn byte_count(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// One fragment of a fetch, or the failure to produce it.
///
/// A successful result carries the bytes of `start..=end`; a failed one
/// names the range that was not delivered. Results arrive in completion
/// order, so callers place each payload by its `start` offset.
#[derive(Debug)]
pub struct ChunkResult {
    pub start:   u64,
    /// Inclusive.
    pub end:     u64,
    pub retry:   u32,
    pub outcome: Result<Bytes, FetchError>,
}

impl ChunkResult {
    pub fn success(start: u64, data: Bytes, retry: u32) -> Self {
        let end = (start + data.len() as u64).saturating_sub(1).max(start);
        Self {
            start,
            end,
            retry,
            outcome: Ok(data),
        }
    }

    pub fn failure(start: u64, end: u64, retry: u32, error: FetchError) -> Self {
        Self {
            start,
            end,
            retry,
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn data(&self) -> Option<&Bytes> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.outcome.as_ref().err()
    }

    /// Number of bytes in the `start..=end` range.
    pub fn range_len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Task that fetches this result's range again.
    pub fn retry_task(&self) -> ChunkTask {
        ChunkTask {
            start: self.start,
            end:   self.end,
            retry: self.retry + 1,
        }
    }
}

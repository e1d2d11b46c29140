use crate::data::ChunkTask;

/// Clamp a requested connection count to `1..=max` and to no more than one
/// connection per byte of `size`.
pub fn clamp_connections(requested: usize, max: usize, size: u64) -> usize {
    let per_byte = usize::try_from(size).unwrap_or(usize::MAX);
    let cap = max.min(per_byte).max(1);
    requested.clamp(1, cap)
}

/// Partition `0..size` into contiguous inclusive ranges for `connections`
/// workers.
///
/// The chunk size is `size / connections` and consecutive chunks start
/// `chunk_size + 1` bytes apart, the last one ending at `size - 1`. The
/// connection count is advisory: rounding can yield fewer chunks than
/// connections, never more. Connections are clamped to `1..=size`, so no
/// planned range is empty.
///
/// # Examples
///
/// ```
/// use hauler_fetch::core::plan_chunks;
///
/// let chunks = plan_chunks(10, 3);
/// let ranges: Vec<_> = chunks.iter().map(|c| (c.start, c.end)).collect();
/// assert_eq!(ranges, vec![(0, 3), (4, 7), (8, 9)]);
/// ```
pub fn plan_chunks(size: u64, connections: usize) -> Vec<ChunkTask> {
    if size == 0 {
        return Vec::new();
    }

    let connections = (connections.max(1) as u64).min(size);
    let chunk_size = size / connections;
    let stride = chunk_size + 1;

    let mut chunks = Vec::with_capacity(connections as usize);
    let mut start = 0u64;
    while start < size {
        let end = (start + chunk_size).min(size - 1);
        chunks.push(ChunkTask::new(start, end));
        start += stride;
    }
    chunks
}

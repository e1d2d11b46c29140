//! Concurrent out-of-order reassembly through a `ProgressWriter`.

use std::sync::Arc;
use std::time::Duration;

use hauler_progress::{FileSink, MemorySink, ProgressWriter, WriteAt};

fn sample(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 253) as u8).collect()
}

/// Offsets and lengths of `size` bytes cut into `pieces` fragments, in
/// reverse order so every writer lands behind the previous one.
fn fragments(size: usize, pieces: usize) -> Vec<(usize, usize)> {
    let step = size.div_ceil(pieces);
    let mut out: Vec<(usize, usize)> = (0..size)
        .step_by(step)
        .map(|start| (start, step.min(size - start)))
        .collect();
    out.reverse();
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_reassemble_memory_sink() {
    let data = Arc::new(sample(64 * 1024));
    let writer = Arc::new(ProgressWriter::new(MemorySink::new(data.len()), data.len() as u64));

    let mut handles = Vec::new();
    for (start, len) in fragments(data.len(), 16) {
        let data = Arc::clone(&data);
        let writer = Arc::clone(&writer);
        handles.push(tokio::spawn(async move {
            writer.write_at(&data[start..start + len], start as u64).unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(writer.written(), data.len() as u64);
    assert!(writer.bytes_per_second() > 0.0);
    assert_eq!(writer.get_ref().to_vec(), *data);

    let writer = Arc::into_inner(writer).expect("all writers finished");
    writer.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_sink_reassembly_and_idle_decay() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("download.bin");
    let data = sample(10_000);

    let sink = FileSink::create(&path, data.len() as u64).unwrap();
    let writer = ProgressWriter::with_window(&sink, data.len() as u64, Duration::from_millis(10), 4);
    for (start, len) in fragments(data.len(), 7) {
        writer.write_at(&data[start..start + len], start as u64).unwrap();
    }
    assert!(writer.bytes_per_second() > 0.0);

    // Well past the 40ms window, only zero ticks remain.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(writer.bytes_per_second(), 0.0);
    writer.close();

    sink.sync_all().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), data);
}

#[tokio::test]
async fn test_write_past_capacity_is_rejected() {
    let sink = MemorySink::new(8);
    let writer = ProgressWriter::new(&sink, 8);

    assert!(writer.write_at(&[1; 4], 6).is_err());
    assert_eq!(writer.written(), 0);
    assert_eq!(sink.capacity(), 8);
    writer.close();
}

//! Random-access byte sinks.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Result, SinkError};

/// A destination that accepts writes at arbitrary offsets.
///
/// Writes take `&self` so a sink can be shared between the tasks that
/// reassemble a download. Implementations reject writes that would run past
/// their capacity and leave their contents untouched in that case.
pub trait WriteAt: Send + Sync {
    /// Write all of `buf` starting at `offset`, returning the bytes written.
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize>;

    /// Fixed capacity of the sink in bytes.
    fn capacity(&self) -> u64;
}

impl<T: WriteAt + ?Sized> WriteAt for &T {
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize> {
        (**self).write_at(buf, offset)
    }

    fn capacity(&self) -> u64 {
        (**self).capacity()
    }
}

impl<T: WriteAt + ?Sized> WriteAt for std::sync::Arc<T> {
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize> {
        (**self).write_at(buf, offset)
    }

    fn capacity(&self) -> u64 {
        (**self).capacity()
    }
}

fn check_bounds(buf: &[u8], offset: u64, capacity: u64) -> Result<()> {
    let fits = offset
        .checked_add(buf.len() as u64)
        .is_some_and(|end| end <= capacity);
    if fits {
        Ok(())
    } else {
        Err(SinkError::OutOfBounds {
            offset,
            len: buf.len(),
            capacity,
        })
    }
}

/// Fixed-size in-memory sink.
#[derive(Debug)]
pub struct MemorySink {
    buf: Mutex<Vec<u8>>,
}

impl MemorySink {
    /// Zero-filled sink of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            buf: Mutex::new(vec![0; size]),
        }
    }

    /// Copy of the current contents.
    pub fn to_vec(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Consume the sink and return its contents.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WriteAt for MemorySink {
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize> {
        let mut inner = self.lock();
        check_bounds(buf, offset, inner.len() as u64)?;
        let start = offset as usize;
        inner[start..start + buf.len()].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn capacity(&self) -> u64 {
        self.lock().len() as u64
    }
}

/// File-backed sink using positional writes.
#[derive(Debug)]
pub struct FileSink {
    file:     File,
    capacity: u64,
}

impl FileSink {
    /// Create (or truncate) `path` and size it to `size` bytes.
    pub fn create(path: impl AsRef<Path>, size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size)?;
        Ok(Self {
            file,
            capacity: size,
        })
    }

    /// Flush file contents and metadata to disk.
    pub fn sync_all(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    #[cfg(unix)]
    fn write_all_at(&self, buf: &[u8], offset: u64) -> std::io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.write_all_at(buf, offset)
    }

    #[cfg(windows)]
    fn write_all_at(&self, mut buf: &[u8], mut offset: u64) -> std::io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !buf.is_empty() {
            match self.file.seek_write(buf, offset) {
                Ok(0) => return Err(std::io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    buf = &buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl WriteAt for FileSink {
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize> {
        check_bounds(buf, offset, self.capacity)?;
        self.write_all_at(buf, offset)?;
        Ok(buf.len())
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }
}

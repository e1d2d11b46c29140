use std::io;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("write of {len} bytes at offset {offset} exceeds capacity {capacity}")]
    OutOfBounds {
        offset:   u64,
        len:      usize,
        capacity: u64,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, SinkError>;

//! Chunk planning, chunk sources, checksums and progress math.
//!
//! Everything in this crate is transport-agnostic: the upload engine in
//! `folio-uploader` combines these pieces with an endpoint implementation.

mod checksum;
mod chunked;
mod progress;
mod source;

pub use checksum::{CHECKSUM_WINDOW, checksum_bytes, checksum_source};
pub use chunked::{Chunk, chunk_count, plan};
pub use progress::{ProgressAggregator, SessionClock};
pub use source::{ChunkSource, FileHandle, FileSource, MemorySource, ReadFuture};

/// Default chunk size: 5 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Largest file accepted by default: 10 GiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("file of {file_size} bytes needs more than u32::MAX chunks of {chunk_size} bytes")]
    TooManyChunks { file_size: u64, chunk_size: u64 },

    #[error("range {offset}+{len} is outside a source of {size} bytes")]
    OutOfRange { offset: u64, len: usize, size: u64 },

    #[error("short read at offset {offset}: expected {expected} bytes, got {got}")]
    ShortRead {
        offset: u64,
        expected: usize,
        got: usize,
    },

    #[error("blocking read task failed: {0}")]
    Join(String),
}

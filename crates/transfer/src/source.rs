use std::fmt;
use std::future::Future;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use crate::TransferError;
use crate::chunked::Chunk;

/// Future returned by [`ChunkSource::read_range`].
pub type ReadFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, TransferError>> + Send + 'a>>;

/// Random-access byte source backing an upload.
///
/// Implementations must return exactly `len` bytes or an error; the engine
/// never asks for bytes past [`size`](Self::size).
pub trait ChunkSource: Send + Sync {
    /// Total size in bytes. Must not change during an upload.
    fn size(&self) -> u64;

    /// Reads `len` bytes starting at `offset`.
    fn read_range(&self, offset: u64, len: usize) -> ReadFuture<'_>;
}

fn check_range(offset: u64, len: usize, size: u64) -> Result<(), TransferError> {
    let end = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(TransferError::OutOfRange { offset, len, size }),
    }
}

// ---------------------------------------------------------------------------
// FileSource
// ---------------------------------------------------------------------------

/// Reads ranges of an on-disk file on the blocking thread pool.
///
/// Each read opens its own descriptor so concurrent chunk reads never
/// contend on a shared cursor.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    size: u64,
}

impl FileSource {
    /// Opens `path` and records its current size.
    pub fn open(path: &Path) -> Result<Self, TransferError> {
        let size = std::fs::metadata(path)?.len();
        Ok(Self {
            path: path.to_path_buf(),
            size,
        })
    }
}

impl ChunkSource for FileSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_range(&self, offset: u64, len: usize) -> ReadFuture<'_> {
        Box::pin(async move {
            check_range(offset, len, self.size)?;
            let path = self.path.clone();
            tokio::task::spawn_blocking(move || read_file_range(&path, offset, len))
                .await
                .map_err(|e| TransferError::Join(e.to_string()))?
        })
    }
}

fn read_file_range(path: &Path, offset: u64, len: usize) -> Result<Vec<u8>, TransferError> {
    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            return Err(TransferError::ShortRead {
                offset,
                expected: len,
                got: filled,
            });
        }
        filled += n;
    }
    Ok(buf)
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// Serves ranges from shared in-memory bytes.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }
}

impl ChunkSource for MemorySource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(&self, offset: u64, len: usize) -> ReadFuture<'_> {
        Box::pin(async move {
            check_range(offset, len, self.size())?;
            let start = offset as usize;
            Ok(self.data[start..start + len].to_vec())
        })
    }
}

// ---------------------------------------------------------------------------
// FileHandle
// ---------------------------------------------------------------------------

/// Opaque reference to the data being uploaded plus its total size.
///
/// Cheap to clone; the size is captured once and stays fixed for the
/// lifetime of a session.
#[derive(Clone)]
pub struct FileHandle {
    source: Arc<dyn ChunkSource>,
    size: u64,
}

impl FileHandle {
    pub fn new(source: Arc<dyn ChunkSource>) -> Self {
        let size = source.size();
        Self { source, size }
    }

    /// Opens an on-disk file.
    pub fn from_path(path: &Path) -> Result<Self, TransferError> {
        Ok(Self::new(Arc::new(FileSource::open(path)?)))
    }

    /// Wraps in-memory bytes.
    pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Self {
        Self::new(Arc::new(MemorySource::new(data)))
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Reads an arbitrary range.
    pub async fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>, TransferError> {
        check_range(offset, len, self.size)?;
        self.source.read_range(offset, len).await
    }

    /// Reads the bytes covered by `chunk`.
    pub async fn read_chunk(&self, chunk: &Chunk) -> Result<Vec<u8>, TransferError> {
        let len = usize::try_from(chunk.length).map_err(|_| TransferError::OutOfRange {
            offset: chunk.offset,
            len: usize::MAX,
            size: self.size,
        })?;
        self.read_range(chunk.offset, len).await
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

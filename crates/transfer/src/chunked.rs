use crate::TransferError;

/// A contiguous byte range of the source file, transferred as one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
    /// Zero-based position in the plan.
    pub index: u32,
    /// Byte offset within the file.
    pub offset: u64,
    /// Length in bytes; only the last chunk may be shorter than the chunk size.
    pub length: u64,
}

impl Chunk {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Number of chunks needed to cover `file_size` bytes.
pub fn chunk_count(file_size: u64, chunk_size: u64) -> Result<u32, TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::InvalidChunkSize);
    }
    let count = file_size.div_ceil(chunk_size);
    u32::try_from(count).map_err(|_| TransferError::TooManyChunks {
        file_size,
        chunk_size,
    })
}

/// Partitions `[0, file_size)` into ordered, non-overlapping chunks.
///
/// Deterministic: the same inputs always produce the same boundaries.
/// An empty file yields an empty plan.
pub fn plan(file_size: u64, chunk_size: u64) -> Result<Vec<Chunk>, TransferError> {
    let count = chunk_count(file_size, chunk_size)?;
    let chunks = (0..count)
        .map(|index| {
            let (offset, length) = range_of(index, file_size, chunk_size);
            Chunk {
                index,
                offset,
                length,
            }
        })
        .collect();
    Ok(chunks)
}

fn range_of(index: u32, file_size: u64, chunk_size: u64) -> (u64, u64) {
    let offset = u64::from(index) * chunk_size;
    let length = chunk_size.min(file_size - offset);
    (offset, length)
}

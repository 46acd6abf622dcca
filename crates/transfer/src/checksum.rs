use sha2::{Digest, Sha256};

use crate::TransferError;
use crate::source::FileHandle;

/// Read window used when hashing a whole source: 1 MiB.
pub const CHECKSUM_WINDOW: usize = 1024 * 1024;

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes SHA-256 over the original bytes of `file`, front to back.
///
/// The digest depends only on the file content, never on how or in which
/// order chunks were transferred.
pub async fn checksum_source(file: &FileHandle) -> Result<String, TransferError> {
    let mut hasher = Sha256::new();
    let size = file.size();
    let mut offset = 0u64;
    while offset < size {
        let len = (size - offset).min(CHECKSUM_WINDOW as u64) as usize;
        let window = file.read_range(offset, len).await?;
        hasher.update(&window);
        offset += len as u64;
    }
    Ok(hex::encode(hasher.finalize()))
}

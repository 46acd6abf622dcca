use folio_protocol::{FileRecord, ProgressSnapshot};
use serde::Serialize;

use crate::error::ChunkUploadError;

/// Events emitted by an upload session, in order.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// Recomputed progress after a chunk was confirmed.
    Progress(ProgressSnapshot),
    /// A chunk was acknowledged by the server.
    ChunkComplete { index: u32, total: u32 },
    /// The session failed. Emitted at most once.
    Error(ChunkUploadError),
    /// Every chunk was confirmed and the server assembled the file.
    Complete(UploadResult),
    Paused,
    Resumed,
    Cancelled,
}

/// Outcome of a completed upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub file_id: String,
    pub filename: String,
    pub size: u64,
    pub chunks_uploaded: u32,
    /// Retries summed over all chunks.
    pub retry_count: u32,
    /// Active upload time, excluding pauses.
    pub upload_time_ms: u64,
    /// Hex SHA-256 of the local file.
    pub checksum: String,
    pub record: FileRecord,
}

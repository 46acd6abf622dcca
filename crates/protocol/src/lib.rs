//! Wire types for the Folio chunked manuscript upload API.
//!
//! The journal server exposes three endpoints (session initializer, chunk
//! transfer, completion) plus a confirmed-chunks query used to verify
//! resume state. All JSON bodies use camelCase field names.

pub mod messages;
pub mod resume;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{
    ApiError, CompleteUploadRequest, ConfirmedChunksResponse, FileRecord, StartUploadRequest,
    StartUploadResponse, UploadChunkRequest, UploadChunkResponse,
};
pub use resume::{ResumeToken, ResumeTokenError};
pub use types::{FileMeta, ProgressSnapshot, UploadStatus};

//! Upload error types.

use std::fmt;

use folio_protocol::{ResumeTokenError, UploadStatus};
use folio_transfer::TransferError;

use crate::state::UploadAction;

/// Classification of a failed chunk transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transient transport failure (timeouts, resets, DNS).
    Network,
    /// Server-side processing failure for a chunk.
    Server,
    /// Request rejected as invalid; retrying cannot help.
    Validation,
    /// Transfer interrupted by pause or cancel. Not an error.
    Abort,
}

impl ErrorKind {
    /// Whether errors of this kind are retried unless stated otherwise.
    pub fn retryable_by_default(self) -> bool {
        matches!(self, Self::Network | Self::Server)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Network => "network",
            Self::Server => "server",
            Self::Validation => "validation",
            Self::Abort => "abort",
        })
    }
}

/// A classified failure of a single endpoint call.
///
/// Endpoint implementations return this directly; the transfer worker
/// fills in `chunk_index` and decides whether to retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct ChunkUploadError {
    pub kind: ErrorKind,
    pub chunk_index: Option<u32>,
    pub retryable: bool,
    pub message: String,
}

impl ChunkUploadError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            chunk_index: None,
            retryable: kind.retryable_by_default(),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Server, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn abort() -> Self {
        Self::new(ErrorKind::Abort, "transfer aborted")
    }

    /// Attaches the chunk the error belongs to.
    pub fn with_chunk(mut self, index: u32) -> Self {
        self.chunk_index = Some(index);
        self
    }

    /// Marks the error as terminal regardless of its kind.
    pub fn not_retryable(mut self) -> Self {
        self.retryable = false;
        self
    }
}

/// Errors produced by the upload engine.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("cannot {action} an upload that is {from}")]
    InvalidTransition {
        from: UploadStatus,
        action: UploadAction,
    },

    #[error("chunk upload failed: {0}")]
    Chunk(ChunkUploadError),

    #[error("upload initialization failed: {0}")]
    Init(ChunkUploadError),

    #[error("resume verification failed: {0}")]
    Verify(ChunkUploadError),

    #[error("upload completion failed: {0}")]
    Completion(ChunkUploadError),

    #[error("invalid resume token: {0}")]
    InvalidResumeToken(String),

    #[error("invalid resume token: {0}")]
    ResumeToken(#[from] ResumeTokenError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file is empty")]
    EmptyFile,

    #[error("file of {size} bytes exceeds the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("upload cancelled")]
    Cancelled,

    #[error("upload session task stopped unexpectedly")]
    SessionGone,
}

impl UploadError {
    /// The classified endpoint error behind this failure, if any.
    pub fn chunk_error(&self) -> Option<&ChunkUploadError> {
        match self {
            Self::Chunk(e) | Self::Init(e) | Self::Verify(e) | Self::Completion(e) => Some(e),
            _ => None,
        }
    }
}

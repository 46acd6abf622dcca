use serde::{Deserialize, Serialize};

/// Descriptive metadata for the file being uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub filename: String,
    pub mime_type: String,
}

impl FileMeta {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UploadStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "uploading")]
    Uploading,
    #[serde(rename = "paused")]
    Paused,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl UploadStatus {
    /// Returns `true` for states no transition can leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time progress of an upload, derived from confirmed chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    pub uploaded_chunks: u32,
    pub total_chunks: u32,
    pub percentage: f64,
    pub speed_bytes_per_sec: f64,
    pub remaining_seconds: f64,
    /// Number of chunks confirmed so far.
    pub current_chunk: u32,
}

impl ProgressSnapshot {
    /// An empty snapshot for a file that has not transferred anything yet.
    pub fn empty(total_bytes: u64, total_chunks: u32) -> Self {
        Self {
            uploaded_bytes: 0,
            total_bytes,
            uploaded_chunks: 0,
            total_chunks,
            percentage: 0.0,
            speed_bytes_per_sec: 0.0,
            remaining_seconds: 0.0,
            current_chunk: 0,
        }
    }

    /// Returns `true` once every byte has been confirmed.
    pub fn is_complete(&self) -> bool {
        self.total_bytes > 0 && self.uploaded_bytes == self.total_bytes
    }
}

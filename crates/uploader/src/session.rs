//! Mutable state of one upload, owned by the scheduler task.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use folio_protocol::{FileMeta, ProgressSnapshot, ResumeToken, UploadStatus};
use folio_transfer::{Chunk, FileHandle, ProgressAggregator, SessionClock};
use serde::Serialize;

use crate::config::UploaderConfig;
use crate::error::UploadError;
use crate::state::{UploadAction, transition};

/// Server-issued identity and negotiated geometry of a session.
#[derive(Debug, Clone)]
pub(crate) struct SessionInit {
    pub id: String,
    pub resume_token: String,
    pub chunk_size: u64,
    pub chunks: Vec<Chunk>,
}

pub(crate) struct UploadSession {
    pub id: String,
    pub file: FileHandle,
    pub meta: FileMeta,
    pub chunk_size: u64,
    pub chunks: Vec<Chunk>,
    pub max_concurrent_chunks: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub status: UploadStatus,
    pub uploaded: BTreeSet<u32>,
    pub failed: BTreeSet<u32>,
    pub retry_counts: HashMap<u32, u32>,
    pub resume_token: String,
    pub clock: SessionClock,
    progress: ProgressAggregator,
}

/// Read-only view of a session, published after every state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub upload_id: String,
    pub status: UploadStatus,
    pub total_chunks: u32,
    pub uploaded_chunks: Vec<u32>,
    pub failed_chunks: Vec<u32>,
    pub in_flight: Vec<u32>,
    pub retry_count: u32,
    pub resume_token: ResumeToken,
    pub progress: ProgressSnapshot,
}

impl SessionSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl UploadSession {
    pub fn new(
        init: SessionInit,
        file: FileHandle,
        meta: FileMeta,
        status: UploadStatus,
        uploaded: BTreeSet<u32>,
        config: &UploaderConfig,
    ) -> Self {
        let progress = ProgressAggregator::new(&init.chunks);
        Self {
            id: init.id,
            file,
            meta,
            chunk_size: init.chunk_size,
            chunks: init.chunks,
            max_concurrent_chunks: config.max_concurrent_chunks,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
            status,
            uploaded,
            failed: BTreeSet::new(),
            retry_counts: HashMap::new(),
            resume_token: init.resume_token,
            clock: SessionClock::start_paused(),
            progress,
        }
    }

    pub fn total_chunks(&self) -> u32 {
        self.chunks.len() as u32
    }

    /// Applies a lifecycle action, keeping the clock in step with the status.
    pub fn apply(&mut self, action: UploadAction) -> Result<UploadStatus, UploadError> {
        let next = transition(self.status, action)?;
        self.status = next;
        if next == UploadStatus::Uploading {
            self.clock.resume();
        } else {
            self.clock.pause();
        }
        Ok(next)
    }

    /// Chunks neither confirmed nor failed, in ascending order.
    pub fn pending(&self) -> BTreeSet<u32> {
        (0..self.total_chunks())
            .filter(|i| !self.uploaded.contains(i) && !self.failed.contains(i))
            .collect()
    }

    pub fn chunk(&self, index: u32) -> Option<Chunk> {
        self.chunks.get(index as usize).copied()
    }

    pub fn mark_uploaded(&mut self, index: u32, retries: u32) {
        self.record_retries(index, retries);
        self.uploaded.insert(index);
        self.failed.remove(&index);
    }

    pub fn mark_failed(&mut self, index: u32, retries: u32) {
        self.record_retries(index, retries);
        self.failed.insert(index);
    }

    pub fn retries_for(&self, index: u32) -> u32 {
        self.retry_counts.get(&index).copied().unwrap_or(0)
    }

    pub fn record_retries(&mut self, index: u32, retries: u32) {
        if retries > 0 {
            self.retry_counts.insert(index, retries);
        }
    }

    pub fn total_retries(&self) -> u32 {
        self.retry_counts.values().sum()
    }

    /// Drops per-chunk bookkeeping after a cancel.
    pub fn clear(&mut self) {
        self.uploaded.clear();
        self.failed.clear();
        self.retry_counts.clear();
    }

    pub fn resume_token(&self) -> ResumeToken {
        ResumeToken {
            upload_id: self.id.clone(),
            token: self.resume_token.clone(),
            filename: self.meta.filename.clone(),
            mime_type: self.meta.mime_type.clone(),
            file_size: self.file.size(),
            chunk_size: self.chunk_size,
        }
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot(&self.uploaded, self.clock.elapsed())
    }

    pub fn snapshot(&self, in_flight: &BTreeSet<u32>) -> SessionSnapshot {
        SessionSnapshot {
            upload_id: self.id.clone(),
            status: self.status,
            total_chunks: self.total_chunks(),
            uploaded_chunks: self.uploaded.iter().copied().collect(),
            failed_chunks: self.failed.iter().copied().collect(),
            in_flight: in_flight.iter().copied().collect(),
            retry_count: self.total_retries(),
            resume_token: self.resume_token(),
            progress: self.progress(),
        }
    }
}

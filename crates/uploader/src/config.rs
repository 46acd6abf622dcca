//! Upload engine configuration.

use std::time::Duration;

use folio_transfer::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_FILE_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::UploadError;

/// How chunk indices supplied with a resume token are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumePolicy {
    /// Skip every chunk the caller reports as uploaded.
    #[default]
    Trust,
    /// Skip only chunks the server also confirms.
    Verify,
}

/// Tunables for the upload engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploaderConfig {
    /// Proposed chunk size in bytes; the server may override it.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Upper bound on simultaneous chunk transfers.
    #[serde(default = "default_max_concurrent_chunks")]
    pub max_concurrent_chunks: usize,

    /// Retries per chunk after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff; retry `n` waits `retry_delay_ms * n`.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Largest accepted file in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default)]
    pub resume_policy: ResumePolicy,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_max_concurrent_chunks() -> usize {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_concurrent_chunks: default_max_concurrent_chunks(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            max_file_size: default_max_file_size(),
            resume_policy: ResumePolicy::default(),
        }
    }
}

impl UploaderConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Rejects settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.chunk_size == 0 {
            return Err(UploadError::Config("chunk_size must be greater than zero".into()));
        }
        if self.max_concurrent_chunks == 0 {
            return Err(UploadError::Config(
                "max_concurrent_chunks must be at least 1".into(),
            ));
        }
        if self.chunk_size > self.max_file_size {
            return Err(UploadError::Config(format!(
                "chunk_size {} exceeds max_file_size {}",
                self.chunk_size, self.max_file_size
            )));
        }
        Ok(())
    }
}

//! Single-chunk transfer with bounded retries.

use std::sync::Arc;
use std::time::Duration;

use folio_protocol::UploadChunkRequest;
use folio_transfer::{Chunk, FileHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::endpoint::UploadEndpoint;
use crate::error::{ChunkUploadError, ErrorKind};

/// Everything a worker needs that is shared across chunks of one session.
pub(crate) struct WorkerContext {
    pub endpoint: Arc<dyn UploadEndpoint>,
    pub file: FileHandle,
    pub upload_id: String,
    pub resume_token: String,
    pub total_chunks: u32,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ChunkResult {
    Uploaded,
    /// Interrupted by pause or cancel; the chunk is still pending.
    Aborted,
    Failed(ChunkUploadError),
}

/// What a worker reports back to the scheduler for one chunk.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ChunkTransferOutcome {
    pub chunk_index: u32,
    /// Total retries spent on this chunk, including earlier periods.
    pub retries: u32,
    pub result: ChunkResult,
}

impl ChunkTransferOutcome {
    #[cfg(test)]
    pub fn success(&self) -> bool {
        matches!(self.result, ChunkResult::Uploaded)
    }

    #[cfg(test)]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.result {
            ChunkResult::Uploaded => None,
            ChunkResult::Aborted => Some(ErrorKind::Abort),
            ChunkResult::Failed(e) => Some(e.kind),
        }
    }
}

/// Delay before retry number `retries + 1`: linear in the attempt count.
pub(crate) fn backoff_delay(retry_delay: Duration, retries: u32) -> Duration {
    retry_delay.saturating_mul(retries.saturating_add(1))
}

/// Transfers one chunk, retrying retryable failures up to the session limit.
///
/// `retries_so_far` carries retries spent before a pause so the limit holds
/// across the whole session. Cancelling `cancel` aborts the in-flight request
/// and any backoff sleep.
pub(crate) async fn transfer_chunk(
    ctx: Arc<WorkerContext>,
    chunk: Chunk,
    retries_so_far: u32,
    cancel: CancellationToken,
) -> ChunkTransferOutcome {
    let mut retries = retries_so_far;
    let outcome = |retries, result| ChunkTransferOutcome {
        chunk_index: chunk.index,
        retries,
        result,
    };

    loop {
        let attempt = tokio::select! {
            biased;
            _ = cancel.cancelled() => return outcome(retries, ChunkResult::Aborted),
            res = attempt_chunk(&ctx, &chunk) => res,
        };

        let err = match attempt {
            Ok(()) => {
                debug!(chunk = chunk.index, retries, "chunk uploaded");
                return outcome(retries, ChunkResult::Uploaded);
            }
            Err(e) if e.kind == ErrorKind::Abort && cancel.is_cancelled() => {
                return outcome(retries, ChunkResult::Aborted);
            }
            // An abort the session did not ask for is a dropped connection.
            Err(e) if e.kind == ErrorKind::Abort => {
                ChunkUploadError::network(e.message).with_chunk(chunk.index)
            }
            Err(e) => e.with_chunk(chunk.index),
        };

        if !err.retryable || retries >= ctx.max_retries {
            error!(
                chunk = chunk.index,
                retries,
                kind = %err.kind,
                error = %err.message,
                "chunk upload failed"
            );
            return outcome(retries, ChunkResult::Failed(err));
        }

        let delay = backoff_delay(ctx.retry_delay, retries);
        retries += 1;
        warn!(
            chunk = chunk.index,
            attempt = retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying chunk"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return outcome(retries, ChunkResult::Aborted),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn attempt_chunk(ctx: &WorkerContext, chunk: &Chunk) -> Result<(), ChunkUploadError> {
    let payload = ctx
        .file
        .read_chunk(chunk)
        .await
        .map_err(|e| ChunkUploadError::validation(format!("reading chunk: {e}")))?;

    let req = UploadChunkRequest {
        upload_id: ctx.upload_id.clone(),
        chunk_index: chunk.index,
        total_chunks: ctx.total_chunks,
        resume_token: ctx.resume_token.clone(),
        payload,
    };
    let resp = ctx.endpoint.upload_chunk(req).await?;

    if !resp.success {
        return Err(ChunkUploadError::server("chunk not acknowledged"));
    }
    if resp.chunk_index != chunk.index {
        return Err(ChunkUploadError::server(format!(
            "acknowledged chunk {} instead of {}",
            resp.chunk_index, chunk.index
        )));
    }
    Ok(())
}

//! Session actor: owns the [`UploadSession`] and drives chunk workers.
//!
//! Control commands and worker outcomes are serialized through one task, so
//! every state change, set mutation and emitted event happens in a single
//! order. Workers never touch the session directly.

use std::collections::BTreeSet;
use std::sync::Arc;

use folio_protocol::{CompleteUploadRequest, FileRecord, UploadStatus};
use folio_transfer::checksum_source;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::endpoint::UploadEndpoint;
use crate::error::{ChunkUploadError, UploadError};
use crate::session::{SessionSnapshot, UploadSession};
use crate::state::UploadAction;
use crate::types::{UploadEvent, UploadResult};
use crate::worker::{
    ChunkResult, ChunkTransferOutcome, WorkerContext, backoff_delay, transfer_chunk,
};

/// A lifecycle request from an [`UploadHandle`](crate::UploadHandle).
pub(crate) struct Command {
    pub action: UploadAction,
    pub reply: oneshot::Sender<Result<(), UploadError>>,
}

/// A terminal chunk failure collected while a pause drained the workers.
/// The session fails with it on the next resume.
struct DeferredFailure {
    index: u32,
    retries: u32,
    error: ChunkUploadError,
}

enum Step {
    Command(Option<Command>),
    Joined(Option<Result<ChunkTransferOutcome, JoinError>>),
}

pub(crate) struct Scheduler {
    session: UploadSession,
    endpoint: Arc<dyn UploadEndpoint>,
    worker: Arc<WorkerContext>,
    pending: BTreeSet<u32>,
    in_flight: BTreeSet<u32>,
    tasks: JoinSet<ChunkTransferOutcome>,
    cancel: CancellationToken,
    deferred: Option<DeferredFailure>,
    events: mpsc::UnboundedSender<UploadEvent>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl Scheduler {
    pub fn new(
        session: UploadSession,
        endpoint: Arc<dyn UploadEndpoint>,
        events: mpsc::UnboundedSender<UploadEvent>,
        snapshots: watch::Sender<SessionSnapshot>,
    ) -> Self {
        let worker = Arc::new(WorkerContext {
            endpoint: endpoint.clone(),
            file: session.file.clone(),
            upload_id: session.id.clone(),
            resume_token: session.resume_token.clone(),
            total_chunks: session.total_chunks(),
            max_retries: session.max_retries,
            retry_delay: session.retry_delay,
        });
        Self {
            session,
            endpoint,
            worker,
            pending: BTreeSet::new(),
            in_flight: BTreeSet::new(),
            tasks: JoinSet::new(),
            cancel: CancellationToken::new(),
            deferred: None,
            events,
            snapshots,
        }
    }

    /// Runs the session until it completes, fails or is cancelled.
    ///
    /// Closing the command channel while pending or paused cancels the
    /// session; while uploading the transfer runs to the end.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
    ) -> Result<UploadResult, UploadError> {
        let mut commands_open = true;

        loop {
            match self.session.status {
                UploadStatus::Uploading => {
                    if let Some(deferred) = self.deferred.take() {
                        self.session.mark_failed(deferred.index, deferred.retries);
                        return self.fail(deferred.error).await;
                    }
                    self.dispatch();
                    if self.in_flight.is_empty() && self.pending.is_empty() {
                        return self.complete().await;
                    }

                    let step = tokio::select! {
                        biased;
                        cmd = commands.recv(), if commands_open => Step::Command(cmd),
                        joined = self.tasks.join_next() => Step::Joined(joined),
                    };

                    match step {
                        Step::Command(Some(cmd)) => self.handle(cmd).await,
                        Step::Command(None) => commands_open = false,
                        Step::Joined(Some(Ok(outcome))) => {
                            if let Some(err) = self.record(outcome) {
                                return self.fail(err).await;
                            }
                        }
                        Step::Joined(Some(Err(e))) => {
                            let err = ChunkUploadError::server(format!("chunk task failed: {e}"));
                            return self.fail(err).await;
                        }
                        Step::Joined(None) => {
                            // Nothing left to join; put stragglers back.
                            self.pending.extend(std::mem::take(&mut self.in_flight));
                        }
                    }
                }
                UploadStatus::Pending | UploadStatus::Paused => {
                    let cmd = if commands_open {
                        commands.recv().await
                    } else {
                        None
                    };
                    match cmd {
                        Some(cmd) => self.handle(cmd).await,
                        None => {
                            debug!(upload_id = %self.session.id, "all handles dropped");
                            commands_open = false;
                            self.cancel_upload().await?;
                        }
                    }
                }
                UploadStatus::Cancelled => return Err(UploadError::Cancelled),
                // Completion and failure return from the uploading arm.
                UploadStatus::Completed | UploadStatus::Failed => {
                    return Err(UploadError::SessionGone);
                }
            }
        }
    }

    async fn handle(&mut self, cmd: Command) {
        let result = match cmd.action {
            UploadAction::Start | UploadAction::Resume => self.start_uploading(cmd.action),
            UploadAction::Pause => self.pause().await,
            UploadAction::Cancel => self.cancel_upload().await,
            action @ (UploadAction::Complete | UploadAction::Fail) => {
                Err(UploadError::InvalidTransition {
                    from: self.session.status,
                    action,
                })
            }
        };
        if let Err(e) = &result {
            debug!(upload_id = %self.session.id, error = %e, "command rejected");
        }
        let _ = cmd.reply.send(result);
    }

    /// Fills free worker slots from the pending set, lowest index first.
    fn dispatch(&mut self) {
        let mut dispatched = false;
        while self.in_flight.len() < self.session.max_concurrent_chunks {
            let Some(index) = self.pending.pop_first() else {
                break;
            };
            let Some(chunk) = self.session.chunk(index) else {
                continue;
            };
            let retries = self.session.retries_for(index);
            self.in_flight.insert(index);
            self.tasks.spawn(transfer_chunk(
                self.worker.clone(),
                chunk,
                retries,
                self.cancel.clone(),
            ));
            debug!(upload_id = %self.session.id, chunk = index, "chunk dispatched");
            dispatched = true;
        }
        if dispatched {
            self.publish();
        }
    }

    /// Folds a worker outcome into the session. Returns the error that
    /// fails the session, if any.
    fn record(&mut self, outcome: ChunkTransferOutcome) -> Option<ChunkUploadError> {
        let index = outcome.chunk_index;
        self.in_flight.remove(&index);
        match outcome.result {
            ChunkResult::Uploaded => {
                self.chunk_uploaded(index, outcome.retries);
                None
            }
            ChunkResult::Aborted => {
                self.session.record_retries(index, outcome.retries);
                if self.session.status == UploadStatus::Uploading {
                    self.pending.insert(index);
                }
                None
            }
            ChunkResult::Failed(err) => {
                self.session.mark_failed(index, outcome.retries);
                Some(err)
            }
        }
    }

    fn chunk_uploaded(&mut self, index: u32, retries: u32) {
        self.session.mark_uploaded(index, retries);
        self.emit(UploadEvent::ChunkComplete {
            index,
            total: self.session.total_chunks(),
        });
        self.emit(UploadEvent::Progress(self.session.progress()));
        self.publish();
    }

    /// Aborts in-flight workers and waits for them. Chunks that finished
    /// before observing the abort are still counted as uploaded; the first
    /// terminal failure among them is returned.
    async fn halt(&mut self) -> Option<DeferredFailure> {
        self.cancel.cancel();
        let mut failure = None;
        while let Some(joined) = self.tasks.join_next().await {
            let Ok(outcome) = joined else { continue };
            let index = outcome.chunk_index;
            match outcome.result {
                ChunkResult::Uploaded => self.chunk_uploaded(index, outcome.retries),
                ChunkResult::Aborted => self.session.record_retries(index, outcome.retries),
                ChunkResult::Failed(error) => {
                    self.session.record_retries(index, outcome.retries);
                    failure.get_or_insert(DeferredFailure {
                        index,
                        retries: outcome.retries,
                        error,
                    });
                }
            }
        }
        self.in_flight.clear();
        self.pending.clear();
        failure
    }

    fn start_uploading(&mut self, action: UploadAction) -> Result<(), UploadError> {
        let from = self.session.status;
        self.session.apply(action)?;
        self.cancel = CancellationToken::new();
        self.pending = self.session.pending();
        let resumed = from == UploadStatus::Paused;
        info!(
            upload_id = %self.session.id,
            remaining = self.pending.len(),
            total = self.session.total_chunks(),
            resumed,
            "upload running"
        );
        if resumed {
            self.emit(UploadEvent::Resumed);
        }
        self.publish();
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), UploadError> {
        self.session.apply(UploadAction::Pause)?;
        if let Some(failure) = self.halt().await {
            warn!(
                upload_id = %self.session.id,
                chunk = failure.index,
                error = %failure.error,
                "chunk failed while pausing; upload fails on resume"
            );
            self.deferred = Some(failure);
        }
        info!(
            upload_id = %self.session.id,
            uploaded = self.session.uploaded.len(),
            "upload paused"
        );
        self.emit(UploadEvent::Paused);
        self.publish();
        Ok(())
    }

    async fn cancel_upload(&mut self) -> Result<(), UploadError> {
        self.session.apply(UploadAction::Cancel)?;
        self.cancel.cancel();
        self.tasks.shutdown().await;
        self.in_flight.clear();
        self.pending.clear();
        self.session.clear();
        info!(upload_id = %self.session.id, "upload cancelled");
        self.emit(UploadEvent::Cancelled);
        self.publish();
        Ok(())
    }

    async fn fail(&mut self, err: ChunkUploadError) -> Result<UploadResult, UploadError> {
        self.session.apply(UploadAction::Fail)?;
        // The session already fails with `err`; later failures are dropped.
        let _ = self.halt().await;
        error!(
            upload_id = %self.session.id,
            chunk = ?err.chunk_index,
            kind = %err.kind,
            error = %err.message,
            "upload failed"
        );
        self.emit(UploadEvent::Error(err.clone()));
        self.publish();
        Err(UploadError::Chunk(err))
    }

    async fn complete(&mut self) -> Result<UploadResult, UploadError> {
        self.session.apply(UploadAction::Complete)?;
        self.publish();

        match self.finalize().await {
            Ok(result) => {
                info!(
                    upload_id = %self.session.id,
                    file_id = %result.file_id,
                    chunks = result.chunks_uploaded,
                    retries = result.retry_count,
                    elapsed_ms = result.upload_time_ms,
                    "upload completed"
                );
                self.emit(UploadEvent::Complete(result.clone()));
                Ok(result)
            }
            Err(err) => {
                error!(upload_id = %self.session.id, error = %err, "completion failed");
                self.emit(UploadEvent::Error(err.clone()));
                Err(UploadError::Completion(err))
            }
        }
    }

    async fn finalize(&self) -> Result<UploadResult, ChunkUploadError> {
        let checksum = checksum_source(&self.session.file)
            .await
            .map_err(|e| ChunkUploadError::validation(format!("computing checksum: {e}")))?;

        let req = CompleteUploadRequest {
            upload_id: self.session.id.clone(),
            filename: self.session.meta.filename.clone(),
            chunks_uploaded: self.session.total_chunks(),
            expected_checksum: checksum.clone(),
        };
        let record = self.complete_with_retry(req).await?;

        if !record.checksum.is_empty() && !record.checksum.eq_ignore_ascii_case(&checksum) {
            return Err(ChunkUploadError::validation(format!(
                "server checksum {} does not match local checksum {checksum}",
                record.checksum
            )));
        }

        Ok(UploadResult {
            file_id: record.file_id.clone(),
            filename: self.session.meta.filename.clone(),
            size: self.session.file.size(),
            chunks_uploaded: self.session.total_chunks(),
            retry_count: self.session.total_retries(),
            upload_time_ms: self.session.clock.elapsed().as_millis() as u64,
            checksum,
            record,
        })
    }

    async fn complete_with_retry(
        &self,
        req: CompleteUploadRequest,
    ) -> Result<FileRecord, ChunkUploadError> {
        let mut retries = 0;
        loop {
            match self.endpoint.complete_upload(req.clone()).await {
                Ok(record) => return Ok(record),
                Err(e) if e.retryable && retries < self.session.max_retries => {
                    let delay = backoff_delay(self.session.retry_delay, retries);
                    retries += 1;
                    warn!(
                        upload_id = %self.session.id,
                        attempt = retries,
                        error = %e,
                        "retrying completion"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn emit(&self, event: UploadEvent) {
        let _ = self.events.send(event);
    }

    fn publish(&self) {
        self.snapshots
            .send_replace(self.session.snapshot(&self.in_flight));
    }
}

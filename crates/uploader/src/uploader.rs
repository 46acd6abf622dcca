//! Public entry points: [`Uploader`] creates sessions, [`UploadHandle`]
//! controls one.

use std::collections::BTreeSet;
use std::sync::Arc;

use folio_protocol::{FileMeta, ResumeToken, StartUploadRequest, UploadStatus};
use folio_transfer::{FileHandle, plan};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::UploaderConfig;
use crate::endpoint::UploadEndpoint;
use crate::error::{ChunkUploadError, UploadError};
use crate::resume;
use crate::scheduler::{Command, Scheduler};
use crate::session::{SessionInit, SessionSnapshot, UploadSession};
use crate::state::UploadAction;
use crate::types::{UploadEvent, UploadResult};

const COMMAND_BUFFER: usize = 8;

/// Creates upload sessions against one endpoint.
pub struct Uploader {
    endpoint: Arc<dyn UploadEndpoint>,
    config: UploaderConfig,
}

impl Uploader {
    pub fn new(
        endpoint: Arc<dyn UploadEndpoint>,
        config: UploaderConfig,
    ) -> Result<Self, UploadError> {
        config.validate()?;
        Ok(Self { endpoint, config })
    }

    /// Opens a server-side session and returns its handle in `pending`.
    ///
    /// Nothing is transferred until [`UploadHandle::start`] is called.
    pub async fn create(
        &self,
        file: FileHandle,
        meta: FileMeta,
    ) -> Result<UploadHandle, UploadError> {
        self.check_size(file.size())?;

        let req = StartUploadRequest {
            filename: meta.filename.clone(),
            file_size: file.size(),
            mime_type: meta.mime_type.clone(),
            chunk_size: self.config.chunk_size,
        };
        let resp = self
            .endpoint
            .start_upload(req)
            .await
            .map_err(UploadError::Init)?;

        // The server may dictate its own chunk size.
        let chunk_size = if resp.chunk_size > 0 {
            resp.chunk_size
        } else {
            self.config.chunk_size
        };
        let chunks = plan(file.size(), chunk_size)?;
        if !resp.chunk_targets.is_empty() && resp.chunk_targets.len() != chunks.len() {
            return Err(UploadError::Init(ChunkUploadError::validation(format!(
                "server expects {} chunks, planned {}",
                resp.chunk_targets.len(),
                chunks.len()
            ))));
        }

        info!(
            upload_id = %resp.upload_id,
            filename = %meta.filename,
            size = file.size(),
            chunk_size,
            chunks = chunks.len(),
            "upload session created"
        );

        let init = SessionInit {
            id: resp.upload_id,
            resume_token: resp.resume_token,
            chunk_size,
            chunks,
        };
        Ok(self.spawn(init, file, meta, UploadStatus::Pending, BTreeSet::new()))
    }

    /// Creates a session and starts transferring immediately.
    pub async fn start(
        &self,
        file: FileHandle,
        meta: FileMeta,
    ) -> Result<UploadHandle, UploadError> {
        let handle = self.create(file, meta).await?;
        handle.start().await?;
        Ok(handle)
    }

    /// Rebuilds a paused session from a resume token.
    ///
    /// `uploaded` lists chunk indices already transferred; under
    /// [`ResumePolicy::Verify`](crate::ResumePolicy::Verify) only those the
    /// server confirms are skipped. Call [`UploadHandle::resume`] to continue.
    pub async fn from_resume_token(
        &self,
        file: FileHandle,
        token: &ResumeToken,
        uploaded: &[u32],
    ) -> Result<UploadHandle, UploadError> {
        self.check_size(file.size())?;
        let chunks = resume::plan_from_token(token, &file)?;
        let claimed = resume::collect_uploaded(uploaded, chunks.len() as u32)?;
        let uploaded = resume::reconcile(
            self.endpoint.as_ref(),
            self.config.resume_policy,
            token,
            claimed,
        )
        .await?;

        info!(
            upload_id = %token.upload_id,
            uploaded = uploaded.len(),
            chunks = chunks.len(),
            "upload session restored"
        );

        let init = SessionInit {
            id: token.upload_id.clone(),
            resume_token: token.token.clone(),
            chunk_size: token.chunk_size,
            chunks,
        };
        let meta = FileMeta::new(token.filename.clone(), token.mime_type.clone());
        Ok(self.spawn(init, file, meta, UploadStatus::Paused, uploaded))
    }

    fn check_size(&self, size: u64) -> Result<(), UploadError> {
        if size == 0 {
            return Err(UploadError::EmptyFile);
        }
        if size > self.config.max_file_size {
            return Err(UploadError::FileTooLarge {
                size,
                max: self.config.max_file_size,
            });
        }
        Ok(())
    }

    fn spawn(
        &self,
        init: SessionInit,
        file: FileHandle,
        meta: FileMeta,
        status: UploadStatus,
        uploaded: BTreeSet<u32>,
    ) -> UploadHandle {
        let session = UploadSession::new(init, file, meta, status, uploaded, &self.config);
        let (snapshots_tx, snapshots) = watch::channel(session.snapshot(&BTreeSet::new()));
        let (events_tx, events) = mpsc::unbounded_channel();
        let (commands, commands_rx) = mpsc::channel(COMMAND_BUFFER);

        let scheduler = Scheduler::new(session, self.endpoint.clone(), events_tx, snapshots_tx);
        let task = tokio::spawn(scheduler.run(commands_rx));

        UploadHandle {
            commands,
            events: Some(events),
            snapshots,
            task,
        }
    }
}

/// Controls one running upload session.
///
/// Dropping the handle while the session is pending or paused cancels it.
pub struct UploadHandle {
    commands: mpsc::Sender<Command>,
    events: Option<mpsc::UnboundedReceiver<UploadEvent>>,
    snapshots: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<Result<UploadResult, UploadError>>,
}

impl UploadHandle {
    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<UploadEvent>> {
        self.events.take()
    }

    pub fn upload_id(&self) -> String {
        self.snapshots.borrow().upload_id.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn status(&self) -> UploadStatus {
        self.snapshots.borrow().status
    }

    /// Receiver that observes every published snapshot.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn resume_token(&self) -> ResumeToken {
        self.snapshots.borrow().resume_token.clone()
    }

    pub async fn start(&self) -> Result<(), UploadError> {
        self.send(UploadAction::Start).await
    }

    /// Stops dispatching and aborts in-flight chunks. Returns once every
    /// worker has stopped.
    pub async fn pause(&self) -> Result<(), UploadError> {
        self.send(UploadAction::Pause).await
    }

    pub async fn resume(&self) -> Result<(), UploadError> {
        self.send(UploadAction::Resume).await
    }

    pub async fn cancel(&self) -> Result<(), UploadError> {
        self.send(UploadAction::Cancel).await
    }

    /// Waits for the session to finish.
    pub async fn wait(self) -> Result<UploadResult, UploadError> {
        let Self { commands, task, .. } = self;
        drop(commands);
        match task.await {
            Ok(result) => result,
            Err(_) => Err(UploadError::SessionGone),
        }
    }

    async fn send(&self, action: UploadAction) -> Result<(), UploadError> {
        let rejected = || UploadError::InvalidTransition {
            from: self.status(),
            action,
        };
        let (reply, reply_rx) = oneshot::channel();
        if self.commands.send(Command { action, reply }).await.is_err() {
            return Err(rejected());
        }
        reply_rx.await.unwrap_or_else(|_| Err(rejected()))
    }
}

//! Scriptable in-memory endpoint used by the engine tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use folio_protocol::{
    CompleteUploadRequest, FileRecord, StartUploadRequest, StartUploadResponse,
    UploadChunkRequest, UploadChunkResponse,
};
use tokio::sync::{Semaphore, mpsc};

use crate::endpoint::{EndpointFuture, UploadEndpoint};
use crate::error::ChunkUploadError;

enum Failure {
    Times(u32, ChunkUploadError),
    Always(ChunkUploadError),
}

#[derive(Default)]
struct MockState {
    attempts: HashMap<u32, u32>,
    successes: Vec<u32>,
    payloads: BTreeMap<u32, Vec<u8>>,
    failures: HashMap<u32, Failure>,
    acks: HashMap<u32, u32>,
    active: usize,
    max_active: usize,
    start_requests: Vec<StartUploadRequest>,
    start_response: Option<StartUploadResponse>,
    confirmed: Vec<u32>,
    confirmed_error: Option<ChunkUploadError>,
    completes: Vec<CompleteUploadRequest>,
    complete_failures: Vec<ChunkUploadError>,
    complete_checksum: Option<String>,
}

pub(crate) struct MockEndpoint {
    state: Mutex<MockState>,
    started_tx: mpsc::UnboundedSender<u32>,
    started_rx: Mutex<Option<mpsc::UnboundedReceiver<u32>>>,
    gate: Option<Arc<Semaphore>>,
    latency: Duration,
}

struct ActiveGuard<'a>(&'a Mutex<MockState>);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().unwrap().active -= 1;
    }
}

impl MockEndpoint {
    pub fn new() -> Self {
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(MockState::default()),
            started_tx,
            started_rx: Mutex::new(Some(started_rx)),
            gate: None,
            latency: Duration::ZERO,
        }
    }

    /// Chunk requests block until [`release`](Self::release) hands out permits.
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new()
        }
    }

    /// Every chunk request takes `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    /// Receiver of chunk indices, sent when a request arrives.
    pub fn take_started(&self) -> mpsc::UnboundedReceiver<u32> {
        self.started_rx.lock().unwrap().take().unwrap()
    }

    pub fn fail_times(&self, index: u32, times: u32, err: ChunkUploadError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(index, Failure::Times(times, err));
    }

    pub fn fail_always(&self, index: u32, err: ChunkUploadError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(index, Failure::Always(err));
    }

    /// Acknowledge chunk `index` with a different index.
    pub fn ack_as(&self, index: u32, reported: u32) {
        self.state.lock().unwrap().acks.insert(index, reported);
    }

    pub fn set_start_response(&self, resp: StartUploadResponse) {
        self.state.lock().unwrap().start_response = Some(resp);
    }

    pub fn set_confirmed(&self, confirmed: Vec<u32>) {
        self.state.lock().unwrap().confirmed = confirmed;
    }

    pub fn set_confirmed_error(&self, err: ChunkUploadError) {
        self.state.lock().unwrap().confirmed_error = Some(err);
    }

    /// Failures returned by successive completion calls before succeeding.
    pub fn fail_complete(&self, errors: Vec<ChunkUploadError>) {
        self.state.lock().unwrap().complete_failures = errors;
    }

    pub fn set_complete_checksum(&self, checksum: &str) {
        self.state.lock().unwrap().complete_checksum = Some(checksum.to_string());
    }

    pub fn attempts(&self, index: u32) -> u32 {
        self.state
            .lock()
            .unwrap()
            .attempts
            .get(&index)
            .copied()
            .unwrap_or(0)
    }

    pub fn successes(&self) -> Vec<u32> {
        self.state.lock().unwrap().successes.clone()
    }

    pub fn max_active(&self) -> usize {
        self.state.lock().unwrap().max_active
    }

    pub fn payload(&self, index: u32) -> Option<Vec<u8>> {
        self.state.lock().unwrap().payloads.get(&index).cloned()
    }

    /// Stored chunks concatenated in index order.
    pub fn assembled(&self) -> Vec<u8> {
        self.state
            .lock()
            .unwrap()
            .payloads
            .values()
            .flatten()
            .copied()
            .collect()
    }

    pub fn start_requests(&self) -> Vec<StartUploadRequest> {
        self.state.lock().unwrap().start_requests.clone()
    }

    pub fn completes(&self) -> Vec<CompleteUploadRequest> {
        self.state.lock().unwrap().completes.clone()
    }
}

impl UploadEndpoint for MockEndpoint {
    fn start_upload(&self, req: StartUploadRequest) -> EndpointFuture<'_, StartUploadResponse> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let resp = state.start_response.clone().unwrap_or_else(|| {
                let total = req.file_size.div_ceil(req.chunk_size) as u32;
                StartUploadResponse {
                    upload_id: "up-1".into(),
                    resume_token: "tok-1".into(),
                    chunk_size: 0,
                    chunk_targets: (0..total).collect(),
                }
            });
            state.start_requests.push(req);
            Ok(resp)
        })
    }

    fn upload_chunk(&self, req: UploadChunkRequest) -> EndpointFuture<'_, UploadChunkResponse> {
        Box::pin(async move {
            let index = req.chunk_index;
            let failure = {
                let mut state = self.state.lock().unwrap();
                *state.attempts.entry(index).or_default() += 1;
                state.active += 1;
                state.max_active = state.max_active.max(state.active);
                match state.failures.get_mut(&index) {
                    Some(Failure::Always(err)) => Some(err.clone()),
                    Some(Failure::Times(left, err)) if *left > 0 => {
                        *left -= 1;
                        Some(err.clone())
                    }
                    _ => None,
                }
            };
            let _guard = ActiveGuard(&self.state);
            let _ = self.started_tx.send(index);

            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if let Some(err) = failure {
                return Err(err);
            }

            let mut state = self.state.lock().unwrap();
            state.successes.push(index);
            state.payloads.insert(index, req.payload);
            let acked = state.acks.get(&index).copied().unwrap_or(index);
            Ok(UploadChunkResponse {
                success: true,
                chunk_index: acked,
                next_chunk_hint: None,
            })
        })
    }

    fn confirmed_chunks(
        &self,
        _upload_id: String,
        _resume_token: String,
    ) -> EndpointFuture<'_, Vec<u32>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            match &state.confirmed_error {
                Some(err) => Err(err.clone()),
                None => Ok(state.confirmed.clone()),
            }
        })
    }

    fn complete_upload(&self, req: CompleteUploadRequest) -> EndpointFuture<'_, FileRecord> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.completes.push(req.clone());
            if !state.complete_failures.is_empty() {
                return Err(state.complete_failures.remove(0));
            }
            let size = state.payloads.values().map(|p| p.len() as u64).sum();
            Ok(FileRecord {
                file_id: format!("file-{}", req.upload_id),
                filename: req.filename,
                size,
                checksum: state
                    .complete_checksum
                    .clone()
                    .unwrap_or(req.expected_checksum),
                mime_type: String::new(),
                uploaded_at: None,
            })
        })
    }
}

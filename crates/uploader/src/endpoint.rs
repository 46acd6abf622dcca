//! Server collaborator trait.
//!
//! `UploadEndpoint` is implemented by the transport layer (see
//! `folio-http`). Keeping it a trait decouples the engine from HTTP and
//! lets tests script server behavior.

use std::future::Future;
use std::pin::Pin;

use folio_protocol::{
    CompleteUploadRequest, FileRecord, StartUploadRequest, StartUploadResponse,
    UploadChunkRequest, UploadChunkResponse,
};

use crate::error::ChunkUploadError;

/// Future returned by every [`UploadEndpoint`] call.
pub type EndpointFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ChunkUploadError>> + Send + 'a>>;

/// The journal server's upload API.
///
/// Errors must already be classified into an [`ErrorKind`](crate::ErrorKind);
/// per-request timeouts surface as `network` errors.
pub trait UploadEndpoint: Send + Sync {
    /// Opens a server-side partial upload.
    fn start_upload(&self, req: StartUploadRequest) -> EndpointFuture<'_, StartUploadResponse>;

    /// Transfers one chunk. Must be idempotent per chunk index.
    fn upload_chunk(&self, req: UploadChunkRequest) -> EndpointFuture<'_, UploadChunkResponse>;

    /// Lists chunk indices the server already holds for an upload.
    fn confirmed_chunks(
        &self,
        upload_id: String,
        resume_token: String,
    ) -> EndpointFuture<'_, Vec<u32>>;

    /// Verifies the whole-file checksum and assembles the stored chunks.
    fn complete_upload(&self, req: CompleteUploadRequest) -> EndpointFuture<'_, FileRecord>;
}

//! Resumable chunked upload engine for manuscript files.
//!
//! This crate implements the **upload engine**: it splits a file into
//! chunks, transfers them through a bounded pool of workers with retry,
//! and supports pause, resume and cancel. It has no transport dependency.
//! Callers provide an [`UploadEndpoint`] implementation (see `folio-http`).
//!
//! # Lifecycle
//!
//! 1. **Create**: [`Uploader::create`] opens a server session and plans chunks
//! 2. **Upload**: the scheduler dispatches up to `max_concurrent_chunks`
//!    workers, lowest chunk index first
//! 3. **Pause / resume**: in-flight chunks are aborted and re-sent later;
//!    confirmed chunks never are
//! 4. **Complete**: the file checksum is verified by the server
//!
//! An interrupted session can be rebuilt with [`Uploader::from_resume_token`].

pub mod config;
pub mod endpoint;
pub mod error;
mod resume;
mod scheduler;
pub mod session;
pub mod state;
pub mod types;
pub mod uploader;
mod worker;

#[cfg(test)]
mod mock;

// Re-export primary types for convenience.
pub use config::{ResumePolicy, UploaderConfig};
pub use endpoint::{EndpointFuture, UploadEndpoint};
pub use error::{ChunkUploadError, ErrorKind, UploadError};
pub use session::SessionSnapshot;
pub use state::{UploadAction, transition};
pub use types::{UploadEvent, UploadResult};
pub use uploader::{UploadHandle, Uploader};

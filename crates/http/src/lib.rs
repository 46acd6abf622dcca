//! HTTP implementation of the Folio upload endpoint.
//!
//! Async client using `reqwest` with optional Bearer token authentication.
//! Every failure is classified into an [`ErrorKind`] so the upload engine can
//! decide whether to retry.

use std::time::Duration;

use folio_protocol::{
    ApiError, CompleteUploadRequest, ConfirmedChunksResponse, FileRecord, StartUploadRequest,
    StartUploadResponse, UploadChunkRequest, UploadChunkResponse,
};
use folio_uploader::{ChunkUploadError, EndpointFuture, ErrorKind, UploadEndpoint};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Header carrying the session's resume token on chunk requests.
pub const RESUME_TOKEN_HEADER: &str = "X-Resume-Token";

/// Characters left unescaped in path segments (RFC 3986 unreserved).
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Errors from building the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid API key")]
    InvalidKey,
}

/// Upload endpoint backed by the journal's REST API.
pub struct HttpEndpoint {
    http: reqwest::Client,
    base_url: String,
}

impl HttpEndpoint {
    /// Creates a client for `base_url` (e.g. `https://journal.example/api`).
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| Error::InvalidKey)?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn upload_url(&self, upload_id: &str, rest: &str) -> String {
        format!(
            "{}/uploads/{}{rest}",
            self.base_url,
            utf8_percent_encode(upload_id, SEGMENT)
        )
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, ChunkUploadError> {
        let resp = req.send().await.map_err(classify_transport)?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let body = resp.bytes().await.map_err(classify_transport)?;
        serde_json::from_slice(&body)
            .map_err(|e| ChunkUploadError::server(format!("malformed response body: {e}")))
    }
}

impl UploadEndpoint for HttpEndpoint {
    fn start_upload(&self, req: StartUploadRequest) -> EndpointFuture<'_, StartUploadResponse> {
        Box::pin(async move {
            let url = format!("{}/uploads", self.base_url);
            debug!(%url, filename = %req.filename, size = req.file_size, "starting upload");
            self.send(self.http.post(&url).json(&req)).await
        })
    }

    fn upload_chunk(&self, req: UploadChunkRequest) -> EndpointFuture<'_, UploadChunkResponse> {
        Box::pin(async move {
            let url = self.upload_url(&req.upload_id, &format!("/chunks/{}", req.chunk_index));
            let builder = self
                .http
                .put(&url)
                .query(&[("totalChunks", req.total_chunks)])
                .header(CONTENT_TYPE, "application/octet-stream")
                .header(RESUME_TOKEN_HEADER, req.resume_token)
                .body(req.payload);
            self.send(builder).await
        })
    }

    fn confirmed_chunks(
        &self,
        upload_id: String,
        resume_token: String,
    ) -> EndpointFuture<'_, Vec<u32>> {
        Box::pin(async move {
            let url = self.upload_url(&upload_id, "/chunks");
            let builder = self.http.get(&url).header(RESUME_TOKEN_HEADER, resume_token);
            let resp: ConfirmedChunksResponse = self.send(builder).await?;
            Ok(resp.uploaded_chunks)
        })
    }

    fn complete_upload(&self, req: CompleteUploadRequest) -> EndpointFuture<'_, FileRecord> {
        Box::pin(async move {
            let url = self.upload_url(&req.upload_id, "/complete");
            self.send(self.http.post(&url).json(&req)).await
        })
    }
}

/// Classifies a failure that produced no HTTP status.
fn classify_transport(err: reqwest::Error) -> ChunkUploadError {
    // Malformed URLs and requests fail the same way on every attempt.
    if err.is_builder() {
        return ChunkUploadError::validation(err.to_string());
    }
    if err.is_decode() {
        return ChunkUploadError::server(err.to_string());
    }
    ChunkUploadError::network(err.to_string())
}

/// Classifies a non-success HTTP status.
fn classify_status(status: StatusCode, body: &str) -> ChunkUploadError {
    let message = match serde_json::from_str::<ApiError>(body) {
        Ok(api) => format!("HTTP {}: {} ({})", status.as_u16(), api.message, api.code),
        Err(_) if body.is_empty() => format!("HTTP {}", status.as_u16()),
        Err(_) => format!("HTTP {}: {body}", status.as_u16()),
    };
    let kind = match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => ErrorKind::Network,
        s if s.is_server_error() => ErrorKind::Server,
        s if s.is_client_error() => ErrorKind::Validation,
        _ => ErrorKind::Server,
    };
    ChunkUploadError::new(kind, message)
}

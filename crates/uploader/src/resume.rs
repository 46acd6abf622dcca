//! Rebuilding a session from a resume token.

use std::collections::BTreeSet;

use folio_protocol::ResumeToken;
use folio_transfer::{Chunk, FileHandle, plan};

use crate::config::ResumePolicy;
use crate::endpoint::UploadEndpoint;
use crate::error::UploadError;

/// Checks the token against the local file and re-plans its chunks.
pub(crate) fn plan_from_token(
    token: &ResumeToken,
    file: &FileHandle,
) -> Result<Vec<Chunk>, UploadError> {
    if token.upload_id.is_empty() {
        return Err(UploadError::InvalidResumeToken("missing upload id".into()));
    }
    if token.chunk_size == 0 {
        return Err(UploadError::InvalidResumeToken("chunk size is zero".into()));
    }
    if token.file_size != file.size() {
        return Err(UploadError::InvalidResumeToken(format!(
            "token is for a {} byte file, got {} bytes",
            token.file_size,
            file.size()
        )));
    }
    Ok(plan(file.size(), token.chunk_size)?)
}

/// Collects caller-supplied uploaded indices, folding duplicates.
pub(crate) fn collect_uploaded(indices: &[u32], total: u32) -> Result<BTreeSet<u32>, UploadError> {
    indices
        .iter()
        .map(|&i| {
            if i < total {
                Ok(i)
            } else {
                Err(UploadError::InvalidResumeToken(format!(
                    "chunk index {i} out of range for {total} chunks"
                )))
            }
        })
        .collect()
}

/// Applies the resume policy to the claimed set.
pub(crate) async fn reconcile(
    endpoint: &dyn UploadEndpoint,
    policy: ResumePolicy,
    token: &ResumeToken,
    claimed: BTreeSet<u32>,
) -> Result<BTreeSet<u32>, UploadError> {
    match policy {
        ResumePolicy::Trust => Ok(claimed),
        ResumePolicy::Verify => {
            let confirmed: BTreeSet<u32> = endpoint
                .confirmed_chunks(token.upload_id.clone(), token.token.clone())
                .await
                .map_err(UploadError::Verify)?
                .into_iter()
                .collect();
            Ok(claimed.intersection(&confirmed).copied().collect())
        }
    }
}

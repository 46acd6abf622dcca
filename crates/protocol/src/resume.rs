//! Opaque resume tokens.
//!
//! A [`ResumeToken`] bundles everything needed to reattach to a server-side
//! partial upload: the upload id, the server's own token, and the chunk
//! geometry that fixed the chunk boundaries. Callers store it as a single
//! URL-safe string.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// Errors produced while decoding a resume token.
#[derive(Debug, thiserror::Error)]
pub enum ResumeTokenError {
    #[error("resume token is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("resume token payload is malformed: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("resume token is missing {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeToken {
    pub upload_id: String,
    pub token: String,
    pub filename: String,
    pub mime_type: String,
    pub file_size: u64,
    pub chunk_size: u64,
}

impl ResumeToken {
    /// Encodes the token as URL-safe base64 of its JSON form.
    pub fn encode(&self) -> String {
        // Serializing a struct of strings and integers cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decodes a string produced by [`encode`](Self::encode).
    pub fn decode(encoded: &str) -> Result<Self, ResumeTokenError> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded.trim())?;
        let token: ResumeToken = serde_json::from_slice(&bytes)?;
        if token.upload_id.is_empty() {
            return Err(ResumeTokenError::MissingField("uploadId"));
        }
        if token.chunk_size == 0 {
            return Err(ResumeTokenError::MissingField("chunkSize"));
        }
        Ok(token)
    }
}
